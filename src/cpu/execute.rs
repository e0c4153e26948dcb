//! Prefix-driven instruction decoder and handlers.
//!
//! The base, CB, ED and indexed (DD/FD, DD CB, FD CB) tables are decoded
//! with the standard `x/y/z/p/q` octal decomposition of the opcode byte
//! (`x = op >> 6`, `y = (op >> 3) & 7`, `z = op & 7`, `p = y >> 1`,
//! `q = y & 1`), the same technique used by most Z80 references. Every
//! handler returns the T-state count for the instruction it just retired;
//! the caller ([`super::Cpu::step_one`]) applies wait-state inflation on
//! top of that count.

use super::flags;
use super::{invalid_opcode, Cpu};
use crate::bus::Bus;
use crate::error::{Prefix, Result};

/// Which 16-bit register substitutes for HL (and H/L for the undocumented
/// half-register forms) while decoding a DD/FD-prefixed opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Index {
    Hl,
    Ix,
    Iy,
}

impl Cpu {
    /// Fetch one opcode byte and dispatch it through the prefix chain,
    /// returning the T-state count of the instruction retired (before
    /// wait-state inflation).
    pub(super) fn decode_and_execute(&mut self, bus: &mut impl Bus, bytes: &mut Vec<u8>) -> Result<u32> {
        let opcode = self.fetch_byte(bus, bytes);
        self.dispatch(opcode, bus, bytes)
    }

    fn dispatch(&mut self, opcode: u8, bus: &mut impl Bus, bytes: &mut Vec<u8>) -> Result<u32> {
        match opcode {
            0xCB => {
                let cb = self.fetch_byte(bus, bytes);
                self.execute_cb(cb, Index::Hl, bus, bytes)
            }
            0xED => {
                let ed = self.fetch_byte(bus, bytes);
                self.execute_ed(ed, bus, bytes)
            }
            0xDD => self.dispatch_indexed(Index::Ix, bus, bytes),
            0xFD => self.dispatch_indexed(Index::Iy, bus, bytes),
            _ => self.execute_base(opcode, Index::Hl, bus, bytes),
        }
    }

    /// Handle the byte following a DD or FD prefix. A further DD/FD
    /// overrides the previous prefix (canonical behaviour); ED following
    /// DD/FD is a wasted prefix (the ED sequence runs exactly as if
    /// unprefixed); anything else is an ordinary opcode with HL/H/L
    /// substituted for the chosen index register.
    fn dispatch_indexed(&mut self, index: Index, bus: &mut impl Bus, bytes: &mut Vec<u8>) -> Result<u32> {
        let opcode = self.fetch_byte(bus, bytes);
        match opcode {
            // A repeated or wasted prefix costs an extra 4 T-states beyond
            // whatever the eventually-decoded instruction costs on its own.
            0xDD => Ok(self.dispatch_indexed(Index::Ix, bus, bytes)? + 4),
            0xFD => Ok(self.dispatch_indexed(Index::Iy, bus, bytes)? + 4),
            0xED => {
                let ed = self.fetch_byte(bus, bytes);
                Ok(self.execute_ed(ed, bus, bytes)? + 4)
            }
            0xCB => {
                let d = self.fetch_data_byte(bus, bytes) as i8;
                let op = self.fetch_data_byte(bus, bytes);
                self.execute_indexed_cb(op, index, d, bus, bytes)
            }
            _ => self.execute_base(opcode, index, bus, bytes),
        }
    }

    // -----------------------------------------------------------------
    // Index-aware operand resolution
    // -----------------------------------------------------------------

    /// Effective address for register-field 6 ((HL)/(IX+d)/(IY+d)).
    /// Fetches the displacement byte for indexed forms; plain HL needs no
    /// extra fetch.
    fn indexed_addr(&mut self, index: Index, bus: &mut impl Bus, bytes: &mut Vec<u8>) -> u16 {
        match index {
            Index::Hl => self.hl(),
            Index::Ix => {
                let d = self.fetch_data_byte(bus, bytes) as i8;
                self.ix.wrapping_add(d as i16 as u16)
            }
            Index::Iy => {
                let d = self.fetch_data_byte(bus, bytes) as i8;
                self.iy.wrapping_add(d as i16 as u16)
            }
        }
    }

    /// 8-bit register selected by a 3-bit field, excluding 6 ((HL)):
    /// 0=B 1=C 2=D 3=E 4=H/IXH/IYH 5=L/IXL/IYL 7=A.
    fn half_or_reg(&self, idx: u8, index: Index) -> u8 {
        match idx {
            0 => self.b,
            1 => self.c,
            2 => self.d,
            3 => self.e,
            4 => match index {
                Index::Hl => self.h,
                Index::Ix => self.ixh(),
                Index::Iy => self.iyh(),
            },
            5 => match index {
                Index::Hl => self.l,
                Index::Ix => self.ixl(),
                Index::Iy => self.iyl(),
            },
            7 => self.a,
            _ => unreachable!("register field excludes (HL)"),
        }
    }

    fn set_half_or_reg(&mut self, idx: u8, val: u8, index: Index) {
        match idx {
            0 => self.b = val,
            1 => self.c = val,
            2 => self.d = val,
            3 => self.e = val,
            4 => match index {
                Index::Hl => self.h = val,
                Index::Ix => self.set_ixh(val),
                Index::Iy => self.set_iyh(val),
            },
            5 => match index {
                Index::Hl => self.l = val,
                Index::Ix => self.set_ixl(val),
                Index::Iy => self.set_iyl(val),
            },
            7 => self.a = val,
            _ => unreachable!("register field excludes (HL)"),
        }
    }

    /// Full 8-bit register field including 6 ((HL)/(IX+d)/(IY+d)).
    fn get_reg8_idx(&mut self, idx: u8, index: Index, bus: &mut impl Bus, bytes: &mut Vec<u8>) -> u8 {
        if idx == 6 {
            let addr = self.indexed_addr(index, bus, bytes);
            self.read_mem(bus, addr)
        } else {
            self.half_or_reg(idx, index)
        }
    }

    fn set_reg8_idx(&mut self, idx: u8, val: u8, index: Index, bus: &mut impl Bus, bytes: &mut Vec<u8>) {
        if idx == 6 {
            let addr = self.indexed_addr(index, bus, bytes);
            self.write_mem(bus, addr, val);
        } else {
            self.set_half_or_reg(idx, val, index);
        }
    }

    /// Register pair selected by `p` (0=BC 1=DE 2=HL/IX/IY 3=SP).
    fn get_rp_idx(&self, p: u8, index: Index) -> u16 {
        if p == 2 {
            match index {
                Index::Hl => self.hl(),
                Index::Ix => self.ix,
                Index::Iy => self.iy,
            }
        } else {
            self.get_rp(p)
        }
    }

    fn set_rp_idx(&mut self, p: u8, val: u16, index: Index) {
        if p == 2 {
            match index {
                Index::Hl => self.set_hl(val),
                Index::Ix => self.ix = val,
                Index::Iy => self.iy = val,
            }
        } else {
            self.set_rp(p, val);
        }
    }

    /// Register pair selected by `p` for PUSH/POP (0=BC 1=DE 2=HL/IX/IY 3=AF).
    fn get_rp2_idx(&self, p: u8, index: Index) -> u16 {
        if p == 2 {
            match index {
                Index::Hl => self.hl(),
                Index::Ix => self.ix,
                Index::Iy => self.iy,
            }
        } else {
            self.get_rp2(p)
        }
    }

    fn set_rp2_idx(&mut self, p: u8, val: u16, index: Index) {
        if p == 2 {
            match index {
                Index::Hl => self.set_hl(val),
                Index::Ix => self.ix = val,
                Index::Iy => self.iy = val,
            }
        } else {
            self.set_rp2(p, val);
        }
    }

    // -----------------------------------------------------------------
    // ALU / rotate dispatch tables, keyed by the 3-bit `y` field
    // -----------------------------------------------------------------

    /// ADD/ADC/SUB/SBC/AND/XOR/OR/CP A,val selected by `y`.
    fn alu_dispatch(&mut self, y: u8, val: u8) {
        match y {
            0 => self.alu_add(val, false),
            1 => self.alu_add(val, true),
            2 => {
                self.alu_sub(val, false);
            }
            3 => {
                self.alu_sub(val, true);
            }
            4 => self.alu_and(val),
            5 => self.alu_xor(val),
            6 => self.alu_or(val),
            7 => self.alu_cp(val),
            _ => unreachable!("3-bit ALU field"),
        }
    }

    /// RLC/RRC/RL/RR/SLA/SRA/SLL/SRL selected by `y`. Sets S, Z, H=0,
    /// P/V=parity, N=0, C and the undocumented X/Y from the result.
    fn rot_dispatch(&mut self, y: u8, val: u8) -> u8 {
        let (result, carry) = match y {
            0 => (val.rotate_left(1), val & 0x80 != 0),
            1 => (val.rotate_right(1), val & 0x01 != 0),
            2 => {
                let c = self.flag_c() as u8;
                ((val << 1) | c, val & 0x80 != 0)
            }
            3 => {
                let c = self.flag_c() as u8;
                ((val >> 1) | (c << 7), val & 0x01 != 0)
            }
            4 => (val << 1, val & 0x80 != 0),
            5 => ((val >> 1) | (val & 0x80), val & 0x01 != 0),
            6 => ((val << 1) | 1, val & 0x80 != 0), // undocumented SLL
            7 => (val >> 1, val & 0x01 != 0),
            _ => unreachable!("3-bit rotate field"),
        };
        self.set_sz_xy_flags(result);
        self.set_flag_h(false);
        self.set_flag_pv(Self::parity(result));
        self.set_flag_n(false);
        self.set_flag_c(carry);
        result
    }

    /// BIT y,val. Does not write the operand back. `addr_hint` supplies
    /// the address the operand was read from, for the undocumented X/Y
    /// bits a memory-operand BIT copies from the high byte of that
    /// address rather than from the tested value.
    fn bit_test(&mut self, y: u8, val: u8, addr_hint: Option<u16>) {
        let set = val & (1 << y) != 0;
        self.set_flag_z(!set);
        self.set_flag_pv(!set);
        self.set_flag_n(false);
        self.set_flag_h(true);
        self.set_flag_s(y == 7 && set);
        match addr_hint {
            Some(addr) => {
                let hi = (addr >> 8) as u8;
                self.set_flag(flags::X, hi & flags::X != 0);
                self.set_flag(flags::Y, hi & flags::Y != 0);
            }
            None => {
                self.set_flag(flags::X, val & flags::X != 0);
                self.set_flag(flags::Y, val & flags::Y != 0);
            }
        }
    }

    // -----------------------------------------------------------------
    // CB-prefixed table (rotate/shift, BIT, RES, SET)
    // -----------------------------------------------------------------

    fn execute_cb(&mut self, op: u8, index: Index, bus: &mut impl Bus, bytes: &mut Vec<u8>) -> Result<u32> {
        debug_assert_eq!(index, Index::Hl);
        let x = op >> 6;
        let y = (op >> 3) & 7;
        let z = op & 7;
        let val = self.get_reg8_idx(z, index, bus, bytes);
        match x {
            0 => {
                let result = self.rot_dispatch(y, val);
                self.set_reg8_idx(z, result, index, bus, bytes);
                Ok(if z == 6 { 15 } else { 8 })
            }
            1 => {
                let addr_hint = if z == 6 { Some(self.hl()) } else { None };
                self.bit_test(y, val, addr_hint);
                Ok(if z == 6 { 12 } else { 8 })
            }
            2 => {
                let result = val & !(1 << y);
                self.set_reg8_idx(z, result, index, bus, bytes);
                Ok(if z == 6 { 15 } else { 8 })
            }
            3 => {
                let result = val | (1 << y);
                self.set_reg8_idx(z, result, index, bus, bytes);
                Ok(if z == 6 { 15 } else { 8 })
            }
            _ => unreachable!("2-bit CB category"),
        }
    }

    /// DD CB d xx / FD CB d xx: the operand is always (IX+d)/(IY+d); if
    /// `xx`'s low 3 bits select a register (anything but 6), the result
    /// of a non-BIT operation is also copied into that register.
    fn execute_indexed_cb(
        &mut self,
        op: u8,
        index: Index,
        d: i8,
        bus: &mut impl Bus,
        bytes: &mut Vec<u8>,
    ) -> Result<u32> {
        let x = op >> 6;
        let y = (op >> 3) & 7;
        let z = op & 7;
        let base = match index {
            Index::Ix => self.ix,
            Index::Iy => self.iy,
            Index::Hl => unreachable!("indexed CB only reached via DD/FD"),
        };
        let addr = base.wrapping_add(d as i16 as u16);
        let val = self.read_mem(bus, addr);
        match x {
            0 => {
                let result = self.rot_dispatch(y, val);
                self.write_mem(bus, addr, result);
                if z != 6 {
                    self.set_half_or_reg(z, result, index);
                }
                Ok(23)
            }
            1 => {
                self.bit_test(y, val, Some(addr));
                Ok(20)
            }
            2 => {
                let result = val & !(1 << y);
                self.write_mem(bus, addr, result);
                if z != 6 {
                    self.set_half_or_reg(z, result, index);
                }
                Ok(23)
            }
            3 => {
                let result = val | (1 << y);
                self.write_mem(bus, addr, result);
                if z != 6 {
                    self.set_half_or_reg(z, result, index);
                }
                Ok(23)
            }
            _ => unreachable!("2-bit CB category"),
        }
    }

    // -----------------------------------------------------------------
    // DAA
    // -----------------------------------------------------------------

    fn daa(&mut self) {
        let a = self.a;
        let mut correction = 0u8;
        let mut carry = self.flag_c();
        if self.flag_h() || (a & 0x0F) > 9 {
            correction |= 0x06;
        }
        if carry || a > 0x99 {
            correction |= 0x60;
            carry = true;
        }
        let new_half = if self.flag_n() {
            self.flag_h() && (a & 0x0F) < 6
        } else {
            (a & 0x0F) > 9
        };
        let result = if self.flag_n() {
            a.wrapping_sub(correction)
        } else {
            a.wrapping_add(correction)
        };
        self.a = result;
        self.set_sz_xy_flags(result);
        self.set_flag_h(new_half);
        self.set_flag_pv(Self::parity(result));
        self.set_flag_c(carry);
        // N is preserved.
    }

    // -----------------------------------------------------------------
    // Block instructions (LDI/LDD/CPI/CPD/INI/IND/OUTI/OUTD)
    // -----------------------------------------------------------------

    fn op_ldi(&mut self, bus: &mut impl Bus, increment: bool) {
        let hl = self.hl();
        let de = self.de();
        let val = self.read_mem(bus, hl);
        self.write_mem(bus, de, val);
        let step = if increment { 1i16 } else { -1 };
        self.set_hl(hl.wrapping_add(step as u16));
        self.set_de(de.wrapping_add(step as u16));
        let bc = self.bc().wrapping_sub(1);
        self.set_bc(bc);
        self.set_flag_h(false);
        self.set_flag_n(false);
        self.set_flag_pv(bc != 0);
        let n = val.wrapping_add(self.a);
        self.set_flag(flags::Y, n & 0x02 != 0);
        self.set_flag(flags::X, n & 0x08 != 0);
        // S, Z, C unaffected.
    }

    fn op_cpi(&mut self, bus: &mut impl Bus, increment: bool) {
        let hl = self.hl();
        let val = self.read_mem(bus, hl);
        let a = self.a;
        let result = a.wrapping_sub(val);
        let half = (a & 0x0F) < (val & 0x0F);
        self.set_flag_s(result & 0x80 != 0);
        self.set_flag_z(result == 0);
        self.set_flag_h(half);
        self.set_flag_n(true);
        let step = if increment { 1i16 } else { -1 };
        self.set_hl(hl.wrapping_add(step as u16));
        let bc = self.bc().wrapping_sub(1);
        self.set_bc(bc);
        self.set_flag_pv(bc != 0);
        let n = result.wrapping_sub(if half { 1 } else { 0 });
        self.set_flag(flags::Y, n & 0x02 != 0);
        self.set_flag(flags::X, n & 0x08 != 0);
        // C unaffected.
    }

    fn op_ini(&mut self, bus: &mut impl Bus, increment: bool) {
        let port = self.port_bc(&*bus);
        let val = self.io_in(bus, port);
        let hl = self.hl();
        self.write_mem(bus, hl, val);
        let step = if increment { 1i16 } else { -1 };
        self.set_hl(hl.wrapping_add(step as u16));
        let c_next = if increment {
            self.c.wrapping_add(1)
        } else {
            self.c.wrapping_sub(1)
        };
        let b = self.b.wrapping_sub(1);
        self.b = b;
        self.set_io_block_flags(b, val, c_next);
    }

    fn op_outi(&mut self, bus: &mut impl Bus, increment: bool) {
        let hl = self.hl();
        let val = self.read_mem(bus, hl);
        let step = if increment { 1i16 } else { -1 };
        self.set_hl(hl.wrapping_add(step as u16));
        let b = self.b.wrapping_sub(1);
        self.b = b;
        let port = self.port_bc(&*bus);
        self.io_out(bus, port, val);
        let l = self.l;
        self.set_io_block_flags(b, val, l);
    }

    /// Shared undocumented-flag formula for INI/IND/OUTI/OUTD: let
    /// `k = val + addend` (addend is C±1 for IN, L for OUT); C and H are
    /// set if `k` overflowed a byte; P/V is the parity of `(k & 7) ^ b`.
    fn set_io_block_flags(&mut self, b: u8, val: u8, addend: u8) {
        self.set_flag_z(b == 0);
        self.set_flag_s(b & 0x80 != 0);
        self.set_flag_n(val & 0x80 != 0);
        let k = val as u16 + addend as u16;
        self.set_flag_c(k > 0xFF);
        self.set_flag_h(k > 0xFF);
        self.set_flag_pv(Self::parity(((k as u8) & 0x07) ^ b));
        self.set_flag(flags::X, b & flags::X != 0);
        self.set_flag(flags::Y, b & flags::Y != 0);
    }

    // -----------------------------------------------------------------
    // ED-prefixed table
    // -----------------------------------------------------------------

    fn execute_ed(&mut self, op: u8, bus: &mut impl Bus, bytes: &mut Vec<u8>) -> Result<u32> {
        let x = op >> 6;
        let y = (op >> 3) & 7;
        let z = op & 7;
        let p = y >> 1;
        let q = y & 1;
        match (x, z) {
            (1, 0) => {
                // IN r[y],(C); y=6 is the undocumented "IN (C)" (flags only).
                let port = self.port_bc(&*bus);
                let val = self.io_in(bus, port);
                if y != 6 {
                    self.set_half_or_reg(y, val, Index::Hl);
                }
                self.set_sz_xy_flags(val);
                self.set_flag_h(false);
                self.set_flag_pv(Self::parity(val));
                self.set_flag_n(false);
                Ok(12)
            }
            (1, 1) => {
                // OUT (C),r[y]; y=6 is the undocumented "OUT (C),0".
                let val = if y == 6 { 0 } else { self.half_or_reg(y, Index::Hl) };
                let port = self.port_bc(&*bus);
                self.io_out(bus, port, val);
                Ok(12)
            }
            (1, 2) => {
                let hl = self.hl();
                let rp = self.get_rp(p);
                let result = if q == 0 { self.alu_sbc16(hl, rp) } else { self.alu_adc16(hl, rp) };
                self.set_hl(result);
                Ok(15)
            }
            (1, 3) => {
                let nn = self.fetch_word(bus, bytes);
                if q == 0 {
                    let val = self.get_rp(p);
                    let [lo, hi] = val.to_le_bytes();
                    self.write_mem(bus, nn, lo);
                    self.write_mem(bus, nn.wrapping_add(1), hi);
                } else {
                    let lo = self.read_mem(bus, nn);
                    let hi = self.read_mem(bus, nn.wrapping_add(1));
                    self.set_rp(p, u16::from_le_bytes([lo, hi]));
                }
                Ok(20)
            }
            (1, 4) => {
                // NEG (documented at y=2; every y gives the same result).
                let old = self.a;
                self.a = 0;
                self.alu_sub(old, false);
                Ok(8)
            }
            (1, 5) => {
                self.pc = self.pop_word(bus);
                if y == 1 {
                    self.fire_return_handlers();
                } else {
                    self.iff1 = self.iff2;
                    self.fire_return_handlers();
                }
                Ok(14)
            }
            (1, 6) => {
                self.im = match y {
                    0 | 1 | 4 | 5 => super::InterruptMode::Mode0,
                    2 | 6 => super::InterruptMode::Mode1,
                    3 | 7 => super::InterruptMode::Mode2,
                    _ => unreachable!("3-bit field"),
                };
                Ok(8)
            }
            (1, 7) => match y {
                0 => {
                    self.i = self.a;
                    Ok(9)
                }
                1 => {
                    self.r = self.a;
                    Ok(9)
                }
                2 => {
                    self.a = self.i;
                    self.set_sz_xy_flags(self.a);
                    self.set_flag_h(false);
                    self.set_flag_n(false);
                    self.set_flag_pv(self.iff2);
                    Ok(9)
                }
                3 => {
                    self.a = self.r;
                    self.set_sz_xy_flags(self.a);
                    self.set_flag_h(false);
                    self.set_flag_n(false);
                    self.set_flag_pv(self.iff2);
                    Ok(9)
                }
                4 => {
                    self.op_rrd(bus);
                    Ok(18)
                }
                5 => {
                    self.op_rld(bus);
                    Ok(18)
                }
                _ => Err(invalid_opcode(Prefix::Ed, op)),
            },
            (2, 0..=3) if y >= 4 => {
                let increment = matches!(y, 4 | 6);
                let repeat = matches!(y, 6 | 7);
                match z {
                    0 => {
                        self.op_ldi(bus, increment);
                        if repeat && self.bc() != 0 {
                            self.pc = self.pc.wrapping_sub(2);
                            Ok(21)
                        } else {
                            Ok(16)
                        }
                    }
                    1 => {
                        self.op_cpi(bus, increment);
                        if repeat && self.bc() != 0 && !self.flag_z() {
                            self.pc = self.pc.wrapping_sub(2);
                            Ok(21)
                        } else {
                            Ok(16)
                        }
                    }
                    2 => {
                        self.op_ini(bus, increment);
                        if repeat && self.bc() != 0 {
                            self.pc = self.pc.wrapping_sub(2);
                            Ok(21)
                        } else {
                            Ok(16)
                        }
                    }
                    3 => {
                        self.op_outi(bus, increment);
                        if repeat && self.bc() != 0 {
                            self.pc = self.pc.wrapping_sub(2);
                            Ok(21)
                        } else {
                            Ok(16)
                        }
                    }
                    _ => unreachable!("3-bit field"),
                }
            }
            _ => Err(invalid_opcode(Prefix::Ed, op)),
        }
    }

    fn op_rrd(&mut self, bus: &mut impl Bus) {
        let addr = self.hl();
        let m = self.read_mem(bus, addr);
        let new_m = (self.a << 4) | (m >> 4);
        let new_a = (self.a & 0xF0) | (m & 0x0F);
        self.write_mem(bus, addr, new_m);
        self.a = new_a;
        self.set_sz_xy_flags(self.a);
        self.set_flag_h(false);
        self.set_flag_pv(Self::parity(self.a));
        self.set_flag_n(false);
    }

    fn op_rld(&mut self, bus: &mut impl Bus) {
        let addr = self.hl();
        let m = self.read_mem(bus, addr);
        let new_m = (m << 4) | (self.a & 0x0F);
        let new_a = (self.a & 0xF0) | (m >> 4);
        self.write_mem(bus, addr, new_m);
        self.a = new_a;
        self.set_sz_xy_flags(self.a);
        self.set_flag_h(false);
        self.set_flag_pv(Self::parity(self.a));
        self.set_flag_n(false);
    }

    // -----------------------------------------------------------------
    // Base table (unprefixed, and DD/FD substituted)
    // -----------------------------------------------------------------

    fn execute_base(&mut self, opcode: u8, index: Index, bus: &mut impl Bus, bytes: &mut Vec<u8>) -> Result<u32> {
        let x = opcode >> 6;
        let y = (opcode >> 3) & 7;
        let z = opcode & 7;
        let p = y >> 1;
        let q = y & 1;

        // Any opcode reached under a DD/FD prefix costs 4 T-states more
        // than its unprefixed form, *except* the handful whose register
        // field 6 names (IX+d)/(IY+d) directly: those already return their
        // own complete, displacement-inclusive total.
        let complete_total = index != Index::Hl && Self::touches_indexed_operand(x, y, z);

        let base = match x {
            0 => self.execute_x0(y, z, p, q, index, bus, bytes)?,
            1 => self.execute_x1(y, z, index, bus, bytes)?,
            2 => self.execute_x2(y, z, index, bus, bytes)?,
            3 => self.execute_x3(y, z, p, q, index, bus, bytes)?,
            _ => unreachable!("2-bit opcode category"),
        };

        Ok(if index != Index::Hl && !complete_total { base + 4 } else { base })
    }

    /// True when this opcode's register field names (HL)/(IX+d)/(IY+d)
    /// (as opposed to a plain-register or register-pair substitution),
    /// meaning its handler already folds in the full indexed timing.
    fn touches_indexed_operand(x: u8, y: u8, z: u8) -> bool {
        match x {
            0 => matches!(z, 4 | 5 | 6) && y == 6,
            1 => !(y == 6 && z == 6) && (y == 6 || z == 6),
            2 => z == 6,
            _ => false,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_x0(
        &mut self,
        y: u8,
        z: u8,
        p: u8,
        q: u8,
        index: Index,
        bus: &mut impl Bus,
        bytes: &mut Vec<u8>,
    ) -> Result<u32> {
        match z {
            0 => match y {
                0 => Ok(4), // NOP
                1 => {
                    self.ex_af();
                    Ok(4)
                }
                2 => {
                    // DJNZ d
                    let d = self.fetch_data_byte(bus, bytes) as i8;
                    self.b = self.b.wrapping_sub(1);
                    if self.b != 0 {
                        self.pc = (self.pc as i32 + d as i32) as u16;
                        Ok(13)
                    } else {
                        Ok(8)
                    }
                }
                3 => {
                    // JR d
                    let d = self.fetch_data_byte(bus, bytes) as i8;
                    self.pc = (self.pc as i32 + d as i32) as u16;
                    Ok(12)
                }
                4..=7 => {
                    // JR cc[y-4],d
                    let d = self.fetch_data_byte(bus, bytes) as i8;
                    if self.check_cc(y - 4) {
                        self.pc = (self.pc as i32 + d as i32) as u16;
                        Ok(12)
                    } else {
                        Ok(7)
                    }
                }
                _ => unreachable!("3-bit field"),
            },
            1 => {
                if q == 0 {
                    let nn = self.fetch_word(bus, bytes);
                    self.set_rp_idx(p, nn, index);
                    Ok(10)
                } else {
                    let left = self.get_rp_idx(2, index);
                    let right = self.get_rp_idx(p, index);
                    let result = self.alu_add16(left, right);
                    self.set_rp_idx(2, result, index);
                    Ok(11)
                }
            }
            2 => match (p, q) {
                (0, 0) => {
                    self.write_mem(bus, self.bc(), self.a);
                    Ok(7)
                }
                (1, 0) => {
                    self.write_mem(bus, self.de(), self.a);
                    Ok(7)
                }
                (2, 0) => {
                    let nn = self.fetch_word(bus, bytes);
                    let val = self.get_rp_idx(2, index);
                    let [lo, hi] = val.to_le_bytes();
                    self.write_mem(bus, nn, lo);
                    self.write_mem(bus, nn.wrapping_add(1), hi);
                    Ok(16)
                }
                (3, 0) => {
                    let nn = self.fetch_word(bus, bytes);
                    self.write_mem(bus, nn, self.a);
                    Ok(13)
                }
                (0, 1) => {
                    self.a = self.read_mem(bus, self.bc());
                    Ok(7)
                }
                (1, 1) => {
                    self.a = self.read_mem(bus, self.de());
                    Ok(7)
                }
                (2, 1) => {
                    let nn = self.fetch_word(bus, bytes);
                    let lo = self.read_mem(bus, nn);
                    let hi = self.read_mem(bus, nn.wrapping_add(1));
                    self.set_rp_idx(2, u16::from_le_bytes([lo, hi]), index);
                    Ok(16)
                }
                (3, 1) => {
                    let nn = self.fetch_word(bus, bytes);
                    self.a = self.read_mem(bus, nn);
                    Ok(13)
                }
                _ => unreachable!("2-bit fields"),
            },
            3 => {
                let val = self.get_rp_idx(p, index);
                let result = if q == 0 { val.wrapping_add(1) } else { val.wrapping_sub(1) };
                self.set_rp_idx(p, result, index);
                Ok(6)
            }
            4 => {
                if y == 6 {
                    let addr = self.indexed_addr(index, bus, bytes);
                    let val = self.read_mem(bus, addr);
                    let result = self.alu_inc(val);
                    self.write_mem(bus, addr, result);
                    Ok(if index == Index::Hl { 11 } else { 23 })
                } else {
                    let val = self.half_or_reg(y, index);
                    let result = self.alu_inc(val);
                    self.set_half_or_reg(y, result, index);
                    Ok(4)
                }
            }
            5 => {
                if y == 6 {
                    let addr = self.indexed_addr(index, bus, bytes);
                    let val = self.read_mem(bus, addr);
                    let result = self.alu_dec(val);
                    self.write_mem(bus, addr, result);
                    Ok(if index == Index::Hl { 11 } else { 23 })
                } else {
                    let val = self.half_or_reg(y, index);
                    let result = self.alu_dec(val);
                    self.set_half_or_reg(y, result, index);
                    Ok(4)
                }
            }
            6 => {
                if y == 6 {
                    let addr = self.indexed_addr(index, bus, bytes);
                    let n = self.fetch_data_byte(bus, bytes);
                    self.write_mem(bus, addr, n);
                    Ok(if index == Index::Hl { 10 } else { 19 })
                } else {
                    let n = self.fetch_data_byte(bus, bytes);
                    self.set_half_or_reg(y, n, index);
                    Ok(7)
                }
            }
            7 => {
                match y {
                    0 => {
                        let c = self.a & 0x80 != 0;
                        self.a = self.a.rotate_left(1);
                        self.set_flag_h(false);
                        self.set_flag_n(false);
                        self.set_flag_c(c);
                        self.set_flag(flags::X, self.a & flags::X != 0);
                        self.set_flag(flags::Y, self.a & flags::Y != 0);
                    }
                    1 => {
                        let c = self.a & 0x01 != 0;
                        self.a = self.a.rotate_right(1);
                        self.set_flag_h(false);
                        self.set_flag_n(false);
                        self.set_flag_c(c);
                        self.set_flag(flags::X, self.a & flags::X != 0);
                        self.set_flag(flags::Y, self.a & flags::Y != 0);
                    }
                    2 => {
                        let c = self.a & 0x80 != 0;
                        let carry_in = self.flag_c() as u8;
                        self.a = (self.a << 1) | carry_in;
                        self.set_flag_h(false);
                        self.set_flag_n(false);
                        self.set_flag_c(c);
                        self.set_flag(flags::X, self.a & flags::X != 0);
                        self.set_flag(flags::Y, self.a & flags::Y != 0);
                    }
                    3 => {
                        let c = self.a & 0x01 != 0;
                        let carry_in = self.flag_c() as u8;
                        self.a = (self.a >> 1) | (carry_in << 7);
                        self.set_flag_h(false);
                        self.set_flag_n(false);
                        self.set_flag_c(c);
                        self.set_flag(flags::X, self.a & flags::X != 0);
                        self.set_flag(flags::Y, self.a & flags::Y != 0);
                    }
                    4 => self.daa(),
                    5 => {
                        self.a = !self.a;
                        self.set_flag_h(true);
                        self.set_flag_n(true);
                        self.set_flag(flags::X, self.a & flags::X != 0);
                        self.set_flag(flags::Y, self.a & flags::Y != 0);
                    }
                    6 => {
                        self.set_flag_h(false);
                        self.set_flag_n(false);
                        self.set_flag_c(true);
                        self.set_flag(flags::X, self.a & flags::X != 0);
                        self.set_flag(flags::Y, self.a & flags::Y != 0);
                    }
                    7 => {
                        let old_c = self.flag_c();
                        self.set_flag_h(old_c);
                        self.set_flag_n(false);
                        self.set_flag_c(!old_c);
                        self.set_flag(flags::X, self.a & flags::X != 0);
                        self.set_flag(flags::Y, self.a & flags::Y != 0);
                    }
                    _ => unreachable!("3-bit field"),
                }
                Ok(4)
            }
            _ => unreachable!("3-bit field"),
        }
    }

    /// LD r,r' / HALT (y=6,z=6).
    fn execute_x1(&mut self, y: u8, z: u8, index: Index, bus: &mut impl Bus, bytes: &mut Vec<u8>) -> Result<u32> {
        if y == 6 && z == 6 {
            self.halted = true;
            return Ok(4);
        }
        let val = self.get_reg8_idx(z, index, bus, bytes);
        self.set_reg8_idx(y, val, index, bus, bytes);
        Ok(if y == 6 || z == 6 {
            if index == Index::Hl {
                7
            } else {
                19
            }
        } else {
            4
        })
    }

    /// ALU A,r[z].
    fn execute_x2(&mut self, y: u8, z: u8, index: Index, bus: &mut impl Bus, bytes: &mut Vec<u8>) -> Result<u32> {
        let val = self.get_reg8_idx(z, index, bus, bytes);
        self.alu_dispatch(y, val);
        Ok(if z == 6 {
            if index == Index::Hl {
                7
            } else {
                19
            }
        } else {
            4
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_x3(
        &mut self,
        y: u8,
        z: u8,
        p: u8,
        q: u8,
        index: Index,
        bus: &mut impl Bus,
        bytes: &mut Vec<u8>,
    ) -> Result<u32> {
        match z {
            0 => {
                // RET cc[y]
                if self.check_cc(y) {
                    self.pc = self.pop_word(bus);
                    self.fire_return_handlers();
                    Ok(11)
                } else {
                    Ok(5)
                }
            }
            1 => {
                if q == 0 {
                    let val = self.pop_word(bus);
                    self.set_rp2_idx(p, val, index);
                    Ok(10)
                } else {
                    match p {
                        0 => {
                            self.pc = self.pop_word(bus);
                            self.fire_return_handlers();
                            Ok(10)
                        }
                        1 => {
                            self.exx();
                            Ok(4)
                        }
                        2 => {
                            self.pc = self.get_rp_idx(2, index);
                            Ok(4)
                        }
                        3 => {
                            self.sp = self.get_rp_idx(2, index);
                            Ok(6)
                        }
                        _ => unreachable!("2-bit field"),
                    }
                }
            }
            2 => {
                // JP cc[y],nn
                let nn = self.fetch_word(bus, bytes);
                if self.check_cc(y) {
                    self.pc = nn;
                }
                Ok(10)
            }
            3 => match y {
                0 => {
                    let nn = self.fetch_word(bus, bytes);
                    self.pc = nn;
                    Ok(10)
                }
                1 => unreachable!("CB is intercepted before reaching the base table"),
                2 => {
                    let n = self.fetch_data_byte(bus, bytes);
                    let port = self.port_n(&*bus, n);
                    self.io_out(bus, port, self.a);
                    Ok(11)
                }
                3 => {
                    let n = self.fetch_data_byte(bus, bytes);
                    let port = self.port_n(&*bus, n);
                    self.a = self.io_in(bus, port);
                    Ok(11)
                }
                4 => {
                    // EX (SP),HL/IX/IY
                    let sp = self.sp;
                    let lo = self.read_mem(bus, sp);
                    let hi = self.read_mem(bus, sp.wrapping_add(1));
                    let val = self.get_rp_idx(2, index);
                    let [new_lo, new_hi] = val.to_le_bytes();
                    self.write_mem(bus, sp, new_lo);
                    self.write_mem(bus, sp.wrapping_add(1), new_hi);
                    self.set_rp_idx(2, u16::from_le_bytes([lo, hi]), index);
                    Ok(19)
                }
                5 => {
                    self.ex_de_hl();
                    Ok(4)
                }
                6 => {
                    self.iff1 = false;
                    self.iff2 = false;
                    Ok(4)
                }
                7 => {
                    self.iff1 = true;
                    self.iff2 = true;
                    self.arm_ei_holdoff();
                    Ok(4)
                }
                _ => unreachable!("3-bit field"),
            },
            4 => {
                // CALL cc[y],nn
                let nn = self.fetch_word(bus, bytes);
                if self.check_cc(y) {
                    self.push_word(bus, self.pc);
                    self.pc = nn;
                    self.fire_call_handlers();
                    Ok(17)
                } else {
                    Ok(10)
                }
            }
            5 => {
                if q == 0 {
                    let val = self.get_rp2_idx(p, index);
                    self.push_word(bus, val);
                    Ok(11)
                } else if p == 0 {
                    let nn = self.fetch_word(bus, bytes);
                    self.push_word(bus, self.pc);
                    self.pc = nn;
                    self.fire_call_handlers();
                    Ok(17)
                } else {
                    unreachable!("DD/ED/FD are intercepted before reaching the base table")
                }
            }
            6 => {
                let n = self.fetch_data_byte(bus, bytes);
                self.alu_dispatch(y, n);
                Ok(7)
            }
            7 => {
                // RST y*8
                self.push_word(bus, self.pc);
                self.pc = (y as u16) * 8;
                self.fire_call_handlers();
                Ok(11)
            }
            _ => unreachable!("3-bit field"),
        }
    }
}
