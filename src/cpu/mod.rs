//! Zilog Z80 CPU core.
//!
//! The CPU owns a single mutable register file and no memory of its own;
//! every byte it reads or writes crosses the [`crate::bus::Bus`] the host
//! supplies to [`Cpu::execute`].
//!
//! # Module organisation
//!
//! - `flags`: bit constants for the F register
//! - `helpers`: register accessors, fetch/push/pop, ALU primitives
//! - `execute`: the prefix-driven instruction decoder and handlers

use crate::bus::{Bus, WaitStates};
use crate::debug::Debug;
use crate::error::{Prefix, Result, Z80Error};

mod execute;
pub mod flags;
mod helpers;

#[cfg(test)]
mod tests;

pub use flags::*;

/// Maskable interrupt mode, set by `IM 0`/`IM 1`/`IM 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterruptMode {
    /// Mode 0: execute the byte the host places on the data bus during
    /// interrupt acknowledge (in practice an RST opcode).
    #[default]
    Mode0,
    /// Mode 1: always call 0x0038.
    Mode1,
    /// Mode 2: vectored — `(I << 8) | (vector & 0xFE)` addresses a table
    /// of jump targets.
    Mode2,
}

/// Z80 CPU register file and execution state.
pub struct Cpu {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,

    pub a_prime: u8,
    pub f_prime: u8,
    pub b_prime: u8,
    pub c_prime: u8,
    pub d_prime: u8,
    pub e_prime: u8,
    pub h_prime: u8,
    pub l_prime: u8,

    pub ix: u16,
    pub iy: u16,

    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    pub r: u8,

    pub iff1: bool,
    pub iff2: bool,
    pub im: InterruptMode,
    pub halted: bool,

    /// Counts down after EI retires: 1 immediately after EI, 0 once the
    /// single instruction following EI has retired. While nonzero, IRQ
    /// acceptance is blocked.
    ei_holdoff: u8,

    /// Level-held maskable interrupt request together with its vector
    /// byte (meaningful for IM 0 and IM 2), cleared only once accepted.
    irq_pending: Option<u8>,
    nmi_pending: bool,

    /// Edge-triggered cancellation flag set by `request_break`.
    break_requested: bool,

    /// M1 (opcode/prefix) fetches made by the instruction currently
    /// decoding, reset at the start of every `step_one`.
    pub(crate) fetch_count: u32,
    /// Non-M1 memory and port accesses made by the instruction currently
    /// decoding, reset at the start of every `step_one`.
    pub(crate) mem_count: u32,

    pub wait_states: WaitStates,
    pub debug: Debug,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Create a CPU with a zeroed register file, matching the state of a
    /// freshly reset Z80.
    pub fn new() -> Self {
        Self {
            a: 0,
            f: 0,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            a_prime: 0,
            f_prime: 0,
            b_prime: 0,
            c_prime: 0,
            d_prime: 0,
            e_prime: 0,
            h_prime: 0,
            l_prime: 0,
            ix: 0,
            iy: 0,
            sp: 0,
            pc: 0,
            i: 0,
            r: 0,
            iff1: false,
            iff2: false,
            im: InterruptMode::Mode0,
            halted: false,
            ei_holdoff: 0,
            irq_pending: None,
            nmi_pending: false,
            break_requested: false,
            fetch_count: 0,
            mem_count: 0,
            wait_states: WaitStates::NONE,
            debug: Debug::new(),
        }
    }

    /// Zero every register and flip-flop, as if the host pulled RESET.
    /// Wait-state configuration and registered observers survive a
    /// reset; they belong to the host session, not the silicon.
    pub fn reset(&mut self) {
        let wait_states = self.wait_states;
        let debug = std::mem::take(&mut self.debug);
        *self = Self::new();
        self.wait_states = wait_states;
        self.debug = debug;
    }

    // ---------------------------------------------------------------
    // Host-facing control surface
    // ---------------------------------------------------------------

    /// Queue a maskable interrupt carrying the vector byte the host
    /// places on the data bus during acknowledge. Accepted at the next
    /// instruction boundary once IFF1 is set and the EI holdoff window
    /// has elapsed; until then it stays pending.
    pub fn generate_irq(&mut self, vector: u8) {
        self.irq_pending = Some(vector);
    }

    /// Queue a non-maskable interrupt. NMI is always accepted at the
    /// next instruction boundary regardless of IFF1.
    pub fn generate_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Ask `execute` to stop at the next instruction boundary. Edge
    /// triggered: callable from inside a breakpoint or observer
    /// callback, since those run with `&mut Cpu` in hand.
    pub fn request_break(&mut self) {
        self.break_requested = true;
    }

    pub fn execute_for_frame_4mhz(&mut self, bus: &mut impl Bus) -> Result<i64> {
        self.execute(4_194_304 / 60, bus)
    }

    pub fn execute_for_frame_8mhz(&mut self, bus: &mut impl Bus) -> Result<i64> {
        self.execute(8_388_608 / 60, bus)
    }

    /// Run instructions until `cycle_budget` T-states have been consumed,
    /// HALT is trapping execution with the budget exhausted, or a break
    /// was requested. Returns the number of cycles actually consumed.
    pub fn execute(&mut self, cycle_budget: i64, bus: &mut impl Bus) -> Result<i64> {
        self.break_requested = false;
        let mut consumed: i64 = 0;

        loop {
            if self.nmi_pending {
                self.nmi_pending = false;
                let cycles = self.handle_nmi(bus);
                consumed += cycles as i64;
                self.fire_consume_clock(cycles);
                if consumed >= cycle_budget || self.break_requested {
                    break;
                }
                continue;
            }

            if self.irq_pending.is_some() && self.iff1 && self.ei_holdoff == 0 {
                let vector = self.irq_pending.take().unwrap();
                let cycles = self.handle_irq(bus, vector)?;
                consumed += cycles as i64;
                self.fire_consume_clock(cycles);
                if consumed >= cycle_budget || self.break_requested {
                    break;
                }
                continue;
            }

            if self.halted {
                consumed += 4;
                if consumed >= cycle_budget {
                    break;
                }
                continue;
            }

            self.fire_break_points();
            if self.break_requested {
                break;
            }

            let (cycles, bytes) = self.step_one(bus)?;
            consumed += cycles as i64;
            self.fire_break_opcodes(&bytes);
            self.fire_consume_clock(cycles);

            if consumed >= cycle_budget || self.break_requested {
                break;
            }
        }

        Ok(consumed)
    }

    /// Fetch and execute exactly one instruction, honouring the EI
    /// holdoff window. Returns the T-states consumed and the raw opcode
    /// bytes (prefix included) for opcode-breakpoint matching.
    fn step_one(&mut self, bus: &mut impl Bus) -> Result<(u32, Vec<u8>)> {
        if self.ei_holdoff > 0 {
            self.ei_holdoff -= 1;
        }

        let pc_at_fetch = self.pc;
        let mut bytes = Vec::with_capacity(4);
        self.fetch_count = 0;
        self.mem_count = 0;
        match self.decode_and_execute(bus, &mut bytes) {
            Ok(cycles) => {
                let delta = self.wait_states.total_delta(self.fetch_count, self.mem_count);
                let adjusted = (cycles as i64 + delta).max(0) as u32;
                Ok((adjusted, bytes))
            }
            Err(err) => {
                self.pc = pc_at_fetch;
                Err(err)
            }
        }
    }

    /// Called by the EI handler: arms the one-instruction holdoff window.
    pub(crate) fn arm_ei_holdoff(&mut self) {
        self.ei_holdoff = 1;
    }

    fn handle_irq(&mut self, bus: &mut impl Bus, vector: u8) -> Result<u32> {
        if self.halted {
            self.halted = false;
            self.pc = self.pc.wrapping_add(1);
        }
        self.iff1 = false;
        self.iff2 = false;

        match self.im {
            InterruptMode::Mode0 | InterruptMode::Mode1 => {
                self.push_word(bus, self.pc);
                self.pc = 0x0038;
                Ok(13)
            }
            InterruptMode::Mode2 => {
                let table_addr = ((self.i as u16) << 8) | (vector & 0xFE) as u16;
                let lo = bus.read_byte(table_addr);
                let hi = bus.read_byte(table_addr.wrapping_add(1));
                self.push_word(bus, self.pc);
                self.pc = u16::from_le_bytes([lo, hi]);
                Ok(19)
            }
        }
    }

    fn handle_nmi(&mut self, bus: &mut impl Bus) -> u32 {
        if self.halted {
            self.halted = false;
            self.pc = self.pc.wrapping_add(1);
        }
        self.iff2 = self.iff1;
        self.iff1 = false;
        self.push_word(bus, self.pc);
        self.pc = 0x0066;
        11
    }
}

pub(crate) fn invalid_opcode(prefix: Prefix, byte: u8) -> Z80Error {
    Z80Error::InvalidOpcode { prefix, byte }
}
