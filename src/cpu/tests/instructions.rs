//! Opcode-level tests across the base, CB, ED and indexed tables.

use super::{run_one, TestBus};
use crate::cpu::Cpu;

fn cpu_at(pc: u16) -> Cpu {
    let mut cpu = Cpu::new();
    cpu.pc = pc;
    cpu
}

// -----------------------------------------------------------------
// Basic load / arithmetic / timing
// -----------------------------------------------------------------

#[test]
fn ld_bc_nn_loads_immediate_and_costs_10() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0x01, 0x34, 0x12]);
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cpu.bc(), 0x1234);
    assert_eq!(cycles, 10);
    assert_eq!(cpu.pc, 3);
}

#[test]
fn ld_r_r_round_trip() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    // LD B,A ; LD A,B
    bus.load(0, &[0x47, 0x78]);
    cpu.a = 0x5A;
    run_one(&mut cpu, &mut bus);
    assert_eq!(cpu.b, 0x5A);
    cpu.a = 0;
    run_one(&mut cpu, &mut bus);
    assert_eq!(cpu.a, 0x5A);
}

#[test]
fn add_a_n_sets_flags() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xC6, 0x01]); // ADD A,1
    cpu.a = 0xFF;
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cpu.a, 0);
    assert!(cpu.flag_z());
    assert!(cpu.flag_c());
    assert!(cpu.flag_h());
    assert!(!cpu.flag_n());
    assert_eq!(cycles, 7);
}

#[test]
fn sub_overflow_sets_pv() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xD6, 0x01]); // SUB 1
    cpu.a = 0x80;
    run_one(&mut cpu, &mut bus);
    assert_eq!(cpu.a, 0x7F);
    assert!(cpu.flag_pv());
    assert!(cpu.flag_n());
}

#[test]
fn inc_b_does_not_touch_carry() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0x04]); // INC B
    cpu.b = 0xFF;
    cpu.set_flag_c(true);
    run_one(&mut cpu, &mut bus);
    assert_eq!(cpu.b, 0);
    assert!(cpu.flag_z());
    assert!(cpu.flag_c(), "INC must not affect carry");
}

#[test]
fn ld_hl_mem_and_write_back() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0x36, 0x99]); // LD (HL),99
    cpu.set_hl(0x8000);
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(bus.mem[0x8000], 0x99);
    assert_eq!(cycles, 10);
}

// -----------------------------------------------------------------
// Stack
// -----------------------------------------------------------------

#[test]
fn push_pop_round_trip() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xC5, 0xD1]); // PUSH BC ; POP DE
    cpu.set_bc(0xBEEF);
    cpu.sp = 0xFFFE;
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cycles, 11);
    assert_eq!(cpu.sp, 0xFFFC);
    run_one(&mut cpu, &mut bus);
    assert_eq!(cpu.de(), 0xBEEF);
    assert_eq!(cpu.sp, 0xFFFE);
}

// -----------------------------------------------------------------
// Control flow timing
// -----------------------------------------------------------------

#[test]
fn ret_unconditional_costs_10() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xC9]); // RET
    cpu.sp = 0x9000;
    bus.load(0x9000, &[0x00, 0x80]);
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cycles, 10);
    assert_eq!(cpu.pc, 0x8000);
}

#[test]
fn ret_cc_taken_and_not_taken_timing() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xC8]); // RET Z
    cpu.sp = 0x9000;
    bus.load(0x9000, &[0x00, 0x80]);
    cpu.set_flag_z(false);
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cycles, 5);
    assert_eq!(cpu.pc, 1);

    cpu.pc = 0;
    cpu.set_flag_z(true);
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cycles, 11);
    assert_eq!(cpu.pc, 0x8000);
}

#[test]
fn djnz_taken_and_not_taken_timing() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0x10, 0x05]); // DJNZ +5
    cpu.b = 2;
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cycles, 13);
    assert_eq!(cpu.pc, 2i32.wrapping_add(5) as u16);

    cpu.pc = 0;
    cpu.b = 1;
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cycles, 8);
    assert_eq!(cpu.pc, 2);
}

#[test]
fn call_and_rst_push_return_address() {
    let mut cpu = cpu_at(0x0200);
    let mut bus = TestBus::new();
    bus.load(0x0200, &[0xCD, 0x00, 0x90]); // CALL 0x9000
    cpu.sp = 0xFFFE;
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cycles, 17);
    assert_eq!(cpu.pc, 0x9000);
    assert_eq!(cpu.sp, 0xFFFC);
    assert_eq!(u16::from_le_bytes([bus.mem[0xFFFC], bus.mem[0xFFFD]]), 0x0203);
}

// -----------------------------------------------------------------
// CB-prefixed: rotate/shift/BIT/RES/SET
// -----------------------------------------------------------------

#[test]
fn bit_hl_costs_12_and_does_not_write() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xCB, 0x46]); // BIT 0,(HL)
    cpu.set_hl(0x8000);
    bus.mem[0x8000] = 0x01;
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cycles, 12);
    assert!(!cpu.flag_z());
    assert_eq!(bus.mem[0x8000], 0x01);
}

#[test]
fn res_set_hl_cost_15_and_write_back() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xCB, 0x86, 0xCB, 0xC6]); // RES 0,(HL) ; SET 0,(HL)
    cpu.set_hl(0x8000);
    bus.mem[0x8000] = 0xFF;
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cycles, 15);
    assert_eq!(bus.mem[0x8000], 0xFE);
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cycles, 15);
    assert_eq!(bus.mem[0x8000], 0xFF);
}

#[test]
fn sll_is_undocumented_shift_left_setting_bit0() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xCB, 0x30]); // SLL B
    cpu.b = 0x01;
    run_one(&mut cpu, &mut bus);
    assert_eq!(cpu.b, 0x03);
    assert!(!cpu.flag_c());
}

// -----------------------------------------------------------------
// Indexed (DD/FD) timing
// -----------------------------------------------------------------

#[test]
fn ld_ix_nn_costs_14() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xDD, 0x21, 0x34, 0x12]); // LD IX,0x1234
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cpu.ix, 0x1234);
    assert_eq!(cycles, 14);
}

#[test]
fn ld_r_ix_d_costs_19() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xDD, 0x7E, 0x02]); // LD A,(IX+2)
    cpu.ix = 0x8000;
    bus.mem[0x8002] = 0x42;
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cpu.a, 0x42);
    assert_eq!(cycles, 19);
}

#[test]
fn inc_ix_d_costs_23() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xDD, 0x34, 0x01]); // INC (IX+1)
    cpu.ix = 0x8000;
    bus.mem[0x8001] = 0x41;
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(bus.mem[0x8001], 0x42);
    assert_eq!(cycles, 23);
}

#[test]
fn ld_ix_d_n_costs_19() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xDD, 0x36, 0x01, 0x99]); // LD (IX+1),0x99
    cpu.ix = 0x8000;
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(bus.mem[0x8001], 0x99);
    assert_eq!(cycles, 19);
}

#[test]
fn ld_b_ixh_noni_form_costs_8() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xDD, 0x44]); // LD B,IXH
    cpu.ix = 0xABCD;
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cpu.b, 0xAB);
    assert_eq!(cycles, 8);
}

#[test]
fn ex_sp_ix_costs_23_and_swaps() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xDD, 0xE3]); // EX (SP),IX
    cpu.ix = 0x1234;
    cpu.sp = 0x9000;
    bus.load(0x9000, &[0x78, 0x56]);
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cycles, 23);
    assert_eq!(cpu.ix, 0x5678);
    assert_eq!(u16::from_le_bytes([bus.mem[0x9000], bus.mem[0x9001]]), 0x1234);
}

#[test]
fn ddcb_bit_costs_20_and_rotate_costs_23_with_copyback() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xDD, 0xCB, 0x02, 0x46]); // BIT 0,(IX+2)
    cpu.ix = 0x8000;
    bus.mem[0x8002] = 0x01;
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cycles, 20);

    // RLC (IX+2),B: rotate-and-copy-to-B form.
    cpu.pc = 0;
    bus.load(0, &[0xDD, 0xCB, 0x02, 0x00]);
    bus.mem[0x8002] = 0x80;
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cycles, 23);
    assert_eq!(bus.mem[0x8002], 0x01);
    assert_eq!(cpu.b, 0x01);
}

// -----------------------------------------------------------------
// Block instructions
// -----------------------------------------------------------------

#[test]
fn ldir_repeats_until_bc_zero() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xED, 0xB0]); // LDIR
    bus.load(0x8000, &[1, 2, 3]);
    cpu.set_hl(0x8000);
    cpu.set_de(0x9000);
    cpu.set_bc(3);

    let c1 = run_one(&mut cpu, &mut bus);
    assert_eq!(c1, 21, "repeat still pending rewinds PC and costs 21");
    assert_eq!(cpu.pc, 0, "PC rewinds by 2 to re-enter LDIR");
    assert_eq!(cpu.bc(), 2);

    let c2 = run_one(&mut cpu, &mut bus);
    assert_eq!(c2, 21);
    let c3 = run_one(&mut cpu, &mut bus);
    assert_eq!(c3, 16, "final iteration does not repeat");
    assert_eq!(cpu.bc(), 0);
    assert_eq!(cpu.pc, 2);
    assert_eq!(&bus.mem[0x9000..0x9003], &[1, 2, 3]);
    assert!(!cpu.flag_pv());
    assert!(!cpu.flag_h());
    assert!(!cpu.flag_n());
}

#[test]
fn cpir_stops_on_match_even_if_bc_nonzero() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xED, 0xB1]); // CPIR
    bus.load(0x8000, &[1, 2, 3]);
    cpu.set_hl(0x8000);
    cpu.set_bc(3);
    cpu.a = 2;

    run_one(&mut cpu, &mut bus); // no match, BC=2, repeats
    assert_eq!(cpu.pc, 0);
    let cycles = run_one(&mut cpu, &mut bus); // match on byte 2
    assert_eq!(cycles, 16);
    assert!(cpu.flag_z());
    assert_eq!(cpu.pc, 2);
    assert_eq!(cpu.bc(), 1);
}

#[test]
fn inir_terminates_when_bc_reaches_zero() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xED, 0xB2]); // INIR
    cpu.set_hl(0x8000);
    cpu.b = 1;
    cpu.c = 0;
    bus.in_values.insert(0, 0x55);
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cycles, 16, "BC reaches 0 after a single iteration");
    assert_eq!(bus.mem[0x8000], 0x55);
    assert!(cpu.flag_z());
}

#[test]
fn inir_keeps_repeating_while_bc_is_nonzero_even_if_b_hits_zero() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xED, 0xB2]); // INIR
    cpu.set_hl(0x8000);
    cpu.b = 1;
    cpu.c = 0x10;
    bus.in_values.insert(0x10, 0x55);
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cycles, 21, "B wrapped to 0 but BC (0x0010) is still nonzero");
    assert_eq!(cpu.pc, 0, "PC rewinds to re-execute INIR");
}

#[test]
fn outi_writes_current_hl_byte_to_port_c() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xED, 0xA3]); // OUTI
    cpu.set_hl(0x8000);
    bus.mem[0x8000] = 0x77;
    cpu.b = 2;
    cpu.c = 0x20;
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cycles, 16);
    assert_eq!(cpu.b, 1);
    assert_eq!(bus.out_log, vec![(0x20, 0x77)]);
}

// -----------------------------------------------------------------
// ED block: IN/OUT(C), NEG, RRD/RLD, exchanges
// -----------------------------------------------------------------

#[test]
fn neg_computes_twos_complement() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xED, 0x44]); // NEG
    cpu.a = 1;
    run_one(&mut cpu, &mut bus);
    assert_eq!(cpu.a, 0xFF);
    assert!(cpu.flag_n());
    assert!(cpu.flag_c());
}

#[test]
fn rrd_rotates_nibbles_between_a_and_memory() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xED, 0x67]); // RRD
    cpu.set_hl(0x8000);
    cpu.a = 0x84;
    bus.mem[0x8000] = 0x20;
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cycles, 18);
    assert_eq!(cpu.a, 0x80);
    assert_eq!(bus.mem[0x8000], 0x42);
}

#[test]
fn adc_hl_sbc_hl_update_flags() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xED, 0x4A]); // ADC HL,BC
    cpu.set_hl(0xFFFF);
    cpu.set_bc(1);
    cpu.set_flag_c(false);
    let cycles = run_one(&mut cpu, &mut bus);
    assert_eq!(cycles, 15);
    assert_eq!(cpu.hl(), 0);
    assert!(cpu.flag_z());
    assert!(cpu.flag_c());
}

// -----------------------------------------------------------------
// Port width
// -----------------------------------------------------------------

#[test]
fn port_width_bit8_uses_only_c() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.load(0, &[0xED, 0x40]); // IN B,(C)
    cpu.b = 0xAB;
    cpu.c = 0x10;
    bus.in_values.insert(0x10, 0x5A);
    run_one(&mut cpu, &mut bus);
    assert_eq!(bus.in_log, vec![0x0010]);
    assert_eq!(cpu.b, 0x5A);
}

#[test]
fn port_width_bit16_composes_full_bc() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    bus.port_width = crate::bus::PortWidth::Bit16;
    bus.load(0, &[0xED, 0x40]); // IN B,(C)
    cpu.b = 0xAB;
    cpu.c = 0x10;
    bus.in_values.insert(0xAB10, 0x5A);
    run_one(&mut cpu, &mut bus);
    assert_eq!(bus.in_log, vec![0xAB10]);
}

// -----------------------------------------------------------------
// Wait states
// -----------------------------------------------------------------

#[test]
fn wait_states_inflate_fetch_and_memory_cost() {
    let mut cpu = cpu_at(0);
    let mut bus = TestBus::new();
    cpu.wait_states = crate::bus::WaitStates { fetch: 1, fetch_m: 0, mem: 2 };
    bus.load(0, &[0x36, 0x99]); // LD (HL),n: 1 M1 fetch, 2 non-M1 accesses (n, write)
    cpu.set_hl(0x8000);
    let cycles = run_one(&mut cpu, &mut bus);
    // base 10 + 1 fetch wait + 2*2 mem waits = 15
    assert_eq!(cycles, 15);
}
