//! Interrupt controller, EI holdoff and HALT interlock tests.

use super::TestBus;
use crate::cpu::{Cpu, InterruptMode};

#[test]
fn im1_pushes_pc_and_jumps_to_0038() {
    let mut cpu = Cpu::new();
    let mut bus = TestBus::new();
    cpu.im = InterruptMode::Mode1;
    cpu.iff1 = true;
    cpu.iff2 = true;
    cpu.pc = 0x1000;
    cpu.sp = 0xFFFE;
    cpu.generate_irq(0xFF);

    let consumed = cpu.execute(13, &mut bus).unwrap();
    assert_eq!(consumed, 13);
    assert_eq!(cpu.pc, 0x0038);
    assert!(!cpu.iff1);
    assert_eq!(u16::from_le_bytes([bus.mem[0xFFFC], bus.mem[0xFFFD]]), 0x1000);
}

#[test]
fn im2_reads_vector_table() {
    let mut cpu = Cpu::new();
    let mut bus = TestBus::new();
    cpu.im = InterruptMode::Mode2;
    cpu.iff1 = true;
    cpu.i = 0x40;
    cpu.pc = 0x2000;
    cpu.sp = 0xFFFE;
    bus.load(0x4010, &[0x00, 0x90]);
    cpu.generate_irq(0x10);

    let consumed = cpu.execute(19, &mut bus).unwrap();
    assert_eq!(consumed, 19);
    assert_eq!(cpu.pc, 0x9000);
}

#[test]
fn nmi_ignores_iff1_and_jumps_to_0066() {
    let mut cpu = Cpu::new();
    let mut bus = TestBus::new();
    cpu.iff1 = false;
    cpu.iff2 = true;
    cpu.pc = 0x1234;
    cpu.sp = 0xFFFE;
    cpu.generate_nmi();

    let consumed = cpu.execute(11, &mut bus).unwrap();
    assert_eq!(consumed, 11);
    assert_eq!(cpu.pc, 0x0066);
    assert!(!cpu.iff1);
    assert!(!cpu.iff2, "NMI copies old IFF1 into IFF2 and clears IFF1");
}

#[test]
fn ei_holdoff_blocks_irq_for_one_instruction() {
    let mut cpu = Cpu::new();
    let mut bus = TestBus::new();
    bus.load(0, &[0xFB, 0x00, 0x00]); // EI ; NOP ; NOP
    cpu.im = InterruptMode::Mode1;
    cpu.iff1 = false;
    cpu.iff2 = false;
    cpu.generate_irq(0xFF);

    // EI retires (4), then the holdoff still covers the NOP that follows.
    let consumed = cpu.execute(8, &mut bus).unwrap();
    assert_eq!(consumed, 8, "IRQ must not be taken before the holdoff elapses");
    assert_eq!(cpu.pc, 2);

    // Now the holdoff has elapsed; the pending IRQ is taken next.
    let consumed = cpu.execute(13, &mut bus).unwrap();
    assert_eq!(consumed, 13);
    assert_eq!(cpu.pc, 0x0038);
}

#[test]
fn halt_holds_pc_until_interrupt_and_consumes_4_per_tick() {
    let mut cpu = Cpu::new();
    let mut bus = TestBus::new();
    bus.load(0, &[0x76]); // HALT
    cpu.im = InterruptMode::Mode1;
    cpu.iff1 = true;
    cpu.iff2 = true;

    let consumed = cpu.execute(12, &mut bus).unwrap();
    assert_eq!(consumed, 12);
    assert!(cpu.halted);
    assert_eq!(cpu.pc, 1);

    cpu.generate_irq(0xFF);
    let consumed = cpu.execute(13, &mut bus).unwrap();
    assert_eq!(consumed, 13);
    assert!(!cpu.halted, "accepting the interrupt clears HALT");
    assert_eq!(cpu.pc, 0x0038);
}

#[test]
fn request_break_stops_execute_at_the_next_boundary() {
    let mut cpu = Cpu::new();
    let mut bus = TestBus::new();
    bus.load(0, &[0x00, 0x00, 0x00]); // three NOPs
    cpu.debug.add_break_point(1, |cpu| cpu.request_break());
    let consumed = cpu.execute(100, &mut bus).unwrap();
    assert_eq!(consumed, 4, "only the first NOP should run before the breakpoint fires");
    assert_eq!(cpu.pc, 1);
}
