//! Debug and observer layer.
//!
//! Everything here is purely observational: breakpoints, opcode taps,
//! call/return taps and the clock-consume tap may read CPU state and
//! request a break, but the step driver never lets them alter register
//! or memory semantics directly. Lists are appended at construction or
//! between steps and use stable indices, mirroring how the reference
//! debugger removes a single watch without disturbing the others.

use crate::cpu::Cpu;

/// A registered break-by-PC entry.
pub struct BreakPoint {
    pub pc: u16,
    callback: Box<dyn FnMut(&mut Cpu)>,
}

/// Key an opcode breakpoint is dispatched on: either the first byte after
/// any prefix, or a specific (byte1, byte2) pair (e.g. an ED sub-opcode).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpcodeKey {
    One(u8),
    Two(u8, u8),
}

pub struct OpcodeBreakPoint {
    key: OpcodeKey,
    callback: Box<dyn FnMut(&mut Cpu, &[u8])>,
}

/// A slot-based ordered list with stable indices: removing an entry
/// tombstones its slot rather than shifting everything after it, so an
/// index handed out by `push` stays valid for the list's lifetime.
struct StableList<T> {
    slots: Vec<Option<T>>,
}

impl<T> StableList<T> {
    fn new() -> Self {
        Self { slots: Vec::new() }
    }

    fn push(&mut self, item: T) -> usize {
        self.slots.push(Some(item));
        self.slots.len() - 1
    }

    fn remove(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = None;
        }
    }

    fn clear(&mut self) {
        self.slots.clear();
    }

    fn take_all(&mut self) -> Vec<Option<T>> {
        std::mem::take(&mut self.slots)
    }

    fn restore(&mut self, slots: Vec<Option<T>>) {
        self.slots = slots;
    }
}

/// Debug and observer state owned by the CPU.
///
/// None of these fields participate in instruction semantics; they exist
/// purely so a host can watch execution without the core growing a
/// dependency on any particular debugger's shape.
#[derive(Default)]
pub struct Debug {
    break_points: StableList<BreakPoint>,
    break_opcodes: StableList<OpcodeBreakPoint>,
    call_handlers: StableList<Box<dyn FnMut(&mut Cpu)>>,
    return_handlers: StableList<Box<dyn FnMut(&mut Cpu)>>,
    consume_clock: Option<Box<dyn FnMut(&mut Cpu, u32)>>,
    debug_message: Option<Box<dyn FnMut(&str)>>,
}

impl<T> Default for StableList<T> {
    fn default() -> Self {
        StableList::new()
    }
}

impl Debug {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_break_point(&mut self, pc: u16, callback: impl FnMut(&mut Cpu) + 'static) -> usize {
        self.break_points.push(BreakPoint { pc, callback: Box::new(callback) })
    }

    pub fn remove_break_point(&mut self, index: usize) {
        self.break_points.remove(index);
    }

    pub fn remove_all_break_points(&mut self) {
        self.break_points.clear();
    }

    pub fn add_break_opcode_1(&mut self, byte1: u8, callback: impl FnMut(&mut Cpu, &[u8]) + 'static) -> usize {
        self.break_opcodes.push(OpcodeBreakPoint { key: OpcodeKey::One(byte1), callback: Box::new(callback) })
    }

    pub fn add_break_opcode_2(
        &mut self,
        byte1: u8,
        byte2: u8,
        callback: impl FnMut(&mut Cpu, &[u8]) + 'static,
    ) -> usize {
        self.break_opcodes
            .push(OpcodeBreakPoint { key: OpcodeKey::Two(byte1, byte2), callback: Box::new(callback) })
    }

    pub fn remove_break_opcode(&mut self, index: usize) {
        self.break_opcodes.remove(index);
    }

    pub fn remove_all_break_opcodes(&mut self) {
        self.break_opcodes.clear();
    }

    pub fn add_call_handler(&mut self, callback: impl FnMut(&mut Cpu) + 'static) -> usize {
        self.call_handlers.push(Box::new(callback))
    }

    pub fn add_return_handler(&mut self, callback: impl FnMut(&mut Cpu) + 'static) -> usize {
        self.return_handlers.push(Box::new(callback))
    }

    pub fn set_consume_clock_callback(&mut self, callback: impl FnMut(&mut Cpu, u32) + 'static) {
        self.consume_clock = Some(Box::new(callback));
    }

    pub fn set_debug_message(&mut self, callback: impl FnMut(&str) + 'static) {
        self.debug_message = Some(Box::new(callback));
    }

    pub fn log(&mut self, message: &str) {
        log::trace!("{message}");
        if let Some(sink) = self.debug_message.as_mut() {
            sink(message);
        }
    }
}

impl Cpu {
    /// Invoke every break-by-PC entry whose address matches the current
    /// PC. Returns true if `request_break` ended up set as a result.
    pub(crate) fn fire_break_points(&mut self) {
        if self.debug.break_points.slots.is_empty() {
            return;
        }
        let mut slots = self.debug.break_points.take_all();
        for slot in slots.iter_mut() {
            if let Some(bp) = slot {
                if bp.pc == self.pc {
                    (bp.callback)(self);
                }
            }
        }
        self.debug.break_points.restore(slots);
    }

    /// Invoke every opcode breakpoint matching the bytes of the
    /// instruction just retired.
    pub(crate) fn fire_break_opcodes(&mut self, bytes: &[u8]) {
        if bytes.is_empty() || self.debug.break_opcodes.slots.is_empty() {
            return;
        }
        let mut slots = self.debug.break_opcodes.take_all();
        for slot in slots.iter_mut() {
            if let Some(bp) = slot {
                let matches = match bp.key {
                    OpcodeKey::One(b1) => bytes[0] == b1,
                    OpcodeKey::Two(b1, b2) => bytes.len() >= 2 && bytes[0] == b1 && bytes[1] == b2,
                };
                if matches {
                    (bp.callback)(self, bytes);
                }
            }
        }
        self.debug.break_opcodes.restore(slots);
    }

    pub(crate) fn fire_call_handlers(&mut self) {
        if self.debug.call_handlers.slots.is_empty() {
            return;
        }
        let mut slots = self.debug.call_handlers.take_all();
        for slot in slots.iter_mut() {
            if let Some(cb) = slot {
                cb(self);
            }
        }
        self.debug.call_handlers.restore(slots);
    }

    pub(crate) fn fire_return_handlers(&mut self) {
        if self.debug.return_handlers.slots.is_empty() {
            return;
        }
        let mut slots = self.debug.return_handlers.take_all();
        for slot in slots.iter_mut() {
            if let Some(cb) = slot {
                cb(self);
            }
        }
        self.debug.return_handlers.restore(slots);
    }

    pub(crate) fn fire_consume_clock(&mut self, cycles: u32) {
        if let Some(mut cb) = self.debug.consume_clock.take() {
            cb(self, cycles);
            self.debug.consume_clock = Some(cb);
        }
    }
}
