//! Host bus abstraction.
//!
//! The CPU core owns no memory and no I/O space of its own. Every opcode
//! fetch, data read, data write, and port access is routed through a
//! `Bus` implementation supplied by the host. The core treats every
//! value the bus returns as valid; it never owns the address decoding.

/// Width of the address presented to `in_port`/`out_port`.
///
/// Real Z80 hardware places the full 16-bit register pair on the address
/// bus during I/O (B on the high byte, C or the immediate on the low
/// byte), but many host systems only decode the low 8 bits. `Bit16`
/// models MSX/Game-Boy-style hosts that care about the high byte for
/// block I/O (INI/INIR/IND/INDR/OUTI/OTIR/OUTD/OTDR); `Bit8` models hosts
/// that only ever look at the low byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortWidth {
    /// Only the low 8 bits of the composed port address are presented.
    #[default]
    Bit8,
    /// The full 16-bit composed port address is presented.
    Bit16,
}

/// Additive wait-state configuration.
///
/// These are added to the canonical T-state counts documented on each
/// decoder handler. Values may be negative (within reason) to model a
/// host that is faster than the reference timing; the per-access cost
/// is clamped at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaitStates {
    /// Extra cycles applied to every M1 (opcode or prefix-opcode) fetch.
    pub fetch: i32,
    /// Extra cycles applied to every M1 fetch, charged separately from
    /// `fetch` so a host can model the opcode-fetch and refresh phases
    /// of M1 independently.
    pub fetch_m: i32,
    /// Extra cycles applied to every non-M1 memory access (data reads,
    /// data writes, displacement and immediate fetches).
    pub mem: i32,
}

impl WaitStates {
    pub const NONE: WaitStates = WaitStates { fetch: 0, fetch_m: 0, mem: 0 };

    /// Total extra T-states owed for an instruction that made `fetches` M1
    /// cycles and `mems` non-M1 memory/port accesses.
    pub(crate) fn total_delta(&self, fetches: u32, mems: u32) -> i64 {
        (self.fetch as i64 + self.fetch_m as i64) * fetches as i64 + self.mem as i64 * mems as i64
    }
}

/// Everything the CPU core needs from the host: memory and I/O callbacks.
///
/// Implementors own the address space entirely; the core only ever sees
/// a flat 16-bit address presented to `read_byte`/`write_byte`, and a
/// port value (width controlled by [`PortWidth`]) presented to
/// `in_port`/`out_port`.
pub trait Bus {
    fn read_byte(&mut self, addr: u16) -> u8;
    fn write_byte(&mut self, addr: u16, value: u8);
    fn in_port(&mut self, port: u16) -> u8;
    fn out_port(&mut self, port: u16, value: u8);

    /// Port address width this host expects. Defaults to 8-bit, matching
    /// the majority of Z80 host systems; hosts that care about the high
    /// address-bus byte during block I/O (e.g. to model B being latched
    /// onto A8-A15) override this to `Bit16`.
    fn port_width(&self) -> PortWidth {
        PortWidth::Bit8
    }
}
