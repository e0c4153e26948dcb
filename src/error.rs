//! Error taxonomy surfaced by the decoder and step driver.

use std::fmt;

use thiserror::Error;

/// The prefix byte(s), if any, that preceded an unrecognised opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    /// No prefix; the unrecognised byte was read directly from the base table.
    None,
    Cb,
    Ed,
    Dd,
    Fd,
    DdCb,
    FdCb,
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Prefix::None => "",
            Prefix::Cb => "CB",
            Prefix::Ed => "ED",
            Prefix::Dd => "DD",
            Prefix::Fd => "FD",
            Prefix::DdCb => "DDCB",
            Prefix::FdCb => "FDCB",
        };
        f.write_str(s)
    }
}

/// Errors that can be surfaced synchronously out of [`crate::Cpu::execute`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Z80Error {
    /// The decoder reached a byte combination that the Z80 leaves undefined.
    ///
    /// The CPU registers are left exactly as they were at the start of the
    /// faulting opcode fetch, so the host can introspect PC to find the
    /// offending instruction.
    #[error("detect an unknown operand ({prefix},{byte:02X})")]
    InvalidOpcode { prefix: Prefix, byte: u8 },

    /// A decoded register selector fell outside its valid range. This can
    /// only happen if the decoder itself is broken, so it is treated as a
    /// hard programming error rather than a recoverable condition.
    #[error("invalid register encoding: {0:02X}")]
    InvalidRegisterEncoding(u8),
}

pub type Result<T> = std::result::Result<T, Z80Error>;
