//! Flag bit definitions for the F (flags) register.
//!
//! Bit layout, high to low: S, Z, Y, H, X, P/V, N, C. Y and X are the
//! undocumented bits that mirror bits 5 and 3 of the instruction's
//! result byte on real hardware.

/// Carry flag (bit 0)
pub const C: u8 = 0b0000_0001;
/// Add/Subtract flag (bit 1) - set for subtraction
pub const N: u8 = 0b0000_0010;
/// Parity/Overflow flag (bit 2)
pub const PV: u8 = 0b0000_0100;
/// Undocumented flag (bit 3) - copy of bit 3 of the result
pub const X: u8 = 0b0000_1000;
/// Half-carry flag (bit 4)
pub const H: u8 = 0b0001_0000;
/// Undocumented flag (bit 5) - copy of bit 5 of the result
pub const Y: u8 = 0b0010_0000;
/// Zero flag (bit 6)
pub const Z: u8 = 0b0100_0000;
/// Sign flag (bit 7)
pub const S: u8 = 0b1000_0000;
