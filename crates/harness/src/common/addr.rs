//! Device address types.
//!
//! The harness deals with two address spaces that are easy to mix up:
//! 1. **Word indices:** Logical positions counted in 32-bit words, as used by
//!    workload definitions and data images.
//! 2. **Device addresses:** Byte addresses driven onto the device's host data bus.
//!
//! Keeping them as distinct types makes the `* word_bytes` conversion explicit.

use std::fmt;

/// A byte address on the device's host data bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceAddr(pub u32);

/// A logical word offset in the device's data address space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WordIndex(pub u32);

impl DeviceAddr {
    /// Returns the raw 32-bit byte address.
    #[inline(always)]
    pub const fn val(self) -> u32 {
        self.0
    }

    /// Returns the word this byte address falls in, for a given word size.
    #[inline]
    pub const fn word(self, word_bytes: u32) -> WordIndex {
        WordIndex(self.0 / word_bytes)
    }
}

impl WordIndex {
    /// Returns the raw word offset.
    #[inline(always)]
    pub const fn val(self) -> u32 {
        self.0
    }

    /// Converts the word offset into a device byte address.
    #[inline]
    pub const fn to_byte_addr(self, word_bytes: u32) -> DeviceAddr {
        DeviceAddr(self.0 * word_bytes)
    }
}

impl fmt::Display for DeviceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x} ({})", self.0, self.0)
    }
}

impl fmt::Display for WordIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}
