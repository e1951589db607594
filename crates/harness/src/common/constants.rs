//! Harness-wide constants.
//!
//! Geometry and protocol values that are fixed by the device family rather than
//! chosen per run. Tunables live in [`crate::config`].

/// Size of one data word on the host bus, in bytes.
pub const WORD_BYTES: u32 = 4;

/// Number of byte lanes packed into a word in byte mode.
pub const BYTES_PER_WORD: usize = 4;

/// Smallest value accepted by a byte-mode transfer.
pub const BYTE_MIN: i32 = i8::MIN as i32;

/// Largest value accepted by a byte-mode transfer.
pub const BYTE_MAX: i32 = i8::MAX as i32;

/// Width of the cluster-enable bitmask in bits.
pub const CLUSTER_ENABLE_BITS: u32 = 8;

/// Prefix that marks a comment line in every text image format.
pub const COMMENT_PREFIX: &str = "//";

/// Prefix of an address field in a program image line.
pub const PROGRAM_ADDR_PREFIX: char = '@';

/// Bit position of the PE selector inside an instruction-memory address.
pub const IMEM_PE_SHIFT: u32 = 10;

/// Mask applied to the PE selector after shifting.
pub const IMEM_PE_MASK: u32 = 0xF;

/// Periods spent after a preload pulse or an enable edge before the next step.
pub const EDGE_SETTLE_PERIODS: u64 = 2;
