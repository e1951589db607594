//! Common types shared by every layer of the harness.
//!
//! This module provides the small vocabulary the rest of the crate is written in:
//! 1. **Addresses:** Strong types for device byte addresses and logical word indices.
//! 2. **Constants:** Word geometry, bus masks, and protocol timing constants.
//! 3. **Errors:** Configuration and run-time error taxonomies.

/// Device byte-address and word-index types.
pub mod addr;

/// Constants for word geometry, masks, and protocol timing.
pub mod constants;

/// Error types for configuration and harness operations.
pub mod error;

pub use addr::{DeviceAddr, WordIndex};
pub use error::{ConfigError, HarnessError};
