//! Bus transaction layer.
//!
//! This module provides the two primitives every transfer is built from:
//! 1. **Engine:** [`BusEngine`] owns the device and advances simulated time one clock period at a time.
//! 2. **Translation:** [`AddressMap`] turns logical word indices into device byte addresses.

/// Clock engine.
pub mod engine;
/// Address translation and transfer plans.
pub mod translate;

pub use engine::{BusEngine, SimClock};
pub use translate::{AddressMap, Placement, Region, TransferPlan, TransferSpec};
