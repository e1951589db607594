//! Device pin interface and ownership.
//!
//! This module contains everything the harness knows about the device under test:
//! 1. **Traits:** The pin-level [`Device`] interface, its [`Capabilities`], and [`TraceSink`].
//! 2. **Handle:** [`DeviceHandle`], which guarantees the device is finalized exactly once.
//! 3. **Model:** [`ScratchpadModel`], a behavioural loopback device for end-to-end runs.

/// Exclusive owner of a device for the duration of a run.
pub mod handle;
/// Behavioural loopback device.
pub mod model;
/// Device, capability and trace sink traits.
pub mod traits;

pub use handle::DeviceHandle;
pub use model::ScratchpadModel;
pub use traits::{Capabilities, Device, NoTrace, PeCounters, TraceSink, pe_total};
