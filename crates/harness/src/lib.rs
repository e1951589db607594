//! Cycle-accurate verification harness for many-core grid devices.
//!
//! This crate drives a synchronous compute grid through its pin-level host interface:
//! 1. **Bus:** Clock engine and address translation for scratchpad, PE-local and cluster regions.
//! 2. **Device:** The pin-level `Device` trait, an owning handle and a behavioural loopback model.
//! 3. **Simulation:** Image parsing, program loading, bulk data transfer, workloads and orchestration.
//! 4. **Results:** Per-cycle statistics, golden-output verification and report rendering.

/// Bus transaction engine and address translator.
pub mod bus;
/// Common types and constants (addresses, errors, protocol constants).
pub mod common;
/// Harness configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// Device pin interface, handle and loopback model.
pub mod device;
/// Simulation report rendering and file naming.
pub mod report;
/// Image parsing, loaders, transfers, workload catalog and the run orchestrator.
pub mod sim;
/// Per-cycle statistics and phase counters.
pub mod stats;
/// Result verification against reference data.
pub mod verify;

/// Root configuration type; use `Config::for_variant` or deserialize from JSON.
pub use crate::config::Config;
/// Pin-level device interface implemented by every driven top.
pub use crate::device::Device;
/// Run orchestrator; construct with `Simulator::new`.
pub use crate::sim::simulator::Simulator;
