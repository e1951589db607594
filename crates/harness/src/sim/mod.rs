//! Simulation layer.
//!
//! This module builds a run out of the bus primitives. It provides:
//! 1. **Images:** Parsing of data, reference and program images.
//! 2. **Loader:** Instruction memory loading.
//! 3. **Transfer:** Bulk word and byte transfers, cluster gating and the result log.
//! 4. **Workloads:** The kernel catalog.
//! 5. **Simulator:** The run state machine tying everything together.

/// Data, reference and program image parsing.
pub mod image;
/// Program Loader.
pub mod loader;
/// Run orchestration.
pub mod simulator;
/// Data Transfer Unit.
pub mod transfer;
/// Workload catalog.
pub mod workload;

pub use simulator::{RunOutcome, RunParams, RunPhase, Simulator};
pub use workload::{Catalog, Workload};
