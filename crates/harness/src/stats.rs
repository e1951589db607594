//! Simulation statistics collection.
//!
//! This module tracks what a run measures. It provides:
//! 1. **Phase counters:** Cycles spent loading instructions, loading data, reading back, preloading and executing.
//! 2. **Execution trace:** One conflict sample and one finish sample per timed cycle, in cycle order.
//! 3. **PE summary:** Per-PE conflict, instruction and trap counters with the conflict maximum.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::common::error::HarnessError;
use crate::device::{Device, PeCounters};

/// Cycle counters for each phase of a run.
///
/// Owned by one run and reset at its start; nothing here is shared across runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseCounters {
    /// Periods spent applying instruction records.
    pub load_instruction: u64,
    /// Periods spent issuing data writes.
    pub load_data: u64,
    /// Periods spent issuing data reads.
    pub read_data: u64,
    /// Periods spent waiting for the preload run to complete.
    pub preload: u64,
    /// Restart overhead plus timed execution periods.
    pub execution: u64,
}

impl PhaseCounters {
    /// Clears every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Per-cycle samples captured during the timed execution region.
///
/// Both series always have the same length: one entry per timed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionTrace {
    conflicts: Vec<u32>,
    finishes: Vec<u64>,
}

impl ExecutionTrace {
    /// Creates an empty trace with room for `capacity` cycles.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            conflicts: Vec::with_capacity(capacity),
            finishes: Vec::with_capacity(capacity),
        }
    }

    /// Appends this cycle's samples from `device`.
    pub fn sample<D: Device + ?Sized>(&mut self, device: &D) {
        self.push(device.conflict_sample(), device.finish_sample());
    }

    /// Appends one pair of samples.
    pub fn push(&mut self, conflict: u32, finish: u64) {
        self.conflicts.push(conflict);
        self.finishes.push(finish);
    }

    /// Number of captured cycles.
    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    /// Whether no cycle was captured.
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Conflict samples in cycle order.
    pub fn conflicts(&self) -> &[u32] {
        &self.conflicts
    }

    /// Finish samples in cycle order.
    pub fn finishes(&self) -> &[u64] {
        &self.finishes
    }

    /// `(cycle, conflict, finish)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u32, u64)> + '_ {
        self.conflicts
            .iter()
            .zip(&self.finishes)
            .enumerate()
            .map(|(i, (&c, &f))| (i, c, f))
    }

    /// Writes the conflict series as `Cycle <i>: <value>` lines.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] on any file error.
    pub fn write_conflicts(&self, path: &Path) -> Result<(), HarnessError> {
        write_series(path, &self.conflicts)
    }

    /// Writes the finish series as `Cycle <i>: <value>` lines.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] on any file error.
    pub fn write_finishes(&self, path: &Path) -> Result<(), HarnessError> {
        write_series(path, &self.finishes)
    }
}

fn write_series<V: std::fmt::Display>(path: &Path, series: &[V]) -> Result<(), HarnessError> {
    let file = File::create(path).map_err(|e| HarnessError::io(path, e))?;
    let mut out = BufWriter::new(file);
    for (i, v) in series.iter().enumerate() {
        writeln!(out, "Cycle {i}: {v}").map_err(|e| HarnessError::io(path, e))?;
    }
    out.flush().map_err(|e| HarnessError::io(path, e))
}

/// Debug counters of every PE, sampled once after execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeSummary {
    /// Counters indexed by PE.
    pub counters: Vec<PeCounters>,
}

impl PeSummary {
    /// Reads the counters of the first `pe_count` PEs.
    pub fn collect<D: Device + ?Sized>(device: &D, pe_count: usize) -> Self {
        Self {
            counters: (0..pe_count).map(|pe| device.pe_counters(pe)).collect(),
        }
    }

    /// Largest per-PE conflict count, or 0 with no PEs.
    pub fn max_conflicts(&self) -> u32 {
        self.counters.iter().map(|c| c.conflicts).max().unwrap_or(0)
    }
}
