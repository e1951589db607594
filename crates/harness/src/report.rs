//! Simulation report rendering.
//!
//! This module turns a finished run into the text artefacts the flow consumes:
//! 1. **Summary:** Configuration, phase timings, per-PE counters and the verification verdict.
//! 2. **File names:** Report and trace names, which encode folder, geometry and policy.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::common::error::HarnessError;
use crate::config::{ArbPolicy, Variant};
use crate::stats::{PeSummary, PhaseCounters};
use crate::verify::Verdict;

/// Everything shown in the run summary.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// Run folder name.
    pub folder: String,
    /// Device top that was driven.
    pub variant: Variant,
    /// Grid rows reported by the device.
    pub rows: u32,
    /// Grid columns reported by the device.
    pub cols: u32,
    /// Clusters reported by the device.
    pub clusters: u32,
    /// Program image loaded in the first phase.
    pub program: PathBuf,
    /// Grid division parameter.
    pub grid_div: u32,
    /// Arbitration policy.
    pub arb_policy: ArbPolicy,
    /// Total simulated time in nanoseconds.
    pub total_time_ns: u64,
    /// Phase cycle counters.
    pub counters: PhaseCounters,
    /// Per-PE debug counters.
    pub pes: PeSummary,
    /// Verification verdict.
    pub verdict: Verdict,
}

impl SimulationReport {
    /// Report file name for this run.
    pub fn file_name(&self) -> String {
        match self.variant {
            Variant::Grid => format!("rpt_{}_{}.txt", self.folder, self.arb_policy.tag()),
            Variant::Scalable => format!(
                "rpt_scale_{}_{}_{}_{}.txt",
                self.folder, self.cols, self.rows, self.clusters
            ),
        }
    }

    /// Writes the report into `dir` and returns its path.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] if the file cannot be written.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, HarnessError> {
        let path = dir.join(self.file_name());
        fs::write(&path, self.to_string()).map_err(|e| HarnessError::io(&path, e))?;
        Ok(path)
    }
}

/// Conflict trace file name (`t_…`).
pub fn conflict_trace_name(variant: Variant, folder: &str, arb: ArbPolicy) -> String {
    trace_name('t', variant, folder, arb)
}

/// Finish trace file name (`f_…`).
pub fn finish_trace_name(variant: Variant, folder: &str, arb: ArbPolicy) -> String {
    trace_name('f', variant, folder, arb)
}

fn trace_name(kind: char, variant: Variant, folder: &str, arb: ArbPolicy) -> String {
    let scale = match variant {
        Variant::Grid => "",
        Variant::Scalable => "s_",
    };
    format!("{kind}_{scale}{folder}_{}.txt", arb.tag())
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scalable = self.variant == Variant::Scalable;

        writeln!(f, "Simulation Report for {}", self.folder)?;
        if scalable {
            writeln!(f, "Scalable RISC-V Core")?;
        }
        writeln!(f, "========================================\n")?;

        writeln!(f, "Configuration:")?;
        writeln!(f, "N_R: {}", self.rows)?;
        writeln!(f, "N_C: {}", self.cols)?;
        if scalable {
            writeln!(f, "Cluster value: {}", self.clusters)?;
        }
        writeln!(f, "Memory file: {}", self.program.display())?;
        writeln!(f, "Grid division: {}", self.grid_div)?;
        writeln!(f, "Arb policy: {}\n", self.arb_policy.tag())?;

        let c = &self.counters;
        let labels = if scalable {
            [
                "Load instruction time",
                "Load data time",
                "Load data read time",
                "Preload time",
            ]
        } else {
            ["Load Instruction", "Load Data", "Read Data", "Preload"]
        };
        writeln!(f, "Timing Results:")?;
        writeln!(f, "Total simulation time: {} ns", self.total_time_ns)?;
        writeln!(f, "Execution Cycle: {} cycles", c.execution)?;
        writeln!(f, "{}: {} cycles", labels[0], c.load_instruction)?;
        writeln!(f, "{}: {} cycles", labels[1], c.load_data)?;
        writeln!(f, "{}: {} cycles", labels[2], c.read_data)?;
        writeln!(f, "{}: {} cycles\n", labels[3], c.preload)?;

        writeln!(f, "Memory Conflict:")?;
        for (i, pe) in self.pes.counters.iter().enumerate() {
            writeln!(f, "PE {i}: {}", pe.conflicts)?;
        }
        writeln!(f, "Max Memory Conflict: {}\n", self.pes.max_conflicts())?;

        writeln!(f, "IC per PE:")?;
        for (i, pe) in self.pes.counters.iter().enumerate() {
            writeln!(f, "PE {i}: {}", pe.instructions)?;
        }

        writeln!(f, "\nIC_trap per PE:")?;
        for (i, pe) in self.pes.counters.iter().enumerate() {
            writeln!(f, "PE {i}: {}", pe.traps)?;
        }

        writeln!(f, "Verification Results:")?;
        writeln!(f, "Results match golden output: {}", self.verdict)
    }
}
