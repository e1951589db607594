//! Result Verifier.
//!
//! Compares read-back values against a reference sequence. The comparison never
//! short-circuits: every index present in both sequences is checked, and a
//! length difference is reported separately from value mismatches.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::common::error::HarnessError;
use crate::sim::image::data_line;

/// One index of the lock-step walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    /// Position in both sequences.
    pub index: usize,
    /// Value read back from the device.
    pub simulated: i32,
    /// Expected value.
    pub reference: i32,
    /// Whether the two agree.
    pub matched: bool,
}

/// Which side had values left over after the other was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthMismatch {
    /// The reference has more data lines than values were read back.
    ReferenceLonger {
        /// Values read back.
        simulated: usize,
        /// Reference values.
        reference: usize,
    },
    /// More values were read back than the reference holds.
    SimulatedLonger {
        /// Values read back.
        simulated: usize,
        /// Reference values.
        reference: usize,
    },
}

/// Outcome of one comparison. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparisonReport {
    entries: Vec<Comparison>,
    length: Option<LengthMismatch>,
    malformed_reference: usize,
}

impl ComparisonReport {
    /// Every compared index in order.
    pub fn entries(&self) -> &[Comparison] {
        &self.entries
    }

    /// Entries whose values differ.
    pub fn mismatches(&self) -> impl Iterator<Item = &Comparison> + '_ {
        self.entries.iter().filter(|c| !c.matched)
    }

    /// Indices whose values differ.
    pub fn mismatch_indices(&self) -> Vec<usize> {
        self.mismatches().map(|c| c.index).collect()
    }

    /// Length difference between the sequences, if any.
    pub const fn length_mismatch(&self) -> Option<LengthMismatch> {
        self.length
    }

    /// Reference lines that did not parse as integers.
    pub const fn malformed_reference(&self) -> usize {
        self.malformed_reference
    }

    /// True only when lengths agree, every value matches and the reference parsed cleanly.
    pub fn matched(&self) -> bool {
        self.length.is_none()
            && self.malformed_reference == 0
            && self.entries.iter().all(|c| c.matched)
    }
}

/// Compares `simulated` against `reference` index by index.
pub fn compare(simulated: &[i32], reference: &[i32]) -> ComparisonReport {
    let entries = simulated
        .iter()
        .zip(reference)
        .enumerate()
        .map(|(index, (&s, &r))| Comparison {
            index,
            simulated: s,
            reference: r,
            matched: s == r,
        })
        .collect();

    let length = match simulated.len().cmp(&reference.len()) {
        std::cmp::Ordering::Less => Some(LengthMismatch::ReferenceLonger {
            simulated: simulated.len(),
            reference: reference.len(),
        }),
        std::cmp::Ordering::Greater => Some(LengthMismatch::SimulatedLonger {
            simulated: simulated.len(),
            reference: reference.len(),
        }),
        std::cmp::Ordering::Equal => None,
    };

    ComparisonReport {
        entries,
        length,
        malformed_reference: 0,
    }
}

/// Compares `simulated` against reference text in the data image format.
///
/// Unparseable reference lines are counted and make the comparison fail.
pub fn compare_text(simulated: &[i32], text: &str) -> ComparisonReport {
    let mut reference = Vec::new();
    let mut malformed = 0;
    for content in text.lines().filter_map(data_line) {
        match content.parse::<i32>() {
            Ok(v) => reference.push(v),
            Err(_) => {
                malformed += 1;
                tracing::warn!(content, "unparseable reference line");
            }
        }
    }
    let mut report = compare(simulated, &reference);
    report.malformed_reference = malformed;
    report
}

/// Compares `simulated` against a reference file.
///
/// # Errors
///
/// Returns [`HarnessError::Io`] if the reference cannot be read.
pub fn verify_file(simulated: &[i32], path: &Path) -> Result<ComparisonReport, HarnessError> {
    let text = fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
    Ok(compare_text(simulated, &text))
}

/// Logs every finding of a report.
pub fn log_findings(report: &ComparisonReport) {
    for m in report.mismatches() {
        tracing::warn!(index = m.index, sim = m.simulated, golden = m.reference, "mismatch");
    }
    match report.length_mismatch() {
        Some(LengthMismatch::ReferenceLonger { simulated, reference }) => {
            tracing::warn!(simulated, reference, "reference has more data than simulation results");
        }
        Some(LengthMismatch::SimulatedLonger { simulated, reference }) => {
            tracing::warn!(simulated, reference, "simulation has more results than reference");
        }
        None => {}
    }
}

/// Verification verdict of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every value matched.
    Passed,
    /// The comparison found mismatches or a length difference.
    Failed(ComparisonReport),
    /// The workload has no reference data.
    Unchecked,
    /// The reference file could not be read.
    ReferenceUnavailable(PathBuf),
}

impl Verdict {
    /// Builds a verdict from a finished comparison.
    pub fn from_report(report: ComparisonReport) -> Self {
        if report.matched() {
            Self::Passed
        } else {
            Self::Failed(report)
        }
    }

    /// The report's yes/no answer; workloads without reference data count as matching.
    pub const fn matched(&self) -> bool {
        matches!(self, Self::Passed | Self::Unchecked)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => f.write_str("Yes"),
            Self::Failed(_) => f.write_str("No"),
            Self::Unchecked => f.write_str("Yes (no reference data)"),
            Self::ReferenceUnavailable(path) => {
                write!(f, "No (reference {} unavailable)", path.display())
            }
        }
    }
}
