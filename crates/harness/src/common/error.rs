//! Error taxonomy for the harness.
//!
//! Two layers of failure are distinguished:
//! 1. **Configuration errors:** Anything wrong with the request itself (unknown workload,
//!    malformed numbers, transfer plans that would leave their region). These are fatal
//!    and are always raised before the device sees a single edge.
//! 2. **Harness errors:** Failures while a run is in flight (I/O on images and logs, byte
//!    values outside the representable range, illegal phase transitions).
//!
//! Parse problems on individual image lines are not errors at all; they are logged and the
//! line is skipped. Verification mismatches are findings and live in [`crate::verify`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::Variant;
use crate::sim::simulator::RunPhase;

/// A request that cannot be honoured; fatal before any device interaction.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The workload token is not in the catalog for the selected variant.
    #[error("unknown workload `{token}` for the {variant} variant")]
    UnknownWorkload {
        /// Token as given on the command line.
        token: String,
        /// Variant the lookup was made for.
        variant: Variant,
    },

    /// A numeric argument could not be parsed.
    #[error("invalid value `{value}` for {arg}: expected an integer")]
    InvalidNumber {
        /// Argument name.
        arg: &'static str,
        /// Raw text that failed to parse.
        value: String,
    },

    /// Arbitration policy selector outside {0, 1}.
    #[error("invalid arbitration policy {0}: expected 0 (round-robin) or 1 (priority-min)")]
    InvalidArbPolicy(i64),

    /// A JSON configuration or workload file could not be read or decoded.
    #[error("failed to load {path}: {reason}")]
    File {
        /// File that was being loaded.
        path: PathBuf,
        /// Decoder or I/O message.
        reason: String,
    },

    /// Device geometry that the address arithmetic cannot work with.
    #[error("invalid device geometry: {0}")]
    Geometry(&'static str),

    /// A scratchpad transfer would run past the scratchpad capacity.
    #[error("scratchpad transfer [{base}, {base}+{length}) exceeds capacity of {capacity} words")]
    ScratchpadOverflow {
        /// First word of the transfer.
        base: u32,
        /// Number of words requested.
        length: u32,
        /// Scratchpad capacity in words.
        capacity: u32,
    },

    /// A PE-local transfer starts below the scratchpad boundary.
    #[error("PE-local transfer base {base} lies inside the scratchpad (boundary {boundary})")]
    LocalBelowBoundary {
        /// First word of the transfer.
        base: u32,
        /// First word past the scratchpad.
        boundary: u32,
    },

    /// A PE-local transfer length does not divide evenly across the PEs.
    #[error("PE-local transfer of {length} words does not split evenly across {pe_count} PEs")]
    UnevenPeSplit {
        /// Number of words requested.
        length: u32,
        /// Number of PEs the data is folded across.
        pe_count: u32,
    },

    /// A read-back segment does not divide evenly across the clusters.
    #[error("read-back segment of {length} words at {base} does not split evenly across {clusters} clusters")]
    UnevenClusterSplit {
        /// First word of the segment.
        base: u32,
        /// Segment length in words.
        length: u32,
        /// Clusters the segment is divided across.
        clusters: u32,
    },

    /// The per-PE share of a PE-local transfer does not fit in its window.
    #[error("PE-local share of {per_pe} words at window offset {offset} overflows the {window}-word window")]
    PeWindowOverflow {
        /// Offset of the transfer base inside the first window.
        offset: u32,
        /// Words each PE receives.
        per_pe: u32,
        /// Window size per PE.
        window: u32,
    },

    /// A cluster index outside the device's cluster count.
    #[error("cluster {cluster} out of range: device has {count} clusters")]
    ClusterOutOfRange {
        /// Requested cluster.
        cluster: u32,
        /// Clusters available.
        count: u32,
    },

    /// The selected variant needs a pin the device does not expose.
    #[error("the {variant} variant needs the `{capability}` pin, which the device does not provide")]
    MissingCapability {
        /// Variant that was selected.
        variant: Variant,
        /// Missing capability.
        capability: &'static str,
    },
}

/// A failure during a run.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Configuration problem surfaced during the run (e.g. a plan built after reset).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O failure on an image, log, or report file.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A byte-mode value outside [-128, 127]; aborts the transfer that read it.
    #[error("value {value} at index {index} is outside the valid byte range [-128, 127]")]
    ByteRange {
        /// Offending value.
        value: i32,
        /// Position among the data values of the image.
        index: usize,
    },

    /// The orchestration tried to move between phases out of order.
    #[error("illegal run phase transition {from:?} -> {to:?}")]
    PhaseOrder {
        /// Current phase.
        from: RunPhase,
        /// Requested phase.
        to: RunPhase,
    },
}

impl HarnessError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for missing or unreadable files, which the orchestration tolerates.
    pub fn is_resource(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
