//! Configuration system for the harness.
//!
//! This module defines every tunable of a run. It provides:
//! 1. **Defaults:** Device geometry and protocol timing observed on the reference tops.
//! 2. **Structures:** Hierarchical config for the device, the orchestration, and file paths.
//! 3. **Enums:** Device variant and TCDM arbitration policy.
//!
//! Configuration is supplied as JSON (`--config`) or built with [`Config::for_variant`].
//! Fields left out of a JSON file take the defaults of the variant the file
//! selects.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::common::error::ConfigError;

/// Default configuration constants.
///
/// These values match the fixed-grid and scalable tops the harness was
/// brought up against.
mod defaults {
    /// Size of a host data word in bytes.
    pub const WORD_BYTES: u32 = 4;

    /// Scratchpad capacity in words (512 KiB of TCDM).
    ///
    /// Word offsets at or above this boundary address PE-local memory.
    pub const SCRATCHPAD_WORDS: u32 = 131_072;

    /// Size of each PE's local memory window in words.
    pub const PE_WINDOW_WORDS: u32 = 256;

    /// PEs on the fixed grid top.
    pub const GRID_PE_COUNT: u32 = 16;

    /// PEs per cluster on the scalable top.
    pub const SCALABLE_PE_COUNT: u32 = 32;

    /// Instruction-memory address width mask (16 bits).
    pub const IMEM_ADDR_MASK: u32 = 0xFFFF;

    /// Byte-enable mask driven on instruction writes.
    pub const IMEM_WRITE_MASK: u8 = 0xF;

    /// Largest cluster count the 8-bit enable mask can address.
    pub const MAX_CLUSTERS: u32 = 8;

    /// Clock period used to convert half-cycles into nanoseconds.
    pub const CLOCK_PERIOD_NS: u64 = 10;

    /// Hard ceiling on simulated periods.
    pub const CYCLE_CEILING: u64 = 49_999_999_999;

    /// Periods reset is held before release.
    pub const RESET_HOLD_PERIODS: u64 = 2;

    /// Periods after reset release before configuration outputs are read.
    pub const RESET_RELEASE_PERIODS: u64 = 2;

    /// Idle periods after configuration before data loading.
    pub const SETTLE_PERIODS: u64 = 5;

    /// Cycles charged to the execution counter for each restart sequence.
    pub const RESTART_OVERHEAD_CYCLES: u64 = 5;

    /// Timed cycles between heartbeat log lines.
    pub const HEARTBEAT_INTERVAL: u64 = 200_000;

    /// Upper bound used to pre-size the sample buffers.
    pub const SAMPLE_CAPACITY_HINT: usize = 5_000_000;

    /// Grid runs whose time limit is below this many half-cycles get a waveform.
    pub const GRID_WAVEFORM_TIME_LIMIT: u64 = 100_000;

    /// Scalable runs whose time limit is below this many half-cycles get a waveform.
    pub const SCALABLE_WAVEFORM_TIME_LIMIT: u64 = 1_000_000;

    /// Workloads that record a waveform regardless of the ceiling.
    pub const WAVEFORM_WORKLOADS: &[&str] = &["others", "relu"];

    /// Default location of the software tree (kernels, program images).
    pub const SOFTWARE_ROOT: &str = "../../software";

    /// Summary report directory.
    pub const REPORT_DIR: &str = "./rpt";

    /// Temporal-conflict trace directory.
    pub const CONFLICT_DIR: &str = "./rpt_tc";

    /// Finish-signal trace directory.
    pub const FINISH_DIR: &str = "./rpt_fc";

    /// Result log written by every read-back.
    pub const RESULT_LOG: &str = "mem_dump_bytes.txt";
}

/// Which device top the harness drives.
///
/// The two tops share the host protocol; the scalable top adds clusters and a
/// cluster-enable mask on the host data port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Variant {
    /// Fixed `N_R x N_C` grid with a single TCDM.
    #[default]
    Grid,
    /// Clustered top; each cluster has its own TCDM selected by an enable bit.
    Scalable,
}

impl Variant {
    /// Returns the lowercase name used on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Scalable => "scalable",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TCDM arbitration policy selector driven on `tcdm_arb_policy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ArbPolicy {
    /// Round-robin arbitration (selector 0).
    #[default]
    RoundRobin,
    /// Priority-min arbitration (selector 1).
    PriorityMin,
}

impl ArbPolicy {
    /// Maps the numeric selector from the command line.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidArbPolicy`] for anything but 0 or 1.
    pub fn from_selector(selector: i64) -> Result<Self, ConfigError> {
        match selector {
            0 => Ok(Self::RoundRobin),
            1 => Ok(Self::PriorityMin),
            other => Err(ConfigError::InvalidArbPolicy(other)),
        }
    }

    /// Value driven on the device pin.
    pub fn pin_value(self) -> u8 {
        match self {
            Self::RoundRobin => 0,
            Self::PriorityMin => 1,
        }
    }

    /// Short tag used in report file names (`rr` / `pm`).
    pub fn tag(self) -> &'static str {
        match self {
            Self::RoundRobin => "rr",
            Self::PriorityMin => "pm",
        }
    }
}

/// Root configuration structure.
///
/// # Examples
///
/// ```
/// use gridsim_core::config::{Config, Variant};
///
/// let json = r#"{
///     "device": { "variant": "Scalable" },
///     "harness": { "cycle_ceiling": 1000 },
///     "paths": { "software_root": "sw" }
/// }"#;
///
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert_eq!(config.device.variant, Variant::Scalable);
/// assert_eq!(config.device.scratchpad_words, 131_072);
/// assert_eq!(config.device.pe_count, 32);
/// assert_eq!(config.harness.cycle_ceiling, 1000);
/// assert_eq!(config.harness.reset_hold_periods, 2);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "ConfigFile")]
pub struct Config {
    /// Device geometry and pin widths.
    pub device: DeviceConfig,
    /// Orchestration timing and sampling.
    pub harness: HarnessConfig,
    /// Input and output locations.
    pub paths: PathConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::for_variant(Variant::Grid)
    }
}

impl Config {
    /// Builds the default configuration for a device variant.
    pub fn for_variant(variant: Variant) -> Self {
        Self {
            device: DeviceConfig::for_variant(variant),
            harness: HarnessConfig::for_variant(variant),
            paths: PathConfig::default(),
        }
    }

    /// Reads and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::File`] when the file cannot be read or decoded, or a
    /// geometry error from [`Config::validate`].
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        Self::load_json(path, None)
    }

    /// Reads a JSON configuration file as if it selected `variant`.
    ///
    /// Unset variant-dependent fields take the defaults of `variant`, not of the
    /// variant named in the file.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_json_file`].
    pub fn from_json_file_as(path: &Path, variant: Variant) -> Result<Self, ConfigError> {
        Self::load_json(path, Some(variant))
    }

    fn load_json(path: &Path, variant: Option<Variant>) -> Result<Self, ConfigError> {
        let file_error = |reason: String| ConfigError::File {
            path: path.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        let mut file: ConfigFile =
            serde_json::from_str(&text).map_err(|e| file_error(e.to_string()))?;
        if let Some(variant) = variant {
            file.device.variant = variant;
        }
        let config = Self::from(file);
        config.validate()?;
        Ok(config)
    }

    /// Checks that the geometry is usable by the address arithmetic.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Geometry`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.harness.reset_hold_periods < 2 {
            return Err(ConfigError::Geometry("reset must be held for at least 2 periods"));
        }
        let d = &self.device;
        if d.word_bytes == 0 {
            return Err(ConfigError::Geometry("word_bytes must be non-zero"));
        }
        if d.pe_window_words == 0 {
            return Err(ConfigError::Geometry("pe_window_words must be non-zero"));
        }
        if d.pe_count == 0 {
            return Err(ConfigError::Geometry("pe_count must be non-zero"));
        }
        if d.scratchpad_words == 0 {
            return Err(ConfigError::Geometry("scratchpad_words must be non-zero"));
        }
        if d.max_clusters > crate::common::constants::CLUSTER_ENABLE_BITS {
            return Err(ConfigError::Geometry(
                "max_clusters exceeds the 8-bit cluster enable mask",
            ));
        }
        if u64::from(d.scratchpad_words) + u64::from(d.pe_count) * u64::from(d.pe_window_words)
            > u64::from(u32::MAX / d.word_bytes)
        {
            return Err(ConfigError::Geometry(
                "PE-local region does not fit the 32-bit host address bus",
            ));
        }
        Ok(())
    }

    /// Returns whether a run of `workload` should record a waveform.
    ///
    /// Runs whose time limit (the ceiling in half-cycles) is below the
    /// threshold always trace; longer ones only for the designated workloads.
    pub fn wants_waveform(&self, workload: &str) -> bool {
        self.harness.cycle_ceiling.saturating_mul(2) < self.harness.waveform_time_threshold
            || self.harness.waveform_workloads.iter().any(|w| w == workload)
    }
}

/// JSON form of [`Config`].
///
/// Variant-dependent fields stay unset until the variant is known, then take
/// the defaults of [`Config::for_variant`].
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    device: DeviceFile,
    #[serde(default)]
    harness: HarnessFile,
    #[serde(default)]
    paths: PathConfig,
}

#[derive(Debug, Default, Deserialize)]
struct DeviceFile {
    #[serde(default)]
    variant: Variant,
    #[serde(default)]
    pe_count: Option<u32>,
    #[serde(flatten)]
    rest: DeviceConfig,
}

#[derive(Debug, Default, Deserialize)]
struct HarnessFile {
    #[serde(default)]
    waveform_time_threshold: Option<u64>,
    #[serde(default)]
    waveform_workloads: Option<Vec<String>>,
    #[serde(flatten)]
    rest: HarnessConfig,
}

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        let variant = file.device.variant;
        let defaults = Self::for_variant(variant);
        let device = DeviceConfig {
            variant,
            pe_count: file.device.pe_count.unwrap_or(defaults.device.pe_count),
            ..file.device.rest
        };
        let harness = HarnessConfig {
            waveform_time_threshold: file
                .harness
                .waveform_time_threshold
                .unwrap_or(defaults.harness.waveform_time_threshold),
            waveform_workloads: file
                .harness
                .waveform_workloads
                .unwrap_or(defaults.harness.waveform_workloads),
            ..file.harness.rest
        };
        Self {
            device,
            harness,
            paths: file.paths,
        }
    }
}

/// Device geometry and pin widths.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Device top being driven.
    #[serde(default)]
    pub variant: Variant,

    /// Host data word size in bytes.
    #[serde(default = "DeviceConfig::default_word_bytes")]
    pub word_bytes: u32,

    /// Scratchpad capacity in words; also the first PE-local word.
    #[serde(default = "DeviceConfig::default_scratchpad_words")]
    pub scratchpad_words: u32,

    /// Local memory window per PE, in words.
    #[serde(default = "DeviceConfig::default_pe_window_words")]
    pub pe_window_words: u32,

    /// PEs that PE-local transfers fold across.
    #[serde(default = "DeviceConfig::default_pe_count")]
    pub pe_count: u32,

    /// Mask applied to instruction addresses.
    #[serde(default = "DeviceConfig::default_imem_addr_mask")]
    pub imem_addr_mask: u32,

    /// Write-enable mask driven while loading instructions.
    #[serde(default = "DeviceConfig::default_imem_write_mask")]
    pub imem_write_mask: u8,

    /// Maximum clusters addressable through the enable mask.
    #[serde(default = "DeviceConfig::default_max_clusters")]
    pub max_clusters: u32,

    /// Clock period in nanoseconds.
    #[serde(default = "DeviceConfig::default_clock_period_ns")]
    pub clock_period_ns: u64,
}

impl DeviceConfig {
    /// Default geometry for a variant.
    pub fn for_variant(variant: Variant) -> Self {
        let pe_count = match variant {
            Variant::Grid => defaults::GRID_PE_COUNT,
            Variant::Scalable => defaults::SCALABLE_PE_COUNT,
        };
        Self {
            variant,
            word_bytes: defaults::WORD_BYTES,
            scratchpad_words: defaults::SCRATCHPAD_WORDS,
            pe_window_words: defaults::PE_WINDOW_WORDS,
            pe_count,
            imem_addr_mask: defaults::IMEM_ADDR_MASK,
            imem_write_mask: defaults::IMEM_WRITE_MASK,
            max_clusters: defaults::MAX_CLUSTERS,
            clock_period_ns: defaults::CLOCK_PERIOD_NS,
        }
    }

    fn default_word_bytes() -> u32 {
        defaults::WORD_BYTES
    }

    fn default_scratchpad_words() -> u32 {
        defaults::SCRATCHPAD_WORDS
    }

    fn default_pe_window_words() -> u32 {
        defaults::PE_WINDOW_WORDS
    }

    fn default_pe_count() -> u32 {
        defaults::GRID_PE_COUNT
    }

    fn default_imem_addr_mask() -> u32 {
        defaults::IMEM_ADDR_MASK
    }

    fn default_imem_write_mask() -> u8 {
        defaults::IMEM_WRITE_MASK
    }

    fn default_max_clusters() -> u32 {
        defaults::MAX_CLUSTERS
    }

    fn default_clock_period_ns() -> u64 {
        defaults::CLOCK_PERIOD_NS
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::for_variant(Variant::Grid)
    }
}

/// Orchestration timing and sampling parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct HarnessConfig {
    /// Hard ceiling on simulated periods; the only bound on a hung device.
    #[serde(default = "HarnessConfig::default_cycle_ceiling")]
    pub cycle_ceiling: u64,

    /// Periods reset is held asserted (at least 2).
    #[serde(default = "HarnessConfig::default_reset_hold")]
    pub reset_hold_periods: u64,

    /// Periods after reset release before configuration outputs are read.
    #[serde(default = "HarnessConfig::default_reset_release")]
    pub reset_release_periods: u64,

    /// Idle periods between configuration and data loading.
    #[serde(default = "HarnessConfig::default_settle")]
    pub settle_periods: u64,

    /// Cycles charged to the execution counter per restart sequence.
    #[serde(default = "HarnessConfig::default_restart_overhead")]
    pub restart_overhead_cycles: u64,

    /// Timed cycles between heartbeat log lines (0 disables them).
    #[serde(default = "HarnessConfig::default_heartbeat")]
    pub heartbeat_interval: u64,

    /// Pre-sizing hint for the sample buffers.
    #[serde(default = "HarnessConfig::default_sample_capacity")]
    pub sample_capacity_hint: usize,

    /// Time limit, in half-cycles, below which every run records a waveform.
    #[serde(default = "HarnessConfig::default_waveform_threshold")]
    pub waveform_time_threshold: u64,

    /// Workloads that always record a waveform.
    #[serde(default = "HarnessConfig::default_waveform_workloads")]
    pub waveform_workloads: Vec<String>,
}

impl HarnessConfig {
    /// Default orchestration parameters for a variant.
    ///
    /// Only the waveform policy differs: the scalable top has a higher time
    /// limit and no designated waveform workloads.
    pub fn for_variant(variant: Variant) -> Self {
        let (waveform_time_threshold, waveform_workloads) = match variant {
            Variant::Grid => (
                defaults::GRID_WAVEFORM_TIME_LIMIT,
                Self::default_waveform_workloads(),
            ),
            Variant::Scalable => (defaults::SCALABLE_WAVEFORM_TIME_LIMIT, Vec::new()),
        };
        Self {
            cycle_ceiling: defaults::CYCLE_CEILING,
            reset_hold_periods: defaults::RESET_HOLD_PERIODS,
            reset_release_periods: defaults::RESET_RELEASE_PERIODS,
            settle_periods: defaults::SETTLE_PERIODS,
            restart_overhead_cycles: defaults::RESTART_OVERHEAD_CYCLES,
            heartbeat_interval: defaults::HEARTBEAT_INTERVAL,
            sample_capacity_hint: defaults::SAMPLE_CAPACITY_HINT,
            waveform_time_threshold,
            waveform_workloads,
        }
    }

    fn default_cycle_ceiling() -> u64 {
        defaults::CYCLE_CEILING
    }

    fn default_reset_hold() -> u64 {
        defaults::RESET_HOLD_PERIODS
    }

    fn default_reset_release() -> u64 {
        defaults::RESET_RELEASE_PERIODS
    }

    fn default_settle() -> u64 {
        defaults::SETTLE_PERIODS
    }

    fn default_restart_overhead() -> u64 {
        defaults::RESTART_OVERHEAD_CYCLES
    }

    fn default_heartbeat() -> u64 {
        defaults::HEARTBEAT_INTERVAL
    }

    fn default_sample_capacity() -> usize {
        defaults::SAMPLE_CAPACITY_HINT
    }

    fn default_waveform_threshold() -> u64 {
        defaults::GRID_WAVEFORM_TIME_LIMIT
    }

    fn default_waveform_workloads() -> Vec<String> {
        defaults::WAVEFORM_WORKLOADS
            .iter()
            .map(|w| (*w).to_string())
            .collect()
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::for_variant(Variant::Grid)
    }
}

/// Input and output locations.
#[derive(Debug, Clone, Deserialize)]
pub struct PathConfig {
    /// Root of the software tree holding kernels and program images.
    #[serde(default = "PathConfig::default_software_root")]
    pub software_root: PathBuf,

    /// Directory for summary reports.
    #[serde(default = "PathConfig::default_report_dir")]
    pub report_dir: PathBuf,

    /// Directory for temporal-conflict traces.
    #[serde(default = "PathConfig::default_conflict_dir")]
    pub conflict_dir: PathBuf,

    /// Directory for finish-signal traces.
    #[serde(default = "PathConfig::default_finish_dir")]
    pub finish_dir: PathBuf,

    /// Result log written by read-back.
    #[serde(default = "PathConfig::default_result_log")]
    pub result_log: PathBuf,
}

impl PathConfig {
    fn default_software_root() -> PathBuf {
        PathBuf::from(defaults::SOFTWARE_ROOT)
    }

    fn default_report_dir() -> PathBuf {
        PathBuf::from(defaults::REPORT_DIR)
    }

    fn default_conflict_dir() -> PathBuf {
        PathBuf::from(defaults::CONFLICT_DIR)
    }

    fn default_finish_dir() -> PathBuf {
        PathBuf::from(defaults::FINISH_DIR)
    }

    fn default_result_log() -> PathBuf {
        PathBuf::from(defaults::RESULT_LOG)
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            software_root: Self::default_software_root(),
            report_dir: Self::default_report_dir(),
            conflict_dir: Self::default_conflict_dir(),
            finish_dir: Self::default_finish_dir(),
            result_log: Self::default_result_log(),
        }
    }
}
