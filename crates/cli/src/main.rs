//! Grid verification harness CLI.
//!
//! This binary is the invocation surface of the harness. It performs:
//! 1. **Argument resolution:** Folder, grid division, workload token and arbitration policy.
//! 2. **Run:** Drives the behavioural device model through a complete workload.
//! 3. **Artefacts:** Writes the summary report and the conflict/finish traces.
//!
//! The exit code is 0 whenever the run completes, whatever the verification
//! verdict; configuration errors exit with 1.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use gridsim_core::common::error::HarnessError;
use gridsim_core::config::{Config, Variant};
use gridsim_core::device::ScratchpadModel;
use gridsim_core::report::{conflict_trace_name, finish_trace_name};
use gridsim_core::sim::{Catalog, RunOutcome, RunParams, Simulator};

#[derive(Parser, Debug)]
#[command(
    name = "gridsim",
    author,
    version,
    about = "Cycle-accurate verification harness for many-core grid devices",
    long_about = "Load a workload into the device, run it to completion, read results back and verify them.\n\nExamples:\n  gridsim output_cmsis_l1_8x4 16 conv 1\n  gridsim output_gemm_4x4 16 gemm 0\n  gridsim --variant scalable --clusters 4 output_gemm_s 16 gemm 0\n\narb_policy: 0 --> Round Robin, 1 --> Priority min"
)]
struct Cli {
    /// Run folder (name or path) holding `combined_memory.mem` under `output/`.
    folder: String,

    /// Grid division factor.
    grid_div: String,

    /// Workload token (gemm, conv, 2mm, relu, instTest, others, ...).
    workload: String,

    /// Arbitration policy: 0 round robin, 1 priority min.
    arb_policy: String,

    /// Device top to drive; overrides the configuration file.
    #[arg(long, value_enum)]
    variant: Option<VariantArg>,

    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON file with additional workload definitions.
    #[arg(long)]
    workload_file: Option<PathBuf>,

    /// Clusters of the device model (scalable top only).
    #[arg(long, default_value_t = 1)]
    clusters: u32,

    /// Grid rows of the device model.
    #[arg(long, default_value_t = 4)]
    rows: u32,

    /// Grid columns of the device model.
    #[arg(long, default_value_t = 4)]
    cols: u32,

    /// Cycles the device model executes before raising completion.
    #[arg(long, default_value_t = 64)]
    exec_latency: u64,

    /// Log filter (e.g. `info`, `gridsim_core=debug`); defaults to `RUST_LOG` or `info`.
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum VariantArg {
    Grid,
    Scalable,
}

impl From<VariantArg> for Variant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::Grid => Self::Grid,
            VariantArg::Scalable => Self::Scalable,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    if let Err(e) = run(&cli) {
        tracing::error!("{e}");
        process::exit(1);
    }
}

fn init_logging(level: Option<&str>) {
    let filter = level.map_or_else(
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        EnvFilter::new,
    );
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Builds the configuration from the optional file and the variant flag.
///
/// The flag overrides the file's variant before defaults are filled in, so the
/// unset fields follow the variant actually run.
fn build_config(cli: &Cli) -> Result<Config, HarnessError> {
    let config = match (&cli.config, cli.variant) {
        (Some(path), Some(v)) => Config::from_json_file_as(path, v.into())?,
        (Some(path), None) => Config::from_json_file(path)?,
        (None, v) => Config::for_variant(v.map_or(Variant::Grid, Variant::from)),
    };
    Ok(config)
}

fn build_model(cli: &Cli, variant: Variant) -> Result<ScratchpadModel, HarnessError> {
    let model = ScratchpadModel::for_variant(variant, cli.rows, cli.cols, cli.clusters)?;
    Ok(model.with_exec_latency(cli.exec_latency))
}

/// Resolves the arguments, runs the workload and writes every artefact.
fn run(cli: &Cli) -> Result<(), HarnessError> {
    let config = build_config(cli)?;
    let variant = config.device.variant;

    let mut catalog = Catalog::builtin();
    if let Some(path) = &cli.workload_file {
        catalog = catalog.with_json_file(path)?;
    }
    let params = RunParams::resolve(
        &cli.folder,
        &cli.grid_div,
        &cli.workload,
        &cli.arb_policy,
        &catalog,
        variant,
    )?;

    if config.wants_waveform(&params.workload.name) {
        tracing::info!("waveform requested; the device model has no waveform backend");
    }

    let paths = config.paths.clone();
    let sim = Simulator::new(build_model(cli, variant)?, config)?;
    let outcome = sim.run(&params)?;

    write_artifacts(&outcome, &params, variant, &paths);

    if outcome.report.verdict.matched() {
        tracing::info!("simulation results match golden output");
    } else {
        tracing::warn!("simulation results do not match golden output");
    }
    Ok(())
}

fn write_artifacts(
    outcome: &RunOutcome<ScratchpadModel>,
    params: &RunParams,
    variant: Variant,
    paths: &gridsim_core::config::PathConfig,
) {
    let conflicts = paths.conflict_dir.join(conflict_trace_name(
        variant,
        &params.folder,
        params.arb_policy,
    ));
    if ensure_dir(&paths.conflict_dir) {
        match outcome.trace.write_conflicts(&conflicts) {
            Ok(()) => tracing::info!(path = %conflicts.display(), "temporal memory conflicts saved"),
            Err(e) => tracing::warn!(error = %e, "failed to write conflict trace"),
        }
    }

    let finishes = paths
        .finish_dir
        .join(finish_trace_name(variant, &params.folder, params.arb_policy));
    if ensure_dir(&paths.finish_dir) {
        match outcome.trace.write_finishes(&finishes) {
            Ok(()) => tracing::info!(path = %finishes.display(), "finish samples saved"),
            Err(e) => tracing::warn!(error = %e, "failed to write finish trace"),
        }
    }

    if ensure_dir(&paths.report_dir) {
        match outcome.report.write_to(&paths.report_dir) {
            Ok(path) => tracing::info!(path = %path.display(), "report generated"),
            Err(e) => tracing::warn!(error = %e, "failed to write report"),
        }
    }
}

fn ensure_dir(dir: &Path) -> bool {
    match fs::create_dir_all(dir) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to create output directory");
            false
        }
    }
}
