//! Run orchestration.
//!
//! [`Simulator`] owns the engine, the configuration and every per-run accumulator,
//! and walks a workload through the run state machine:
//!
//! `Reset → Configure → LoadData → LoadInstructions → Preload → Execute →
//! [LoadInstructions → Preload → Execute] → ReadBack → Verify → Report → Shutdown`
//!
//! All transfer plans are validated before the device sees its first edge, so
//! configuration errors never leave a half-initialised device behind. The
//! only exception is the grid geometry, which the device reports after reset.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::bus::{AddressMap, BusEngine, TransferPlan, TransferSpec};
use crate::common::constants::EDGE_SETTLE_PERIODS;
use crate::common::error::{ConfigError, HarnessError};
use crate::config::{ArbPolicy, Config, Variant};
use crate::device::{Device, NoTrace, TraceSink, pe_total};
use crate::report::SimulationReport;
use crate::stats::{ExecutionTrace, PeSummary, PhaseCounters};
use crate::verify::{self, Verdict};

use super::image::DataImage;
use super::loader::load_program_file;
use super::transfer::{LogMode, Packing, ResultLog, bulk_read, bulk_write, gated};
use super::workload::{Catalog, DataLoad, Reference, Workload, folder_name, phase_two_folder, program_image};

/// Reset pulse after each execution phase on the grid top.
const GRID_POST_RESET_PERIODS: u64 = 1;

/// Reset pulse after each execution phase on the scalable top.
const SCALABLE_POST_RESET_PERIODS: u64 = 4;

/// Stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Reset asserted, inputs at their idle values.
    Reset,
    /// Geometry read back and the device left to settle.
    Configure,
    /// Data images written.
    LoadData,
    /// Program image written.
    LoadInstructions,
    /// Preload pulse issued.
    Preload,
    /// Warm-up and timed execution.
    Execute,
    /// Results read.
    ReadBack,
    /// Results compared.
    Verify,
    /// Summary assembled.
    Report,
    /// Device finalized.
    Shutdown,
}

impl RunPhase {
    /// Whether the state machine has an edge from `self` to `next`.
    ///
    /// `Execute → LoadInstructions` is the multi-phase edge; whether a given
    /// workload may take it is decided by the simulator.
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Reset, Self::Configure)
                | (Self::Configure, Self::LoadData)
                | (Self::LoadData, Self::LoadInstructions)
                | (Self::LoadInstructions, Self::Preload)
                | (Self::Preload, Self::Execute)
                | (Self::Execute, Self::LoadInstructions | Self::ReadBack)
                | (Self::ReadBack, Self::Verify)
                | (Self::Verify, Self::Report)
                | (Self::Report, Self::Shutdown)
        )
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The four invocation arguments, resolved.
#[derive(Debug, Clone)]
pub struct RunParams {
    /// Run folder name.
    pub folder: String,
    /// Grid division parameter.
    pub grid_div: u32,
    /// Workload to run.
    pub workload: Workload,
    /// Arbitration policy.
    pub arb_policy: ArbPolicy,
}

impl RunParams {
    /// Resolves raw invocation arguments.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for malformed numbers, an unknown workload token
    /// or an unsupported arbitration selector.
    pub fn resolve(
        folder: &str,
        grid_div: &str,
        workload: &str,
        arb_policy: &str,
        catalog: &Catalog,
        variant: Variant,
    ) -> Result<Self, ConfigError> {
        let grid_div = grid_div
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidNumber {
                arg: "grid_div",
                value: grid_div.to_string(),
            })?;
        let selector = arb_policy
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidNumber {
                arg: "arb_policy",
                value: arb_policy.to_string(),
            })?;
        Ok(Self {
            folder: folder_name(folder),
            grid_div,
            workload: catalog.lookup(workload, variant)?,
            arb_policy: ArbPolicy::from_selector(selector)?,
        })
    }
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunOutcome<D> {
    /// Summary report.
    pub report: SimulationReport,
    /// Per-cycle samples of the timed region.
    pub trace: ExecutionTrace,
    /// Values read back, in log order.
    pub results: Vec<i32>,
    /// The finalized device.
    pub device: D,
}

/// One data load resolved against the address map.
#[derive(Debug, Clone)]
struct PlannedLoad {
    cluster: Option<u32>,
    load: DataLoad,
    plan: TransferPlan,
}

/// One read-back range resolved against the address map.
#[derive(Debug, Clone, Copy)]
struct PlannedRead {
    cluster: Option<u32>,
    plan: TransferPlan,
}

/// Drives one device through complete runs.
#[derive(Debug)]
pub struct Simulator<D: Device, T: TraceSink = NoTrace> {
    engine: BusEngine<D, T>,
    config: Config,
    map: AddressMap,
    counters: PhaseCounters,
    trace: ExecutionTrace,
    phase: RunPhase,
}

impl<D: Device> Simulator<D, NoTrace> {
    /// Creates a simulator with waveform tracing disabled.
    ///
    /// # Errors
    ///
    /// See [`Simulator::with_trace`].
    pub fn new(device: D, config: Config) -> Result<Self, ConfigError> {
        Self::with_trace(device, NoTrace, config)
    }
}

impl<D: Device, T: TraceSink> Simulator<D, T> {
    /// Creates a simulator recording every clock edge into `trace`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid or the device
    /// lacks a pin the configured variant needs.
    pub fn with_trace(device: D, trace: T, config: Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let caps = device.capabilities();
        let variant = config.device.variant;
        if variant == Variant::Scalable && !caps.clusters {
            return Err(ConfigError::MissingCapability {
                variant,
                capability: "cluster_enable",
            });
        }

        let clusters = match variant {
            Variant::Grid => 1,
            Variant::Scalable => device.cluster_count(),
        };
        if clusters == 0 || clusters > config.device.max_clusters {
            return Err(ConfigError::ClusterOutOfRange {
                cluster: clusters,
                count: config.device.max_clusters,
            });
        }

        let map = AddressMap::new(&config.device).with_clusters(clusters);
        Ok(Self {
            engine: BusEngine::with_trace(device, trace),
            config,
            map,
            counters: PhaseCounters::default(),
            trace: ExecutionTrace::default(),
            phase: RunPhase::Reset,
        })
    }

    /// Current phase of the state machine.
    pub const fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Address map in use.
    pub const fn address_map(&self) -> &AddressMap {
        &self.map
    }

    /// Runs `params` to completion and finalizes the device.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] if any transfer of the workload is out of
    /// range; this is detected before the device is touched. A reported geometry
    /// whose PE count overflows fails the run at configuration. Missing files and
    /// byte-range violations are logged and do not fail the run.
    pub fn run(mut self, params: &RunParams) -> Result<RunOutcome<D>, HarnessError> {
        let loads = self.plan_loads(&params.workload)?;
        let reads = self.plan_reads(&params.workload)?;
        let variant = self.config.device.variant;
        let scalable = variant == Variant::Scalable;

        self.counters.reset();
        let capacity = usize::try_from(self.config.harness.cycle_ceiling)
            .unwrap_or(usize::MAX)
            .min(self.config.harness.sample_capacity_hint);
        self.trace = ExecutionTrace::with_capacity(capacity);
        self.phase = RunPhase::Reset;

        tracing::info!(
            folder = %params.folder,
            workload = %params.workload.name,
            %variant,
            grid_div = params.grid_div,
            arb = params.arb_policy.tag(),
            "starting run"
        );

        self.reset(params);

        self.advance(RunPhase::Configure)?;
        let (rows, cols) = self.engine.device().grid_dims();
        let clusters = self.map.clusters();
        let pes = pe_total(rows, cols, clusters)?;
        tracing::info!(rows, cols, clusters, "device configured");
        self.engine.periods(self.config.harness.settle_periods);

        self.advance(RunPhase::LoadData)?;
        self.load_data(&loads, scalable);

        let program = params.workload.program_path(&params.folder);
        self.execute_program(&program, scalable)?;

        if params.workload.phase_two {
            let second = program_image(&phase_two_folder(&params.folder));
            tracing::info!(program = %second.display(), "starting second phase");
            self.execute_program(&second, false)?;
        }

        self.advance(RunPhase::ReadBack)?;
        let packing = params
            .workload
            .readback
            .as_ref()
            .map_or(Packing::Word, |r| r.packing);
        let results = self.read_back(&reads, packing);

        self.advance(RunPhase::Verify)?;
        let verdict = self.verify(&params.workload.reference, &results);
        tracing::info!(verdict = %verdict, "verification finished");

        self.advance(RunPhase::Report)?;
        let report = SimulationReport {
            folder: params.folder.clone(),
            variant,
            rows,
            cols,
            clusters,
            program: self.config.paths.software_root.join(&program),
            grid_div: params.grid_div,
            arb_policy: params.arb_policy,
            total_time_ns: self.engine.now().cycles() * self.config.device.clock_period_ns,
            counters: self.counters,
            pes: PeSummary::collect(self.engine.device(), pes),
            verdict,
        };

        self.advance(RunPhase::Shutdown)?;
        let trace = std::mem::take(&mut self.trace);
        let device = self.engine.shutdown();
        Ok(RunOutcome {
            report,
            trace,
            results,
            device,
        })
    }

    fn advance(&mut self, next: RunPhase) -> Result<(), HarnessError> {
        if !self.phase.can_advance_to(next) {
            return Err(HarnessError::PhaseOrder {
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!(from = %self.phase, to = %next, "phase transition");
        self.phase = next;
        Ok(())
    }

    fn plan_loads(&self, workload: &Workload) -> Result<Vec<PlannedLoad>, ConfigError> {
        let clusters: Vec<Option<u32>> = match self.config.device.variant {
            Variant::Grid => vec![None],
            Variant::Scalable => (0..self.map.clusters()).map(Some).collect(),
        };

        let mut planned = Vec::new();
        for cluster in clusters {
            for load in &workload.loads {
                if !load.applies_to(cluster.unwrap_or(0)) {
                    continue;
                }
                let mut spec = TransferSpec::new(load.base_word, load.packing.device_words(load.length))
                    .placed(load.placement);
                if let Some(pe_count) = load.pe_count {
                    spec = spec.folded_across(pe_count);
                }
                if let Some(c) = cluster {
                    spec = spec.in_cluster(c);
                }
                planned.push(PlannedLoad {
                    cluster,
                    load: load.clone(),
                    plan: self.map.plan(spec)?,
                });
            }
        }
        Ok(planned)
    }

    fn plan_reads(&self, workload: &Workload) -> Result<Vec<PlannedRead>, ConfigError> {
        let Some(readback) = workload.readback.as_ref() else {
            return Ok(Vec::new());
        };
        match self.config.device.variant {
            Variant::Grid => readback
                .segments
                .iter()
                .map(|seg| {
                    Ok(PlannedRead {
                        cluster: None,
                        plan: self.map.plan(TransferSpec::new(seg.base_word, seg.length))?,
                    })
                })
                .collect(),
            Variant::Scalable => readback
                .cluster_segments(self.map.clusters())?
                .into_iter()
                .map(|(c, seg)| {
                    Ok(PlannedRead {
                        cluster: Some(c),
                        plan: self
                            .map
                            .plan(TransferSpec::new(seg.base_word, seg.length).in_cluster(c))?,
                    })
                })
                .collect(),
        }
    }

    fn reset(&mut self, params: &RunParams) {
        let harness = &self.config.harness;
        let device = self.engine.device_mut();
        device.set_exec_enable(false);
        device.set_preload(false);
        device.set_imem_write_enable(0);
        device.set_data_req(false);
        device.set_write_req(false);
        device.set_cluster_enable(0);
        device.set_reset(true);
        device.set_grid_div(params.grid_div);
        device.set_arb_policy(params.arb_policy.pin_value());
        device.set_mode_select(0);

        self.engine.periods(harness.reset_hold_periods);
        self.engine.device_mut().set_reset(false);
        self.engine.periods(harness.reset_release_periods);
    }

    fn load_data(&mut self, loads: &[PlannedLoad], scalable: bool) {
        let root = self.config.paths.software_root.clone();
        let counters = &mut self.counters;

        if scalable {
            for cluster in 0..self.map.clusters() {
                let mask = 1u8 << cluster;
                gated(&mut self.engine, mask, |engine| {
                    for item in loads.iter().filter(|l| l.cluster == Some(cluster)) {
                        counters.load_data += apply_load(engine, &root, item);
                    }
                });
            }
        } else {
            for item in loads {
                counters.load_data += apply_load(&mut self.engine, &root, item);
            }
        }
        self.engine.periods(EDGE_SETTLE_PERIODS);
    }

    /// Loads `program`, pulses preload and runs both execution regions.
    fn execute_program(&mut self, program: &Path, select_mode: bool) -> Result<(), HarnessError> {
        self.advance(RunPhase::LoadInstructions)?;
        let path = self.config.paths.software_root.join(program);
        match load_program_file(&mut self.engine, &path, &self.config.device) {
            Ok(n) => self.counters.load_instruction += n as u64,
            Err(e) if e.is_resource() => {
                tracing::warn!(error = %e, "program image unavailable; skipping instruction load");
            }
            Err(e) => return Err(e),
        }
        self.engine.periods(EDGE_SETTLE_PERIODS);
        if select_mode {
            self.engine.device_mut().set_mode_select(0);
            self.engine.periods(EDGE_SETTLE_PERIODS);
        }

        self.advance(RunPhase::Preload)?;
        self.engine.device_mut().set_preload(true);
        self.engine.periods(EDGE_SETTLE_PERIODS);
        self.engine.device_mut().set_preload(false);

        self.advance(RunPhase::Execute)?;
        self.engine.device_mut().set_exec_enable(true);
        self.engine.periods(EDGE_SETTLE_PERIODS);

        tracing::info!("preload run");
        while self.running() {
            self.engine.period();
            self.counters.preload += 1;
        }

        self.engine.device_mut().set_exec_enable(false);
        self.engine.periods(EDGE_SETTLE_PERIODS);
        self.engine.device_mut().set_reset(true);
        self.engine.period();
        self.engine.device_mut().set_exec_enable(true);
        self.engine.period();
        self.engine.device_mut().set_reset(false);
        self.counters.execution += self.config.harness.restart_overhead_cycles;

        tracing::info!("timed execution");
        let interval = self.config.harness.heartbeat_interval;
        let mut since_beat = 0u64;
        let mut beats = 0u64;
        while self.running() {
            self.engine.period();
            self.counters.execution += 1;
            self.trace.sample(self.engine.device());
            since_beat += 1;
            if interval > 0 && since_beat == interval {
                tracing::info!(beats, cycles = self.counters.execution, "heartbeat");
                since_beat = 0;
                beats += 1;
            }
        }
        if !self.engine.device().finished() {
            tracing::warn!(
                ceiling = self.config.harness.cycle_ceiling,
                "cycle ceiling reached before completion"
            );
        }

        let scalable = self.config.device.variant == Variant::Scalable;
        let device = self.engine.device_mut();
        device.set_exec_enable(false);
        device.set_reset(true);
        if scalable {
            device.set_mode_select(0);
        }
        self.engine.periods(if scalable {
            SCALABLE_POST_RESET_PERIODS
        } else {
            GRID_POST_RESET_PERIODS
        });
        self.engine.device_mut().set_reset(false);
        Ok(())
    }

    fn running(&self) -> bool {
        !self.engine.device().finished()
            && self.engine.now().cycles() < self.config.harness.cycle_ceiling
    }

    fn read_back(&mut self, reads: &[PlannedRead], packing: Packing) -> Vec<i32> {
        let log = ResultLog::new(self.config.paths.result_log.clone());
        let mut results = Vec::new();

        for (i, read) in reads.iter().enumerate() {
            let values = match (read.cluster, read.plan.cluster_gate()) {
                (Some(_), Some(mask)) => {
                    gated(&mut self.engine, mask, |engine| bulk_read(engine, &read.plan, packing))
                }
                _ => bulk_read(&mut self.engine, &read.plan, packing),
            };
            self.counters.read_data += u64::from(read.plan.len());

            let mode = if i == 0 {
                LogMode::Truncate
            } else {
                LogMode::Append
            };
            if let Err(e) = log.write(&values, mode) {
                tracing::warn!(error = %e, "failed to write result log");
            }
            results.extend(values);
        }

        if !reads.is_empty() {
            tracing::info!(
                values = results.len(),
                log = %log.path().display(),
                "read-back complete"
            );
        }
        results
    }

    fn verify(&self, reference: &Reference, results: &[i32]) -> Verdict {
        let report = match reference {
            Reference::None => return Verdict::Unchecked,
            Reference::Inline(values) => verify::compare(results, values),
            Reference::File(path) => {
                let path: PathBuf = self.config.paths.software_root.join(path);
                match verify::verify_file(results, &path) {
                    Ok(report) => report,
                    Err(e) => {
                        tracing::warn!(error = %e, "reference unavailable; verification skipped");
                        return Verdict::ReferenceUnavailable(path);
                    }
                }
            }
        };
        verify::log_findings(&report);
        Verdict::from_report(report)
    }
}

/// Reads one data image and writes it; returns the device writes issued.
fn apply_load<D: Device, T: TraceSink>(
    engine: &mut BusEngine<D, T>,
    root: &Path,
    item: &PlannedLoad,
) -> u64 {
    let cluster = item.cluster.unwrap_or(0);
    let path = root.join(item.load.path_for(cluster));
    let image = match DataImage::read(
        &path,
        item.load.start_line_for(cluster),
        Some(item.load.length as usize),
    ) {
        Ok(image) => image,
        Err(e) => {
            tracing::warn!(error = %e, "data image unavailable; skipping load");
            return 0;
        }
    };
    if image.len() < item.load.length as usize {
        tracing::warn!(
            path = %path.display(),
            expected = item.load.length,
            found = image.len(),
            "data image shorter than requested"
        );
    }

    tracing::info!(path = %path.display(), base = item.load.base_word, cluster = ?item.cluster, "loading data");
    match bulk_write(engine, &item.plan, &image.values, item.load.packing) {
        Ok(writes) => u64::from(writes),
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "transfer aborted");
            0
        }
    }
}
