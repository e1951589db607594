//! Behavioural loopback device.
//!
//! [`ScratchpadModel`] implements the host side of the pin interface with just
//! enough behaviour to run the full orchestration without the external RTL:
//! 1. **Memory:** A sparse word store per cluster bank, written and read through the host data port.
//! 2. **Instructions:** A sparse instruction memory; per-PE instruction counts come from address bits [13:10].
//! 3. **Execution:** A completion counter started by execution enable and cleared by reset.
//!
//! All state changes happen on the rising clock edge, so outputs reflect inputs
//! only after a full period, like a registered RTL interface.

use std::collections::HashMap;

use crate::common::addr::DeviceAddr;
use crate::common::constants::{IMEM_PE_MASK, IMEM_PE_SHIFT, WORD_BYTES};
use crate::common::error::ConfigError;
use crate::config::Variant;

use super::traits::{Capabilities, Device, PeCounters, pe_total};

/// Default number of execution cycles before completion is raised.
const DEFAULT_EXEC_LATENCY: u64 = 64;

/// Latched input pins.
#[derive(Debug, Clone, Copy, Default)]
struct Inputs {
    reset: bool,
    exec_enable: bool,
    preload: bool,
    mode_select: u8,
    grid_div: u32,
    arb_policy: u8,
    imem_we: u8,
    imem_addr: u32,
    imem_data: u32,
    data_req: bool,
    write_req: bool,
    dmem_addr: u32,
    dmem_din: u32,
    cluster_ena: u8,
}

/// A registered loopback model of the grid's host interface.
#[derive(Debug)]
pub struct ScratchpadModel {
    name: &'static str,
    rows: u32,
    cols: u32,
    clusters: u32,
    clustered: bool,
    exec_latency: u64,
    inputs: Inputs,
    clk: bool,
    banks: Vec<HashMap<u32, u32>>,
    imem: HashMap<u32, u32>,
    dout: u32,
    finish: bool,
    elapsed: Option<u64>,
    conflict: u32,
    conflicts: Vec<u32>,
    preload_pulses: u32,
    finalized: bool,
}

impl ScratchpadModel {
    /// Creates an unclustered grid of `rows x cols` PEs.
    pub fn grid(rows: u32, cols: u32) -> Self {
        Self::build("grid", rows, cols, 1, false)
    }

    /// Creates a clustered top with `clusters` TCDM banks.
    pub fn scalable(rows: u32, cols: u32, clusters: u32) -> Self {
        Self::build("scalable", rows, cols, clusters.max(1), true)
    }

    /// Creates the model for `variant` from user-supplied geometry.
    ///
    /// `clusters` is ignored for the grid top.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Geometry`] when the PE count overflows.
    pub fn for_variant(
        variant: Variant,
        rows: u32,
        cols: u32,
        clusters: u32,
    ) -> Result<Self, ConfigError> {
        match variant {
            Variant::Grid => {
                let _ = pe_total(rows, cols, 1)?;
                Ok(Self::grid(rows, cols))
            }
            Variant::Scalable => {
                let _ = pe_total(rows, cols, clusters.max(1))?;
                Ok(Self::scalable(rows, cols, clusters))
            }
        }
    }

    fn build(name: &'static str, rows: u32, cols: u32, clusters: u32, clustered: bool) -> Self {
        let pes = (rows as usize)
            .saturating_mul(cols as usize)
            .saturating_mul(clusters as usize);
        Self {
            name,
            rows,
            cols,
            clusters,
            clustered,
            exec_latency: DEFAULT_EXEC_LATENCY,
            inputs: Inputs::default(),
            clk: false,
            banks: vec![HashMap::new(); clusters as usize],
            imem: HashMap::new(),
            dout: 0,
            finish: false,
            elapsed: None,
            conflict: 0,
            conflicts: vec![0; pes],
            preload_pulses: 0,
            finalized: false,
        }
    }

    /// Sets how many enabled cycles pass before completion is raised.
    #[must_use]
    pub const fn with_exec_latency(mut self, cycles: u64) -> Self {
        self.exec_latency = cycles;
        self
    }

    /// Reads a scratchpad word directly, bypassing the host port.
    pub fn peek(&self, cluster: usize, word: u32) -> Option<u32> {
        self.banks.get(cluster)?.get(&word).copied()
    }

    /// Reads an instruction word directly.
    pub fn imem_word(&self, addr: u32) -> Option<u32> {
        self.imem.get(&addr).copied()
    }

    /// Number of preload pulses observed.
    pub const fn preload_pulses(&self) -> u32 {
        self.preload_pulses
    }

    /// Whether `finalize` has been called.
    pub const fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Grid division and arbitration policy as last driven.
    pub const fn driven_config(&self) -> (u32, u8, u8) {
        (
            self.inputs.grid_div,
            self.inputs.arb_policy,
            self.inputs.mode_select,
        )
    }

    fn pe_count(&self) -> usize {
        self.conflicts.len()
    }

    /// Bank selected by the current cluster mask, if the access is unambiguous.
    fn selected_bank(&self) -> Option<usize> {
        if !self.clustered {
            return Some(0);
        }
        let mask = self.inputs.cluster_ena;
        if mask.count_ones() != 1 {
            return None;
        }
        let bank = mask.trailing_zeros() as usize;
        (bank < self.banks.len()).then_some(bank)
    }

    fn rising_edge(&mut self) {
        let inputs = self.inputs;

        if inputs.imem_we != 0 {
            let _ = self.imem.insert(inputs.imem_addr, inputs.imem_data);
        }

        if inputs.data_req {
            let word = DeviceAddr(inputs.dmem_addr).word(WORD_BYTES).val();
            match self.selected_bank() {
                Some(bank) if inputs.write_req => {
                    let _ = self.banks[bank].insert(word, inputs.dmem_din);
                }
                Some(bank) => {
                    self.dout = self.banks[bank].get(&word).copied().unwrap_or(0);
                }
                None => self.dout = 0,
            }
        }

        if inputs.preload {
            self.preload_pulses += 1;
        }

        if inputs.reset {
            self.finish = false;
            self.elapsed = None;
            self.conflict = 0;
            return;
        }

        if inputs.exec_enable && !self.finish {
            let elapsed = self.elapsed.map_or(0, |e| e + 1);
            self.elapsed = Some(elapsed);
            self.conflict = (elapsed % 4) as u32;
            let pes = self.pe_count();
            if pes > 0 {
                self.conflicts[(elapsed as usize) % pes] += self.conflict;
            }
            if elapsed + 1 >= self.exec_latency {
                self.finish = true;
            }
        } else {
            self.conflict = 0;
        }
    }
}

impl Device for ScratchpadModel {
    fn name(&self) -> &str {
        self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            clusters: self.clustered,
            load_store_grant: self.clustered,
        }
    }

    fn set_clock(&mut self, high: bool) {
        self.clk = high;
    }

    fn eval(&mut self) {
        if self.clk {
            self.rising_edge();
        }
    }

    fn set_reset(&mut self, asserted: bool) {
        self.inputs.reset = asserted;
    }

    fn set_exec_enable(&mut self, enabled: bool) {
        self.inputs.exec_enable = enabled;
    }

    fn set_preload(&mut self, asserted: bool) {
        self.inputs.preload = asserted;
    }

    fn set_mode_select(&mut self, mode: u8) {
        self.inputs.mode_select = mode;
    }

    fn set_grid_div(&mut self, div: u32) {
        self.inputs.grid_div = div;
    }

    fn set_arb_policy(&mut self, policy: u8) {
        self.inputs.arb_policy = policy;
    }

    fn set_imem_write_enable(&mut self, mask: u8) {
        self.inputs.imem_we = mask;
    }

    fn set_imem_addr(&mut self, addr: u32) {
        self.inputs.imem_addr = addr;
    }

    fn set_imem_data(&mut self, data: u32) {
        self.inputs.imem_data = data;
    }

    fn set_data_req(&mut self, asserted: bool) {
        self.inputs.data_req = asserted;
    }

    fn set_write_req(&mut self, asserted: bool) {
        self.inputs.write_req = asserted;
    }

    fn set_dmem_addr(&mut self, addr: u32) {
        self.inputs.dmem_addr = addr;
    }

    fn set_dmem_din(&mut self, data: u32) {
        self.inputs.dmem_din = data;
    }

    fn dmem_out(&self) -> u32 {
        self.dout
    }

    fn finished(&self) -> bool {
        self.finish
    }

    fn conflict_sample(&self) -> u32 {
        self.conflict
    }

    fn finish_sample(&self) -> u64 {
        if !self.finish {
            return 0;
        }
        match self.pe_count() {
            n if n >= 64 => u64::MAX,
            n => (1u64 << n) - 1,
        }
    }

    fn grid_dims(&self) -> (u32, u32) {
        (self.rows, self.cols)
    }

    fn pe_counters(&self, pe: usize) -> PeCounters {
        let per_cluster = (self.rows as usize).saturating_mul(self.cols as usize).max(1);
        let local = (pe % per_cluster) as u32;
        let instructions = self
            .imem
            .keys()
            .filter(|addr| (*addr >> IMEM_PE_SHIFT) & IMEM_PE_MASK == local)
            .count() as u32;
        PeCounters {
            conflicts: self.conflicts.get(pe).copied().unwrap_or(0),
            instructions,
            traps: 0,
        }
    }

    fn cluster_count(&self) -> u32 {
        self.clusters
    }

    fn set_cluster_enable(&mut self, mask: u8) {
        self.inputs.cluster_ena = mask;
    }

    fn load_store_grant(&self) -> Option<bool> {
        self.clustered.then_some(true)
    }

    fn finalize(&mut self) {
        self.finalized = true;
    }
}
