//! A device that records what it sees on each rising edge.

use std::cell::Cell;
use std::rc::Rc;

use gridsim_core::device::{Capabilities, Device, PeCounters, ScratchpadModel};

/// A transaction latched on one rising edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Instruction memory write.
    Imem { addr: u32, data: u32 },
    /// Host data write.
    Write { addr: u32, data: u32, cluster: u8 },
    /// Host data read.
    Read { addr: u32, cluster: u8 },
    /// Rising edge with no host transaction.
    Idle,
}

#[derive(Debug, Default, Clone, Copy)]
struct Shadow {
    clk: bool,
    imem_we: u8,
    imem_addr: u32,
    imem_data: u32,
    data_req: bool,
    write_req: bool,
    addr: u32,
    din: u32,
    cluster: u8,
    preload: bool,
    reset: bool,
}

/// Wraps a [`ScratchpadModel`] and logs one [`Event`] per rising edge.
#[derive(Debug)]
pub struct RecordingDevice {
    pub inner: ScratchpadModel,
    pub events: Vec<Event>,
    pub preload_edges: u32,
    pub reset_edges: u32,
    pub finalize_calls: u32,
    /// Shared finalize counter that outlives the device.
    pub finalized: Rc<Cell<u32>>,
    /// Shared rising-edge counter that outlives the device.
    pub edges: Rc<Cell<u64>>,
    /// Grid dimensions to report instead of the model's own.
    pub reported_dims: Option<(u32, u32)>,
    shadow: Shadow,
}

impl RecordingDevice {
    pub fn new(inner: ScratchpadModel) -> Self {
        Self {
            inner,
            events: Vec::new(),
            preload_edges: 0,
            reset_edges: 0,
            finalize_calls: 0,
            finalized: Rc::new(Cell::new(0)),
            edges: Rc::new(Cell::new(0)),
            reported_dims: None,
            shadow: Shadow::default(),
        }
    }

    pub fn grid() -> Self {
        Self::new(ScratchpadModel::grid(2, 2).with_exec_latency(8))
    }

    pub fn imem_writes(&self) -> Vec<(u32, u32)> {
        self.events
            .iter()
            .filter_map(|e| match *e {
                Event::Imem { addr, data } => Some((addr, data)),
                _ => None,
            })
            .collect()
    }

    pub fn data_writes(&self) -> Vec<(u32, u32)> {
        self.events
            .iter()
            .filter_map(|e| match *e {
                Event::Write { addr, data, .. } => Some((addr, data)),
                _ => None,
            })
            .collect()
    }

    pub fn data_reads(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|e| match *e {
                Event::Read { addr, .. } => Some(addr),
                _ => None,
            })
            .collect()
    }
}

impl Device for RecordingDevice {
    fn name(&self) -> &str {
        "recording"
    }

    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    fn set_clock(&mut self, high: bool) {
        self.shadow.clk = high;
        self.inner.set_clock(high);
    }

    fn eval(&mut self) {
        if self.shadow.clk {
            let s = self.shadow;
            let event = if s.imem_we != 0 {
                Event::Imem {
                    addr: s.imem_addr,
                    data: s.imem_data,
                }
            } else if s.data_req && s.write_req {
                Event::Write {
                    addr: s.addr,
                    data: s.din,
                    cluster: s.cluster,
                }
            } else if s.data_req {
                Event::Read {
                    addr: s.addr,
                    cluster: s.cluster,
                }
            } else {
                Event::Idle
            };
            self.events.push(event);
            self.edges.set(self.edges.get() + 1);
            if s.preload {
                self.preload_edges += 1;
            }
            if s.reset {
                self.reset_edges += 1;
            }
        }
        self.inner.eval();
    }

    fn set_reset(&mut self, asserted: bool) {
        self.shadow.reset = asserted;
        self.inner.set_reset(asserted);
    }

    fn set_exec_enable(&mut self, enabled: bool) {
        self.inner.set_exec_enable(enabled);
    }

    fn set_preload(&mut self, asserted: bool) {
        self.shadow.preload = asserted;
        self.inner.set_preload(asserted);
    }

    fn set_mode_select(&mut self, mode: u8) {
        self.inner.set_mode_select(mode);
    }

    fn set_grid_div(&mut self, div: u32) {
        self.inner.set_grid_div(div);
    }

    fn set_arb_policy(&mut self, policy: u8) {
        self.inner.set_arb_policy(policy);
    }

    fn set_imem_write_enable(&mut self, mask: u8) {
        self.shadow.imem_we = mask;
        self.inner.set_imem_write_enable(mask);
    }

    fn set_imem_addr(&mut self, addr: u32) {
        self.shadow.imem_addr = addr;
        self.inner.set_imem_addr(addr);
    }

    fn set_imem_data(&mut self, data: u32) {
        self.shadow.imem_data = data;
        self.inner.set_imem_data(data);
    }

    fn set_data_req(&mut self, asserted: bool) {
        self.shadow.data_req = asserted;
        self.inner.set_data_req(asserted);
    }

    fn set_write_req(&mut self, asserted: bool) {
        self.shadow.write_req = asserted;
        self.inner.set_write_req(asserted);
    }

    fn set_dmem_addr(&mut self, addr: u32) {
        self.shadow.addr = addr;
        self.inner.set_dmem_addr(addr);
    }

    fn set_dmem_din(&mut self, data: u32) {
        self.shadow.din = data;
        self.inner.set_dmem_din(data);
    }

    fn dmem_out(&self) -> u32 {
        self.inner.dmem_out()
    }

    fn finished(&self) -> bool {
        self.inner.finished()
    }

    fn conflict_sample(&self) -> u32 {
        self.inner.conflict_sample()
    }

    fn finish_sample(&self) -> u64 {
        self.inner.finish_sample()
    }

    fn grid_dims(&self) -> (u32, u32) {
        self.reported_dims.unwrap_or_else(|| self.inner.grid_dims())
    }

    fn pe_counters(&self, pe: usize) -> PeCounters {
        self.inner.pe_counters(pe)
    }

    fn cluster_count(&self) -> u32 {
        self.inner.cluster_count()
    }

    fn set_cluster_enable(&mut self, mask: u8) {
        self.shadow.cluster = mask;
        self.inner.set_cluster_enable(mask);
    }

    fn load_store_grant(&self) -> Option<bool> {
        self.inner.load_store_grant()
    }

    fn finalize(&mut self) {
        self.finalize_calls += 1;
        self.finalized.set(self.finalized.get() + 1);
        self.inner.finalize();
    }
}
