//! Pin-level device interface.
//!
//! This module defines the traits the harness is generic over. It provides:
//! 1. **Device:** Write-only input pins, read-only output pins and clock evaluation.
//! 2. **Capabilities:** A descriptor of the optional pins a concrete top exposes.
//! 3. **Tracing:** The [`TraceSink`] waveform hook and its zero-sized [`NoTrace`] default.
//!
//! Only [`crate::bus::BusEngine`] drives the clock. Every other component drives
//! inputs, asks the engine for a period, and then samples outputs.

use crate::common::error::ConfigError;

/// Optional pins a device top exposes beyond the common host interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// The top has a cluster-enable mask on the host data port.
    pub clusters: bool,
    /// The top reports a host load/store grant.
    pub load_store_grant: bool,
}

/// Number of PEs in a `rows x cols` grid replicated over `clusters`.
///
/// # Errors
///
/// Returns [`ConfigError::Geometry`] when the count does not fit a 32-bit PE index.
pub fn pe_total(rows: u32, cols: u32, clusters: u32) -> Result<usize, ConfigError> {
    rows.checked_mul(cols)
        .and_then(|n| n.checked_mul(clusters))
        .map(|n| n as usize)
        .ok_or(ConfigError::Geometry(
            "rows x cols x clusters overflows the 32-bit PE index",
        ))
}

/// Debug counters reported for one processing element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeCounters {
    /// Memory conflicts accumulated by the PE.
    pub conflicts: u32,
    /// Instructions retired by the PE.
    pub instructions: u32,
    /// Traps taken by the PE.
    pub traps: u32,
}

/// A synchronous device driven through its host pins.
///
/// Setters only latch a pin value; nothing is guaranteed to be visible on the
/// outputs until a full clock period has been evaluated.
pub trait Device {
    /// Returns a short name for the top (e.g. `"grid"`).
    fn name(&self) -> &str;

    /// Returns the optional pins this top provides.
    fn capabilities(&self) -> Capabilities;

    /// Drives the clock pin.
    fn set_clock(&mut self, high: bool);
    /// Evaluates the device after an input change.
    fn eval(&mut self);

    /// Drives the synchronous reset.
    fn set_reset(&mut self, asserted: bool);
    /// Drives the execution enable.
    fn set_exec_enable(&mut self, enabled: bool);
    /// Drives the preload request.
    fn set_preload(&mut self, asserted: bool);
    /// Drives the mode select.
    fn set_mode_select(&mut self, mode: u8);
    /// Drives the grid division parameter.
    fn set_grid_div(&mut self, div: u32);
    /// Drives the TCDM arbitration policy selector.
    fn set_arb_policy(&mut self, policy: u8);

    /// Drives the instruction-memory byte write enables.
    fn set_imem_write_enable(&mut self, mask: u8);
    /// Drives the instruction-memory address.
    fn set_imem_addr(&mut self, addr: u32);
    /// Drives the instruction-memory write data.
    fn set_imem_data(&mut self, data: u32);

    /// Drives the host data request.
    fn set_data_req(&mut self, asserted: bool);
    /// Drives the host write request.
    fn set_write_req(&mut self, asserted: bool);
    /// Drives the host data byte address.
    fn set_dmem_addr(&mut self, addr: u32);
    /// Drives the host write data.
    fn set_dmem_din(&mut self, data: u32);
    /// Samples the host read data bus.
    fn dmem_out(&self) -> u32;

    /// Samples the completion flag.
    fn finished(&self) -> bool;
    /// Samples this cycle's temporal memory-conflict count.
    fn conflict_sample(&self) -> u32;
    /// Samples this cycle's per-PE finish bits.
    fn finish_sample(&self) -> u64;

    /// Returns `(rows, cols)` reported by the device after reset release.
    fn grid_dims(&self) -> (u32, u32);
    /// Returns the debug counters of one PE.
    fn pe_counters(&self, pe: usize) -> PeCounters;

    /// Returns the cluster count reported by the device (1 when unclustered).
    fn cluster_count(&self) -> u32 {
        1
    }
    /// Drives the cluster-enable mask; ignored by tops without clusters.
    fn set_cluster_enable(&mut self, _mask: u8) {}
    /// Samples the host load/store grant, if the top has one.
    fn load_store_grant(&self) -> Option<bool> {
        None
    }

    /// Releases device resources. Called exactly once by [`super::DeviceHandle`].
    fn finalize(&mut self) {}
}

/// Waveform recorder fed by the bus engine on every clock edge.
pub trait TraceSink {
    /// Records the current state of every signal at `time`.
    fn dump(&mut self, time: u64);

    /// Flushes and closes the trace.
    fn close(&mut self) {}
}

/// Disabled tracing; compiles away entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTrace;

impl TraceSink for NoTrace {
    #[inline(always)]
    fn dump(&mut self, _time: u64) {}
}

impl<T: TraceSink + ?Sized> TraceSink for &mut T {
    fn dump(&mut self, time: u64) {
        (**self).dump(time);
    }

    fn close(&mut self) {
        (**self).close();
    }
}

impl<T: TraceSink + ?Sized> TraceSink for Box<T> {
    fn dump(&mut self, time: u64) {
        (**self).dump(time);
    }

    fn close(&mut self) {
        (**self).close();
    }
}
