//! Data Transfer Unit.
//!
//! Bulk movement of data between host and device memory through the host data port:
//! 1. **Writes:** One device write per word, or per four packed bytes in byte mode, then a flush period.
//! 2. **Reads:** One period per word; byte mode splits each word into four sign-extended lanes.
//! 3. **Cluster gating:** [`gated`] holds a cluster enable mask around a group of transfers.
//! 4. **Result log:** [`ResultLog`] persists read-back values one per line.
//!
//! Addresses always come from a validated [`TransferPlan`].

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::bus::{BusEngine, TransferPlan};
use crate::common::constants::{BYTE_MAX, BYTE_MIN, BYTES_PER_WORD};
use crate::common::error::HarnessError;
use crate::device::{Device, TraceSink};

/// How values map onto device words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Packing {
    /// One signed 32-bit value per device word.
    #[default]
    Word,
    /// Four signed bytes per device word, little-endian.
    Bytes,
}

impl Packing {
    /// Device words needed to hold `values` elements.
    pub const fn device_words(self, values: u32) -> u32 {
        match self {
            Self::Word => values,
            Self::Bytes => values.div_ceil(BYTES_PER_WORD as u32),
        }
    }
}

/// Packs signed bytes little-endian, four to a word; unused lanes of the last word are zero.
///
/// Every value is validated before anything is packed.
///
/// # Errors
///
/// Returns [`HarnessError::ByteRange`] for the first value outside [-128, 127].
pub fn pack_bytes(values: &[i32]) -> Result<Vec<u32>, HarnessError> {
    if let Some((index, &value)) = values
        .iter()
        .enumerate()
        .find(|(_, v)| !(BYTE_MIN..=BYTE_MAX).contains(*v))
    {
        return Err(HarnessError::ByteRange { value, index });
    }

    Ok(values
        .chunks(BYTES_PER_WORD)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u32, |word, (lane, &v)| word | (u32::from(v as u8) << (8 * lane)))
        })
        .collect())
}

/// Splits a device word into four sign-extended bytes, lowest lane first.
pub fn unpack_bytes(word: u32) -> [i32; BYTES_PER_WORD] {
    word.to_le_bytes().map(|b| i32::from(b as i8))
}

/// Writes `values` through `plan` and returns the number of device writes issued.
///
/// At most `plan.len()` device words are written; a shorter source writes fewer.
/// Both request lines are dropped and one flush period runs afterwards; a
/// cluster gate set by the plan is cleared after the flush.
///
/// # Errors
///
/// In byte mode, returns [`HarnessError::ByteRange`] before any write when a value
/// is out of range.
pub fn bulk_write<D: Device, T: TraceSink>(
    engine: &mut BusEngine<D, T>,
    plan: &TransferPlan,
    values: &[i32],
    packing: Packing,
) -> Result<u32, HarnessError> {
    let words: Vec<u32> = match packing {
        Packing::Word => values.iter().map(|&v| v as u32).collect(),
        Packing::Bytes => pack_bytes(values)?,
    };

    let gate = plan.cluster_gate();
    if let Some(mask) = gate {
        engine.device_mut().set_cluster_enable(mask);
    }

    let count = plan.len().min(words.len() as u32);
    for (i, &word) in (0..count).zip(words.iter()) {
        let addr = plan.address(i);
        let device = engine.device_mut();
        device.set_data_req(true);
        device.set_write_req(true);
        device.set_dmem_addr(addr.val());
        device.set_dmem_din(word);
        tracing::debug!(%addr, data = format_args!("{word:#x}"), "host write");
        engine.period();
    }

    let device = engine.device_mut();
    device.set_data_req(false);
    device.set_write_req(false);
    engine.period();
    if gate.is_some() {
        engine.device_mut().set_cluster_enable(0);
    }

    tracing::info!(writes = count, ?packing, "bulk write complete");
    Ok(count)
}

/// Reads `plan.len()` words and returns them as signed values.
///
/// Word mode yields one value per word, byte mode four. The data request and
/// any cluster gate are left deasserted on return; no extra period is run.
pub fn bulk_read<D: Device, T: TraceSink>(
    engine: &mut BusEngine<D, T>,
    plan: &TransferPlan,
    packing: Packing,
) -> Vec<i32> {
    let gate = plan.cluster_gate();
    if let Some(mask) = gate {
        engine.device_mut().set_cluster_enable(mask);
    }

    let per_word = match packing {
        Packing::Word => 1,
        Packing::Bytes => BYTES_PER_WORD,
    };
    let mut results = Vec::with_capacity(plan.len() as usize * per_word);

    for addr in plan.addresses() {
        let device = engine.device_mut();
        device.set_data_req(true);
        device.set_write_req(false);
        device.set_dmem_addr(addr.val());
        device.set_dmem_din(0);
        engine.period();

        let device = engine.device();
        let word = device.dmem_out();
        if device.load_store_grant() == Some(false) {
            tracing::warn!(%addr, "host load/store grant deasserted during read");
        }
        match packing {
            Packing::Word => results.push(word as i32),
            Packing::Bytes => results.extend(unpack_bytes(word)),
        }
    }

    let device = engine.device_mut();
    device.set_data_req(false);
    if gate.is_some() {
        device.set_cluster_enable(0);
    }
    tracing::info!(words = plan.len(), values = results.len(), "bulk read complete");
    results
}

/// Holds cluster enable `mask` around `body`, then runs a period, clears the mask and runs another.
pub fn gated<D: Device, T: TraceSink, R>(
    engine: &mut BusEngine<D, T>,
    mask: u8,
    body: impl FnOnce(&mut BusEngine<D, T>) -> R,
) -> R {
    engine.device_mut().set_cluster_enable(mask);
    let result = body(engine);
    engine.period();
    engine.device_mut().set_cluster_enable(0);
    engine.period();
    result
}

/// Whether a result log starts fresh or continues a previous partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// Replace any existing log.
    Truncate,
    /// Add to the end of the existing log.
    Append,
}

/// One-value-per-line log of read-back data.
#[derive(Debug, Clone)]
pub struct ResultLog {
    path: PathBuf,
}

impl ResultLog {
    /// Targets the log at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `values` in order, one per line.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] if the log cannot be opened or written.
    pub fn write(&self, values: &[i32], mode: LogMode) -> Result<(), HarnessError> {
        let file = match mode {
            LogMode::Truncate => File::create(&self.path),
            LogMode::Append => OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path),
        }
        .map_err(|e| HarnessError::io(&self.path, e))?;

        let mut out = BufWriter::new(file);
        for v in values {
            writeln!(out, "{v}").map_err(|e| HarnessError::io(&self.path, e))?;
        }
        out.flush().map_err(|e| HarnessError::io(&self.path, e))
    }
}
