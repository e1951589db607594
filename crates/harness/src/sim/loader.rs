//! Program Loader.
//!
//! Streams a [`ProgramImage`] into instruction memory, one record per clock
//! period, in file order. After the last record the write enable is dropped and
//! one more period is run so the final write retires.

use std::path::Path;

use crate::bus::BusEngine;
use crate::common::error::HarnessError;
use crate::config::DeviceConfig;
use crate::device::{Device, TraceSink};

use super::image::ProgramImage;

/// Writes every record of `image` and returns how many were applied.
///
/// # Arguments
///
/// * `engine` - Engine owning the device.
/// * `image` - Parsed program; addresses are already masked.
/// * `write_mask` - Byte write enables held while records are applied.
pub fn load_program<D: Device, T: TraceSink>(
    engine: &mut BusEngine<D, T>,
    image: &ProgramImage,
    write_mask: u8,
) -> usize {
    engine.device_mut().set_imem_write_enable(write_mask);

    for (n, record) in image.records.iter().enumerate() {
        let device = engine.device_mut();
        device.set_imem_addr(record.addr);
        device.set_imem_data(record.word);
        tracing::debug!(
            index = n + 1,
            addr = format_args!("{:#06x}", record.addr),
            pe = (record.addr >> crate::common::constants::IMEM_PE_SHIFT)
                & crate::common::constants::IMEM_PE_MASK,
            data = format_args!("{:#010x}", record.word),
            "loading instruction"
        );
        engine.period();
    }

    engine.device_mut().set_imem_write_enable(0);
    engine.period();

    tracing::info!(records = image.records.len(), "instruction loading complete");
    image.records.len()
}

/// Reads a program image from disk and loads it.
///
/// # Errors
///
/// Returns [`HarnessError::Io`] if the image cannot be read; the device is not touched.
pub fn load_program_file<D: Device, T: TraceSink>(
    engine: &mut BusEngine<D, T>,
    path: &Path,
    device: &DeviceConfig,
) -> Result<usize, HarnessError> {
    let image = ProgramImage::read(path, device.imem_addr_mask)?;
    if image.malformed > 0 {
        tracing::warn!(path = %path.display(), skipped = image.malformed, "program image had malformed lines");
    }
    Ok(load_program(engine, &image, device.imem_write_mask))
}
