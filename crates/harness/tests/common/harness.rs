//! Test fixtures: temporary software trees and engines.

use std::fs;
use std::path::{Path, PathBuf};

use gridsim_core::bus::{AddressMap, BusEngine};
use gridsim_core::config::{Config, Variant};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

use super::mocks::device::RecordingDevice;

/// A temporary directory laid out like the software tree.
#[derive(Debug)]
pub struct SoftwareTree {
    pub dir: TempDir,
}

impl SoftwareTree {
    pub fn new() -> Self {
        init_test_logging();
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `contents` at `rel`, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    /// Writes one value per line.
    pub fn write_values(&self, rel: &str, values: &[i32]) -> PathBuf {
        let text: String = values.iter().map(|v| format!("{v}\n")).collect();
        self.write(rel, &text)
    }

    /// Configuration rooted at this tree, with the result log inside it.
    pub fn config(&self, variant: Variant) -> Config {
        let mut config = Config::for_variant(variant);
        config.paths.software_root = self.root().to_path_buf();
        config.paths.result_log = self.root().join("mem_dump_bytes.txt");
        config.harness.cycle_ceiling = 100_000;
        config.harness.sample_capacity_hint = 1024;
        config
    }
}

/// Routes harness logs to the test writer; filter with `RUST_LOG`.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Engine over a fresh recording grid device.
pub fn recording_engine() -> BusEngine<RecordingDevice> {
    BusEngine::new(RecordingDevice::grid())
}

/// Address map of the default grid configuration.
pub fn grid_map() -> AddressMap {
    AddressMap::new(&Config::for_variant(Variant::Grid).device)
}
