//! Workload catalog.
//!
//! A workload names the data a kernel needs, where its results land and what
//! they are checked against. This module provides:
//! 1. **Descriptors:** [`Workload`], [`DataLoad`], [`Readback`] and [`Reference`], all deserialisable.
//! 2. **Built-ins:** The kernels the grid and scalable tops are exercised with.
//! 3. **Catalog:** Token lookup over custom (JSON) and built-in workloads.
//! 4. **Naming:** Run folder and phase-two folder derivation.
//!
//! Every path is relative to the configured software root.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::bus::Placement;
use crate::common::error::ConfigError;
use crate::config::Variant;

use super::transfer::Packing;

/// Program image inside each run folder.
const PROGRAM_IMAGE: &str = "combined_memory.mem";

/// Directory under the software root holding compiled run folders.
const OUTPUT_DIR: &str = "output";

/// Outputs of the instruction self-test kernel.
const INST_TEST_GOLDEN: [i32; 25] = [
    -100, 200, 100, -300, -25600, 1, 0, -172, -36, 136, 16_777_215, -1, -104_857_600, 4095, -1, -1,
    0, 0, 164, -68, -232, 0, 0, 0, 0,
];

/// One data image written into device memory before execution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataLoad {
    /// Image path.
    pub path: PathBuf,
    /// First device word written.
    pub base_word: u32,
    /// Number of values taken from the image.
    pub length: u32,
    /// Word or packed-byte transfer.
    #[serde(default)]
    pub packing: Packing,
    /// Scratchpad or PE-local placement.
    #[serde(default)]
    pub placement: Placement,
    /// PEs the data is folded across; defaults to the device's PE count.
    #[serde(default)]
    pub pe_count: Option<u32>,
    /// Data lines skipped before reading.
    #[serde(default)]
    pub start_line: usize,
    /// Extra lines skipped per cluster index.
    #[serde(default)]
    pub start_line_stride: usize,
    /// Per-cluster image paths overriding `path`.
    #[serde(default)]
    pub cluster_paths: Vec<PathBuf>,
    /// Only clusters below this index receive the load.
    #[serde(default)]
    pub cluster_limit: Option<u32>,
}

impl DataLoad {
    /// A word-mode scratchpad load of `length` values at `base_word`.
    pub fn words(path: impl Into<PathBuf>, base_word: u32, length: u32) -> Self {
        Self {
            path: path.into(),
            base_word,
            length,
            packing: Packing::Word,
            placement: Placement::Auto,
            pe_count: None,
            start_line: 0,
            start_line_stride: 0,
            cluster_paths: Vec::new(),
            cluster_limit: None,
        }
    }

    /// A byte-mode load of `length` bytes at `base_word`.
    pub fn bytes(path: impl Into<PathBuf>, base_word: u32, length: u32) -> Self {
        Self {
            packing: Packing::Bytes,
            ..Self::words(path, base_word, length)
        }
    }

    /// Whether cluster `cluster` receives this load.
    pub fn applies_to(&self, cluster: u32) -> bool {
        self.cluster_limit.is_none_or(|limit| cluster < limit)
    }

    /// Image path used for `cluster`.
    pub fn path_for(&self, cluster: u32) -> &Path {
        self.cluster_paths
            .get(cluster as usize)
            .unwrap_or(&self.path)
    }

    /// Data lines skipped for `cluster`.
    pub const fn start_line_for(&self, cluster: u32) -> usize {
        self.start_line + self.start_line_stride * cluster as usize
    }
}

/// A contiguous range of words read back after execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Segment {
    /// First device word read.
    pub base_word: u32,
    /// Number of words read.
    pub length: u32,
}

/// How a read-back range is split across clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    /// Each cluster reads `length / clusters` words, base advanced by that share.
    #[default]
    Split,
    /// Each cluster reads `length / clusters` words from the same base.
    Shared,
}

/// Where results are read back from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Readback {
    /// Ranges read in order and concatenated.
    pub segments: Vec<Segment>,
    /// Word or byte read.
    #[serde(default)]
    pub packing: Packing,
    /// Cluster split rule on clustered tops.
    #[serde(default)]
    pub partition: Partition,
}

impl Readback {
    fn words(base_word: u32, length: u32) -> Self {
        Self {
            segments: vec![Segment { base_word, length }],
            packing: Packing::Word,
            partition: Partition::Split,
        }
    }

    /// Per-cluster segments: `(cluster, base_word, length)` in read order.
    ///
    /// Every cluster reads `length / clusters` words of each segment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnevenClusterSplit`] when a segment length is not a
    /// multiple of `clusters`; the remainder would otherwise never be read.
    pub fn cluster_segments(&self, clusters: u32) -> Result<Vec<(u32, Segment)>, ConfigError> {
        let clusters = clusters.max(1);
        let mut out = Vec::new();
        for seg in &self.segments {
            if seg.length % clusters != 0 {
                return Err(ConfigError::UnevenClusterSplit {
                    base: seg.base_word,
                    length: seg.length,
                    clusters,
                });
            }
            let share = seg.length / clusters;
            for c in 0..clusters {
                let base_word = match self.partition {
                    Partition::Split => seg.base_word + c * share,
                    Partition::Shared => seg.base_word,
                };
                out.push((
                    c,
                    Segment {
                        base_word,
                        length: share,
                    },
                ));
            }
        }
        Ok(out)
    }
}

/// Expected results.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reference {
    /// Nothing to verify against.
    #[default]
    None,
    /// Golden file in the data image format.
    File(PathBuf),
    /// Golden values given directly.
    Inline(Vec<i32>),
}

/// A complete kernel description.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Workload {
    /// Token selecting the workload.
    pub name: String,
    /// Data written before instructions are loaded.
    #[serde(default)]
    pub loads: Vec<DataLoad>,
    /// Program image overriding `output/<folder>/combined_memory.mem`.
    #[serde(default)]
    pub program: Option<PathBuf>,
    /// Whether a second program runs on the data left by the first.
    #[serde(default)]
    pub phase_two: bool,
    /// Result ranges; `None` skips read-back.
    #[serde(default)]
    pub readback: Option<Readback>,
    /// Expected results.
    #[serde(default)]
    pub reference: Reference,
}

impl Workload {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            loads: Vec::new(),
            program: None,
            phase_two: false,
            readback: None,
            reference: Reference::None,
        }
    }

    fn load(mut self, load: DataLoad) -> Self {
        self.loads.push(load);
        self
    }

    fn read(mut self, readback: Readback) -> Self {
        self.readback = Some(readback);
        self
    }

    fn golden(mut self, path: &str) -> Self {
        self.reference = Reference::File(PathBuf::from(path));
        self
    }

    /// Program image for the run folder, relative to the software root.
    pub fn program_path(&self, folder: &str) -> PathBuf {
        self.program
            .clone()
            .unwrap_or_else(|| program_image(folder))
    }
}

/// `output/<folder>/combined_memory.mem`.
pub fn program_image(folder: &str) -> PathBuf {
    Path::new(OUTPUT_DIR).join(folder).join(PROGRAM_IMAGE)
}

/// Run folder name: last path component with its extension removed.
pub fn folder_name(arg: &str) -> String {
    let last = arg.rsplit('/').next().unwrap_or(arg);
    match last.rfind('.') {
        Some(dot) if dot > 0 => last[..dot].to_string(),
        _ => last.to_string(),
    }
}

/// Folder of the second program: the run folder without its `_<digits>` suffix, plus `_2`.
pub fn phase_two_folder(folder: &str) -> String {
    let stem = match folder.rsplit_once('_') {
        Some((base, digits)) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            base
        }
        _ => folder,
    };
    format!("{stem}_2")
}

const GEMM: &str = "kernel/gemm/ncubed";
const GEMM_32: &str = "kernel/gemm_32x32/ncubed";
const GEMM_128: &str = "kernel/gemm_128x128/ncubed";
const MM2: &str = "kernel/2mm/ncubed";
const CONV: &str = "kernel/conv_int8";
const RELU_SIZE: u32 = 14_400;

fn kernel(dir: &str, file: &str) -> PathBuf {
    Path::new(dir).join(file)
}

fn golden(dir: &str) -> String {
    format!("{dir}/output_raw.data")
}

/// Built-in workload for `token` on `variant`, if there is one.
pub fn builtin(token: &str, variant: Variant) -> Option<Workload> {
    let scalable = variant == Variant::Scalable;
    let w = match token {
        "gemm" | "gemmadd64x64" => {
            let w = Workload::new(token)
                .load(DataLoad::words(kernel(GEMM, "input_A.data"), 50, 4096))
                .load(DataLoad::words(kernel(GEMM, "input_B.data"), 5000, 4096))
                .read(Readback::words(10_001, 4096));
            if token == "gemm" { w.golden(&golden(GEMM)) } else { w }
        }
        "gemm32x32" | "gemmadd32x32" if scalable => {
            let w = Workload::new(token)
                .load(DataLoad::words(kernel(GEMM_32, "input_A.data"), 50, 1024))
                .load(DataLoad::words(kernel(GEMM_32, "input_B.data"), 5000, 1024))
                .read(Readback::words(10_001, 1024));
            if token == "gemm32x32" { w.golden(&golden(GEMM_32)) } else { w }
        }
        "gemm32x32" | "gemmadd32x32" | "others" if !scalable => {
            let w = Workload::new(token)
                .load(DataLoad::words(kernel(GEMM_128, "input_B.data"), 3750, 16_384))
                .load(DataLoad::words(kernel(GEMM_128, "input_B.data"), 7846, 16_384))
                .read(Readback::words(22_500, 8192));
            if token == "gemm32x32" { w.golden(&golden(GEMM_32)) } else { w }
        }
        "others" => Workload::new(token),
        "gemm128x128" => {
            let b_base = if scalable { 20_000 } else { 17_500 };
            let out_base = if scalable { 40_001 } else { 37_501 };
            Workload::new(token)
                .load(DataLoad::words(kernel(GEMM_128, "input_A.data"), 50, 16_384))
                .load(DataLoad::words(kernel(GEMM_128, "input_B.data"), b_base, 16_384))
                .read(Readback::words(out_base, 16_384))
                .golden(&golden(GEMM_128))
        }
        "gemm_dup" => Workload::new(token)
            .load(DataLoad::words(kernel(GEMM, "input_A.data"), 50, 4096))
            .load(DataLoad::words(kernel(GEMM, "input_B.data"), 5000, 4096))
            .load(DataLoad::words(kernel(GEMM, "input_A.data"), 25_050, 4096))
            .load(DataLoad::words(kernel(GEMM, "input_B.data"), 30_000, 4096))
            .read(Readback {
                segments: vec![
                    Segment {
                        base_word: 10_001,
                        length: 2048,
                    },
                    Segment {
                        base_word: 37_049,
                        length: 2048,
                    },
                ],
                packing: Packing::Word,
                partition: Partition::Split,
            })
            .golden(&golden(GEMM)),
        "2mm" => {
            let mut w = Workload::new(token)
                .load(DataLoad::words(kernel(MM2, "input_fxp_matrix_1.data"), 50, 4096))
                .load(DataLoad::words(kernel(MM2, "input_fxp_matrix_2.data"), 5000, 4096))
                .load(DataLoad::words(kernel(MM2, "input_fxp_matrix_3.data"), 10_000, 4096))
                .read(Readback::words(20_000, 4096))
                .golden(&golden(MM2));
            w.phase_two = true;
            w
        }
        "conv" if scalable => Workload::new(token)
            .load(DataLoad::bytes(kernel(CONV, "padded_input.txt"), 700, 36 * 36 * 3))
            .load(DataLoad::bytes(kernel(CONV, "weights.txt"), 21, 5 * 5 * 3 * 32))
            .read(Readback {
                packing: Packing::Bytes,
                ..Readback::words(1750, 32 * 32 * 32 / 4)
            })
            .golden(&format!("{CONV}/output.txt")),
        "conv" => Workload::new(token)
            .load(DataLoad::words(kernel(CONV, "padded_input.txt"), 3750, 36 * 36 * 3))
            .load(DataLoad::words(kernel(CONV, "weights.txt"), 21, 5 * 5 * 3 * 32))
            .read(Readback::words(11_000, 32 * 32 * 32))
            .golden(&format!("{CONV}/output.txt")),
        "relu" => Workload::new(token)
            .load(DataLoad::words(kernel(CONV, "output.txt"), 3750, RELU_SIZE))
            .read(Readback::words(21, RELU_SIZE)),
        "instTest" => {
            let mut w = Workload::new(token).read(Readback::words(101, 25));
            w.reference = Reference::Inline(INST_TEST_GOLDEN.to_vec());
            w
        }
        "resnet_conv1" => Workload::new(token)
            .load(DataLoad::words("kernel/image_pad/padded_output.txt", 11_250, 38 * 38 * 3))
            .load(DataLoad::words(
                "kernel/data/resnet18_prunned_weights50/conv1.weight_raw_fxp.txt",
                21,
                64 * 3 * 49,
            ))
            .read(Readback::words(23_500, 64 * 32 * 32)),
        "madd_8x8" if scalable => {
            let mut a = DataLoad::words(kernel(GEMM, "input_A.data"), 0, 512);
            a.start_line_stride = 512;
            let mut b = DataLoad::words(kernel(GEMM, "input_B.data"), 4096, 512);
            b.start_line_stride = 512;
            Workload::new(token).load(a).load(b).read(Readback {
                partition: Partition::Shared,
                ..Readback::words(8192, 4096)
            })
        }
        "gemm_local" if scalable => {
            let mut a = DataLoad::words(kernel(GEMM, "input_A1.data"), 131_072, 1024);
            a.placement = Placement::PeLocal;
            a.pe_count = Some(16);
            a.cluster_paths = (1..=4)
                .map(|i| kernel(GEMM, &format!("input_A{i}.data")))
                .collect();
            a.cluster_limit = Some(4);
            let mut b = DataLoad::words(kernel(GEMM, "input_B.data"), 5000, 4096);
            b.cluster_limit = Some(4);
            Workload::new(token).load(a).load(b)
        }
        _ => return None,
    };
    Some(w)
}

/// Custom workloads layered over the built-ins.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    custom: Vec<Workload>,
}

impl Catalog {
    /// A catalog with only the built-in workloads.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Adds workloads decoded from a JSON file holding one workload or an array.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::File`] if the file cannot be read or decoded.
    pub fn with_json_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            Many(Vec<Workload>),
            One(Box<Workload>),
        }

        let file_err = |reason: String| ConfigError::File {
            path: path.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|e| file_err(e.to_string()))?;

        match serde_json::from_str(&text).map_err(|e| file_err(e.to_string()))? {
            OneOrMany::Many(list) => self.custom.extend(list),
            OneOrMany::One(w) => self.custom.push(*w),
        }
        Ok(self)
    }

    /// Resolves `token`, preferring custom workloads.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownWorkload`] when nothing matches.
    pub fn lookup(&self, token: &str, variant: Variant) -> Result<Workload, ConfigError> {
        self.custom
            .iter()
            .find(|w| w.name == token)
            .cloned()
            .or_else(|| builtin(token, variant))
            .ok_or_else(|| ConfigError::UnknownWorkload {
                token: token.to_string(),
                variant,
            })
    }
}
