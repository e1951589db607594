//! Address Translator.
//!
//! Maps logical word indices to device byte addresses under three regimes:
//! 1. **Scratchpad:** `(base + i) * word_bytes`, bounded by the scratchpad capacity.
//! 2. **PE-local:** `(base + local + window * pe) * word_bytes`, one fixed window per PE.
//! 3. **Cluster:** scratchpad arithmetic behind a one-hot cluster enable mask.
//!
//! [`AddressMap::translate`] is the raw, unchecked mapping. Transfers go through
//! [`AddressMap::plan`], which rejects every out-of-range request up front so the
//! resulting [`TransferPlan`] can hand out addresses without failing.

use crate::common::addr::{DeviceAddr, WordIndex};
use crate::common::error::ConfigError;
use crate::config::DeviceConfig;

/// Logical memory region of a device address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// Shared scratchpad (TCDM).
    Scratchpad,
    /// Local memory window of one PE.
    PeLocal {
        /// PE index.
        pe: u32,
    },
    /// Scratchpad of one cluster, selected by its enable bit.
    Cluster {
        /// Cluster index.
        cluster: u32,
    },
}

/// Requested placement of a bulk transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Contiguous scratchpad words.
    Scratchpad,
    /// Folded evenly across the PE-local windows.
    PeLocal,
    /// PE-local when the base lies at or past the scratchpad boundary.
    #[default]
    Auto,
}

/// A bulk transfer request, in device words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSpec {
    /// First word offset.
    pub base_word: u32,
    /// Number of device words transferred.
    pub length: u32,
    /// Where the words land.
    pub placement: Placement,
    /// Cluster whose enable bit gates the transfer.
    pub cluster: Option<u32>,
    /// PEs a PE-local transfer folds across, overriding the device default.
    pub pe_count: Option<u32>,
}

impl TransferSpec {
    /// A transfer with automatic placement and no cluster gate.
    pub const fn new(base_word: u32, length: u32) -> Self {
        Self {
            base_word,
            length,
            placement: Placement::Auto,
            cluster: None,
            pe_count: None,
        }
    }

    /// Gates the transfer behind `cluster`'s enable bit.
    #[must_use]
    pub const fn in_cluster(mut self, cluster: u32) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Folds a PE-local transfer across `pe_count` PEs.
    #[must_use]
    pub const fn folded_across(mut self, pe_count: u32) -> Self {
        self.pe_count = Some(pe_count);
        self
    }

    /// Overrides the placement.
    #[must_use]
    pub const fn placed(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }
}

/// Device address arithmetic for one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressMap {
    word_bytes: u32,
    scratchpad_words: u32,
    pe_window_words: u32,
    pe_count: u32,
    clusters: u32,
}

impl AddressMap {
    /// Builds the map for a device configuration with a single cluster.
    pub const fn new(config: &DeviceConfig) -> Self {
        Self {
            word_bytes: config.word_bytes,
            scratchpad_words: config.scratchpad_words,
            pe_window_words: config.pe_window_words,
            pe_count: config.pe_count,
            clusters: 1,
        }
    }

    /// Sets the number of clusters reported by the device.
    #[must_use]
    pub const fn with_clusters(mut self, clusters: u32) -> Self {
        self.clusters = clusters;
        self
    }

    /// Clusters addressable through the enable mask.
    pub const fn clusters(&self) -> u32 {
        self.clusters
    }

    /// First word past the scratchpad.
    pub const fn scratchpad_boundary(&self) -> u32 {
        self.scratchpad_words
    }

    /// Unchecked mapping of `(region, base + index)` to a byte address.
    ///
    /// Callers must only request pairs inside the region; use [`Self::plan`]
    /// for anything derived from external input.
    pub const fn translate(&self, region: Region, base_word: u32, index: u32) -> DeviceAddr {
        let word = match region {
            Region::Scratchpad | Region::Cluster { .. } => base_word + index,
            Region::PeLocal { pe } => base_word + index + self.pe_window_words * pe,
        };
        WordIndex(word).to_byte_addr(self.word_bytes)
    }

    /// Validates a transfer and fixes its addressing.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] describing the first rule the request breaks:
    /// cluster out of range, scratchpad overflow, PE-local base below the
    /// boundary, uneven PE split, or a per-PE share that overflows its window.
    pub fn plan(&self, spec: TransferSpec) -> Result<TransferPlan, ConfigError> {
        let gate = match spec.cluster {
            Some(cluster) if cluster >= self.clusters => {
                return Err(ConfigError::ClusterOutOfRange {
                    cluster,
                    count: self.clusters,
                });
            }
            Some(cluster) => Some(1u8 << cluster),
            None => None,
        };

        let local = match spec.placement {
            Placement::Scratchpad => false,
            Placement::PeLocal => true,
            Placement::Auto => spec.base_word >= self.scratchpad_words,
        };

        let folding = if local {
            Some(self.fold(spec)?)
        } else {
            let end = u64::from(spec.base_word) + u64::from(spec.length);
            if end > u64::from(self.scratchpad_words) {
                return Err(ConfigError::ScratchpadOverflow {
                    base: spec.base_word,
                    length: spec.length,
                    capacity: self.scratchpad_words,
                });
            }
            None
        };

        Ok(TransferPlan {
            base_word: spec.base_word,
            length: spec.length,
            word_bytes: self.word_bytes,
            folding,
            cluster: spec.cluster,
            gate,
        })
    }

    fn fold(&self, spec: TransferSpec) -> Result<Folding, ConfigError> {
        if spec.base_word < self.scratchpad_words {
            return Err(ConfigError::LocalBelowBoundary {
                base: spec.base_word,
                boundary: self.scratchpad_words,
            });
        }
        let pe_count = spec.pe_count.unwrap_or(self.pe_count);
        if pe_count == 0 || pe_count > self.pe_count {
            return Err(ConfigError::Geometry(
                "PE-local fold count must be between 1 and the device PE count",
            ));
        }
        let per_pe = spec.length / pe_count;
        if per_pe == 0 || spec.length % pe_count != 0 {
            return Err(ConfigError::UnevenPeSplit {
                length: spec.length,
                pe_count,
            });
        }
        let offset = spec.base_word - self.scratchpad_words;
        if u64::from(offset) + u64::from(per_pe) > u64::from(self.pe_window_words) {
            return Err(ConfigError::PeWindowOverflow {
                offset,
                per_pe,
                window: self.pe_window_words,
            });
        }
        Ok(Folding {
            per_pe,
            stride: self.pe_window_words,
        })
    }
}

/// Explicit PE folding: index `i` goes to PE `i / per_pe` at local offset `i % per_pe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Folding {
    per_pe: u32,
    stride: u32,
}

/// A validated transfer whose every address is in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPlan {
    base_word: u32,
    length: u32,
    word_bytes: u32,
    folding: Option<Folding>,
    cluster: Option<u32>,
    gate: Option<u8>,
}

impl TransferPlan {
    /// Number of device words in the transfer.
    pub const fn len(&self) -> u32 {
        self.length
    }

    /// Whether the transfer moves no words.
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// One-hot cluster enable mask to hold for the transfer, if gated.
    pub const fn cluster_gate(&self) -> Option<u8> {
        self.gate
    }

    /// Region that word `index` lands in.
    pub const fn region(&self, index: u32) -> Region {
        match (self.folding, self.cluster) {
            (Some(f), _) => Region::PeLocal {
                pe: index / f.per_pe,
            },
            (None, Some(cluster)) => Region::Cluster { cluster },
            (None, None) => Region::Scratchpad,
        }
    }

    /// Byte address of word `index`; `index` must be below [`Self::len`].
    pub const fn address(&self, index: u32) -> DeviceAddr {
        let word = match self.folding {
            Some(f) => self.base_word + index % f.per_pe + f.stride * (index / f.per_pe),
            None => self.base_word + index,
        };
        WordIndex(word).to_byte_addr(self.word_bytes)
    }

    /// Byte addresses of the whole transfer in order.
    pub fn addresses(&self) -> impl Iterator<Item = DeviceAddr> + '_ {
        (0..self.length).map(|i| self.address(i))
    }
}
