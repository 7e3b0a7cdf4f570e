//! # Configuration Management
//!
//! All simulator tunables, grouped the way the model consumes them: write
//! path, compaction, hardware profile, compression profile.
//!
//! A configuration is immutable once handed to the simulator except through
//! `UpdateConfig`, and only `write_rate_mbps` may change after the simulation
//! has advanced: structural fields would retroactively invalidate events
//! already sitting in the queue.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::MB;

/// Main simulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Client ingest rate in MB/s. The only field mutable while running.
    pub write_rate_mbps: f64,
    pub memtable: MemtableConfig,
    pub compaction: CompactionConfig,
    pub hardware: HardwareConfig,
    pub compression: CompressionKind,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            write_rate_mbps: 20.0,
            memtable: MemtableConfig::default(),
            compaction: CompactionConfig::default(),
            hardware: HardwareConfig::default(),
            compression: CompressionKind::Snappy,
        }
    }
}

/// Write buffer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemtableConfig {
    /// Buffer size that triggers a size-based flush, in MB.
    pub flush_size_mb: u64,
    /// Total write buffers (active + sealed) allowed before a write stall.
    pub max_write_buffer_number: u32,
    /// Time-based flush trigger in seconds; 0 disables it.
    pub flush_timeout_sec: u64,
}

impl Default for MemtableConfig {
    fn default() -> Self {
        Self {
            flush_size_mb: 64,
            max_write_buffer_number: 2,
            flush_timeout_sec: 0,
        }
    }
}

/// Compaction and level-hierarchy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// L0 file count that triggers an L0 -> L1 compaction.
    pub l0_compaction_trigger: u32,
    /// Byte budget of L1 in MB; deeper levels multiply by `level_multiplier`.
    pub max_bytes_for_level_base_mb: u64,
    pub level_multiplier: f64,
    /// Target output file size for compactions, in MB.
    pub target_file_size_mb: u64,
    /// Fraction of input bytes surviving an L0 -> L1 compaction. Deeper
    /// levels converge toward 1.0 (old data holds fewer live duplicates).
    pub reduction_factor: f64,
    /// Concurrent background compaction slots.
    pub max_background_jobs: u32,
    /// Parallel sub-splits of one compaction. Shortens its CPU work; never
    /// consumes extra job slots.
    pub max_subcompactions: u32,
    /// Depth of the level hierarchy, L0 included.
    pub num_levels: u32,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            l0_compaction_trigger: 4,
            max_bytes_for_level_base_mb: 256,
            level_multiplier: 10.0,
            target_file_size_mb: 64,
            reduction_factor: 0.85,
            max_background_jobs: 2,
            max_subcompactions: 1,
            num_levels: 7,
        }
    }
}

/// Hardware I/O profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Fixed per-operation seek/latency cost in milliseconds.
    pub io_latency_ms: f64,
    /// Sequential throughput of the single logical disk, in MB/s.
    pub io_throughput_mbps: f64,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        // Mid-range NVMe-ish defaults
        Self { io_latency_ms: 0.1, io_throughput_mbps: 500.0 }
    }
}

/// Compression algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    None,
    Lz4,
    Snappy,
    Zstd,
}

/// Performance profile of a compression algorithm.
///
/// Selection is a pure function of configuration; the profile affects event
/// durations and physical (on-disk) sizes, never the logical byte accounting
/// used for amplification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionProfile {
    pub kind: CompressionKind,
    /// logical bytes / physical bytes
    pub ratio: f64,
    pub compress_mbps: f64,
    pub decompress_mbps: f64,
    pub block_kb: u32,
}

impl CompressionProfile {
    /// Looks up the profile for an algorithm. Throughput and ratio figures
    /// are single-core ballparks for mixed key-value workloads.
    pub fn for_kind(kind: CompressionKind) -> Self {
        match kind {
            CompressionKind::None => Self {
                kind,
                ratio: 1.0,
                compress_mbps: 10_000.0,
                decompress_mbps: 10_000.0,
                block_kb: 64,
            },
            CompressionKind::Lz4 => Self {
                kind,
                ratio: 2.1,
                compress_mbps: 780.0,
                decompress_mbps: 4_970.0,
                block_kb: 64,
            },
            CompressionKind::Snappy => Self {
                kind,
                ratio: 2.0,
                compress_mbps: 560.0,
                decompress_mbps: 1_800.0,
                block_kb: 64,
            },
            CompressionKind::Zstd => Self {
                kind,
                ratio: 2.9,
                compress_mbps: 510.0,
                decompress_mbps: 1_550.0,
                block_kb: 64,
            },
        }
    }
}

impl SimConfig {
    /// Resolved compression profile for this configuration.
    pub fn compression_profile(&self) -> CompressionProfile {
        CompressionProfile::for_kind(self.compression)
    }

    /// Memory ceiling above which the model transitions to the terminal
    /// OOM-killed state: the configured buffer budget plus a 50% overhead
    /// margin for allocator slack and in-flight metadata.
    pub fn memory_ceiling_bytes(&self) -> u64 {
        let budget =
            self.memtable.max_write_buffer_number as u64 * self.memtable.flush_size_mb * MB;
        budget.saturating_mul(3) / 2
    }

    /// Byte budget of a level >= 1: `base * multiplier^(level-1)`.
    pub fn level_target_bytes(&self, level: u32) -> u64 {
        debug_assert!(level >= 1);
        let base = self.compaction.max_bytes_for_level_base_mb as f64 * MB as f64;
        (base * self.compaction.level_multiplier.powi(level as i32 - 1)).round() as u64
    }

    /// Validates all fields against hard bounds.
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, v: f64) -> Result<()> {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(Error::validation(format!("{name} must be positive, got {v}")))
            }
        }

        positive("write_rate_mbps", self.write_rate_mbps)?;
        positive("io_latency_ms", self.hardware.io_latency_ms)?;
        positive("io_throughput_mbps", self.hardware.io_throughput_mbps)?;

        if self.memtable.flush_size_mb == 0 {
            return Err(Error::validation("memtable.flush_size_mb must be positive"));
        }
        if self.memtable.max_write_buffer_number < 2 {
            return Err(Error::validation(
                "memtable.max_write_buffer_number must be at least 2 (one active, one flushing)",
            ));
        }

        let c = &self.compaction;
        if c.l0_compaction_trigger == 0 {
            return Err(Error::validation("compaction.l0_compaction_trigger must be positive"));
        }
        if c.max_bytes_for_level_base_mb == 0 {
            return Err(Error::validation(
                "compaction.max_bytes_for_level_base_mb must be positive",
            ));
        }
        if !(c.level_multiplier > 1.0 && c.level_multiplier.is_finite()) {
            return Err(Error::validation(format!(
                "compaction.level_multiplier must exceed 1.0, got {}",
                c.level_multiplier
            )));
        }
        if c.target_file_size_mb == 0 {
            return Err(Error::validation("compaction.target_file_size_mb must be positive"));
        }
        if !(c.reduction_factor > 0.0 && c.reduction_factor <= 1.0) {
            return Err(Error::validation(format!(
                "compaction.reduction_factor must be in (0, 1], got {}",
                c.reduction_factor
            )));
        }
        if c.max_background_jobs == 0 {
            return Err(Error::validation("compaction.max_background_jobs must be positive"));
        }
        if c.max_subcompactions == 0 {
            return Err(Error::validation("compaction.max_subcompactions must be positive"));
        }
        if !(2..=10).contains(&c.num_levels) {
            return Err(Error::validation(format!(
                "compaction.num_levels must be within 2..=10, got {}",
                c.num_levels
            )));
        }

        let p = self.compression_profile();
        debug_assert!(p.ratio >= 1.0 && p.compress_mbps > 0.0 && p.decompress_mbps > 0.0);

        Ok(())
    }

    /// True when `self` differs from `old` only in hot-swappable fields.
    /// Everything except the write rate is structural.
    pub fn is_hot_swappable_from(&self, old: &SimConfig) -> bool {
        let mut normalized = self.clone();
        normalized.write_rate_mbps = old.write_rate_mbps;
        normalized == *old
    }
}
