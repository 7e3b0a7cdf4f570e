//! # Resource Contention Model
//!
//! Computes how long flushes and compactions take on shared hardware, and
//! serializes them onto one logical disk track and one logical CPU track.
//!
//! Per-operation duration follows the pipeline
//! `seek + readIO + decompress + compress + writeIO`, where each I/O term is
//! `bytes / io_throughput_mbps` and each compute term is
//! `bytes / profile_mbps`. Operations do not overlap on a track: an
//! operation's effective start on a track is `max(requested, busy_until)` and
//! the track's busy-until advances by the charged time. Background-job slots
//! gate *admission* of compactions only; they are not the resource itself.

use lsmsim_core::config::SimConfig;
use lsmsim_core::types::{secs_f64_to_us, SimTime, MB};

/// Time an operation will occupy each shared track, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperationCost {
    pub io_secs: f64,
    pub cpu_secs: f64,
}

impl OperationCost {
    pub fn io_us(&self) -> SimTime {
        secs_f64_to_us(self.io_secs)
    }
}

/// Cost of flushing a sealed memtable buffer into a new L0 file.
///
/// Memtables are not compressed, so there is no read/decompress pass; the
/// buffer is compressed once and written sequentially with a single seek.
pub fn flush_cost(config: &SimConfig, buffer_bytes: u64) -> OperationCost {
    let profile = config.compression_profile();
    let logical_mb = buffer_bytes as f64 / MB as f64;
    let physical_mb = logical_mb / profile.ratio;

    let io_secs =
        config.hardware.io_latency_ms / 1_000.0 + physical_mb / config.hardware.io_throughput_mbps;
    let cpu_secs = logical_mb / profile.compress_mbps;

    OperationCost { io_secs, cpu_secs }
}

/// Cost of compacting `input_bytes` (spread over `input_files` files) into
/// `output_bytes` at the next level: read + decompress the inputs, compress +
/// write the outputs, one seek per pass.
///
/// Subcompactions split the merge into parallel ranges, shortening the CPU
/// work up to the number of input files; the sequential disk passes are not
/// helped.
pub fn compaction_cost(
    config: &SimConfig,
    input_bytes: u64,
    output_bytes: u64,
    input_files: usize,
) -> OperationCost {
    let profile = config.compression_profile();
    let input_mb = input_bytes as f64 / MB as f64;
    let output_mb = output_bytes as f64 / MB as f64;

    let read_secs = input_mb / profile.ratio / config.hardware.io_throughput_mbps;
    let write_secs = output_mb / profile.ratio / config.hardware.io_throughput_mbps;
    let seek_secs = 2.0 * config.hardware.io_latency_ms / 1_000.0;

    let parallelism = config.compaction.max_subcompactions.min(input_files.max(1) as u32).max(1);
    let cpu_secs =
        (input_mb / profile.decompress_mbps + output_mb / profile.compress_mbps) / parallelism as f64;

    OperationCost { io_secs: seek_secs + read_secs + write_secs, cpu_secs }
}

/// Shared-hardware bookkeeping: busy-until timestamps for the disk and CPU
/// tracks plus the bounded background-job slots.
#[derive(Debug, Clone)]
pub struct ResourceBudget {
    disk_busy_until: SimTime,
    cpu_busy_until: SimTime,
    active_jobs: u32,
    max_jobs: u32,
}

impl ResourceBudget {
    pub fn new(max_jobs: u32) -> Self {
        Self { disk_busy_until: 0, cpu_busy_until: 0, active_jobs: 0, max_jobs }
    }

    /// Charges an operation to both tracks and returns its completion time.
    ///
    /// Each track starts at `max(now, busy_until)` and advances by the
    /// charged time; the operation completes when the later track does.
    pub fn admit(&mut self, now: SimTime, cost: OperationCost) -> SimTime {
        let disk_start = self.disk_busy_until.max(now);
        self.disk_busy_until = disk_start + secs_f64_to_us(cost.io_secs);

        let cpu_start = self.cpu_busy_until.max(now);
        self.cpu_busy_until = cpu_start + secs_f64_to_us(cost.cpu_secs);

        // Durationless at processing time: the completion event carries all
        // the state mutation, so nothing blocks in between.
        self.disk_busy_until.max(self.cpu_busy_until).max(now + 1)
    }

    /// Attempts to occupy a background-job slot.
    pub fn try_acquire_job(&mut self) -> bool {
        if self.active_jobs < self.max_jobs {
            self.active_jobs += 1;
            true
        } else {
            false
        }
    }

    /// Frees a background-job slot.
    pub fn release_job(&mut self) {
        debug_assert!(self.active_jobs > 0, "job slot underflow");
        self.active_jobs = self.active_jobs.saturating_sub(1);
    }

    pub fn active_jobs(&self) -> u32 {
        self.active_jobs
    }

    pub fn max_jobs(&self) -> u32 {
        self.max_jobs
    }

    pub fn disk_busy_until(&self) -> SimTime {
        self.disk_busy_until
    }

    pub fn cpu_busy_until(&self) -> SimTime {
        self.cpu_busy_until
    }

    /// Discards all busy state. Part of the simulator's atomic `Reset`.
    pub fn reset(&mut self, max_jobs: u32) {
        *self = Self::new(max_jobs);
    }
}
