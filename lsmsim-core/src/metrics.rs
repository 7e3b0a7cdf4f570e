//! # Metrics
//!
//! Byte and event accounting for the simulation.
//!
//! Two disjoint counter sets are updated in lockstep by every mutating event:
//! a lifetime set that only `Reset` clears, and a window set cleared by
//! `reset_window` and used for instantaneous-rate display. Lifetime values
//! are never derived by subtraction from a resettable counter.
//!
//! Derived statistics (write amplification, throughput, disk utilization) are
//! recomputed on every snapshot from the raw counters, never stored as
//! independently mutated state, so they cannot drift.

use serde::{Deserialize, Serialize};

use crate::types::{us_to_secs_f64, SimTime, MB};

/// Raw counters for one accounting window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterSet {
    /// Client bytes deposited into the memtable.
    pub user_bytes: u64,
    /// Logical bytes written into each level (flushes land in index 0).
    pub bytes_written: Vec<u64>,
    /// Logical bytes read out of each level by compactions.
    pub bytes_read: Vec<u64>,
    pub flush_count: u64,
    pub compaction_count: u64,
    /// Transitions into the stalled state.
    pub stall_count: u64,
    /// Accumulated disk-busy time in microseconds.
    pub disk_busy_us: u64,
    /// Virtual time this window started at.
    pub started_at_us: SimTime,
}

impl CounterSet {
    fn new(num_levels: usize, started_at_us: SimTime) -> Self {
        Self {
            user_bytes: 0,
            bytes_written: vec![0; num_levels],
            bytes_read: vec![0; num_levels],
            flush_count: 0,
            compaction_count: 0,
            stall_count: 0,
            disk_busy_us: 0,
            started_at_us,
        }
    }

    pub fn total_bytes_written(&self) -> u64 {
        self.bytes_written.iter().sum()
    }

    pub fn total_bytes_read(&self) -> u64 {
        self.bytes_read.iter().sum()
    }
}

/// Metrics aggregator owned by the simulator.
#[derive(Debug, Clone)]
pub struct Metrics {
    lifetime: CounterSet,
    window: CounterSet,
    num_levels: usize,
}

impl Metrics {
    pub fn new(num_levels: usize) -> Self {
        Self {
            lifetime: CounterSet::new(num_levels, 0),
            window: CounterSet::new(num_levels, 0),
            num_levels,
        }
    }

    /// Record client bytes arriving in the memtable.
    pub fn record_ingest(&mut self, bytes: u64) {
        self.lifetime.user_bytes += bytes;
        self.window.user_bytes += bytes;
    }

    /// Record a completed flush of `bytes` into level 0.
    pub fn record_flush(&mut self, bytes: u64) {
        for set in [&mut self.lifetime, &mut self.window] {
            set.bytes_written[0] += bytes;
            set.flush_count += 1;
        }
    }

    /// Record a completed compaction from `source_level` into the next level.
    pub fn record_compaction(&mut self, source_level: usize, input_bytes: u64, output_bytes: u64) {
        debug_assert!(source_level + 1 < self.num_levels);
        for set in [&mut self.lifetime, &mut self.window] {
            set.bytes_read[source_level] += input_bytes;
            set.bytes_written[source_level + 1] += output_bytes;
            set.compaction_count += 1;
        }
    }

    /// Record a transition into the stalled state.
    pub fn record_stall(&mut self) {
        self.lifetime.stall_count += 1;
        self.window.stall_count += 1;
    }

    /// Record time the logical disk spent busy.
    pub fn record_disk_busy(&mut self, us: u64) {
        self.lifetime.disk_busy_us += us;
        self.window.disk_busy_us += us;
    }

    /// Clears only the window set; lifetime counters are untouched.
    pub fn reset_window(&mut self, now_us: SimTime) {
        self.window = CounterSet::new(self.num_levels, now_us);
    }

    pub fn lifetime(&self) -> &CounterSet {
        &self.lifetime
    }

    pub fn window(&self) -> &CounterSet {
        &self.window
    }

    /// Derive a snapshot at virtual time `now_us`.
    ///
    /// `read_amp` is an estimate supplied by the caller from live level state
    /// (L0 file count plus non-empty deeper levels), since the aggregator
    /// deliberately holds no level state of its own.
    pub fn snapshot(&self, now_us: SimTime, read_amp: f64) -> MetricsSnapshot {
        let total_written = self.lifetime.total_bytes_written();
        let flushed = self.lifetime.bytes_written[0];
        // Amplification relative to user bytes that have reached disk; every
        // flushed byte is written exactly once, so this is 1.0 until the
        // first compaction and >= 1.0 after.
        let write_amp = if flushed == 0 { 1.0 } else { total_written as f64 / flushed as f64 };

        let window_secs = us_to_secs_f64(now_us.saturating_sub(self.window.started_at_us));
        let (throughput_mbps, disk_utilization) = if window_secs > 0.0 {
            let tp = self.window.user_bytes as f64 / MB as f64 / window_secs;
            let util =
                (us_to_secs_f64(self.window.disk_busy_us) / window_secs).clamp(0.0, 1.0);
            (tp, util)
        } else {
            (0.0, 0.0)
        };

        MetricsSnapshot {
            now_us,
            write_amp,
            read_amp,
            throughput_mbps,
            disk_utilization,
            lifetime: self.lifetime.clone(),
            window: self.window.clone(),
        }
    }
}

/// Derived statistics plus the raw counters they were computed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub now_us: SimTime,
    /// Total bytes written to all levels / user bytes flushed. Always >= 1.
    pub write_amp: f64,
    /// Estimated sorted runs a point read must consult.
    pub read_amp: f64,
    /// Window ingest throughput in MB/s.
    pub throughput_mbps: f64,
    /// Fraction of the window the logical disk was busy, in [0, 1].
    pub disk_utilization: f64,
    pub lifetime: CounterSet,
    pub window: CounterSet,
}
