//! # Core Types
//!
//! Virtual time, state snapshots and log events shared between the engine
//! and its callers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Virtual time in microseconds since simulation start.
///
/// Time is advanced only by event processing and never decreases. Microsecond
/// resolution keeps ordering exact (no float comparisons in the event queue)
/// while leaving plenty of headroom for multi-day simulated runs.
pub type SimTime = u64;

/// One mebibyte, the unit most configuration fields are expressed in.
pub const MB: u64 = 1024 * 1024;

/// Converts whole seconds to virtual-time microseconds.
#[inline]
pub const fn secs_to_us(secs: u64) -> SimTime {
    secs * 1_000_000
}

/// Converts fractional seconds to virtual-time microseconds, rounding.
#[inline]
pub fn secs_f64_to_us(secs: f64) -> SimTime {
    (secs * 1_000_000.0).round() as SimTime
}

/// Converts virtual time to fractional seconds.
#[inline]
pub fn us_to_secs_f64(us: SimTime) -> f64 {
    us as f64 / 1_000_000.0
}

/// Point-in-time view of a single file within a level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub id: u64,
    pub size_bytes: u64,
    pub age_secs: f64,
}

/// Point-in-time view of one level of the hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub index: u32,
    pub file_count: usize,
    pub total_bytes: u64,
    pub is_compacting: bool,
    pub files: Vec<FileSnapshot>,
}

/// Full read-only snapshot of simulator state, safe to hand to a renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimState {
    /// Current virtual time in microseconds.
    pub now_us: SimTime,
    /// Bytes buffered in the active memtable.
    pub memtable_bytes: u64,
    /// Sealed buffers awaiting flush completion.
    pub pending_buffers: u32,
    /// Write backpressure is active (recoverable).
    pub is_stalled: bool,
    /// Terminal out-of-memory state (only `Reset` recovers).
    pub is_oom_killed: bool,
    /// Estimated physical bytes on disk, after the compression ratio.
    pub disk_used_bytes: u64,
    pub levels: Vec<LevelSnapshot>,
}

/// Category of a simulator log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogKind {
    Flush,
    Compaction,
    Stall,
    Resume,
    OomKilled,
}

/// A human-readable notification emitted by the engine during a step.
///
/// These are carried out of the core on the step report and forwarded through
/// a bounded channel at the boundary; the core never blocks on a consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub at_us: SimTime,
    pub kind: LogKind,
    pub message: String,
}

impl LogEvent {
    pub fn new(at_us: SimTime, kind: LogKind, message: impl Into<String>) -> Self {
        Self { at_us, kind, message: message.into() }
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>10.3}s] {:?}: {}", us_to_secs_f64(self.at_us), self.kind, self.message)
    }
}
