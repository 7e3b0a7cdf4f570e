//! # Simulator Orchestrator
//!
//! Owns the event queue, the level hierarchy, the resource budget and the
//! metrics aggregator; advances virtual time, applies configuration changes
//! and answers point-in-time queries.
//!
//! The core is single-threaded: callers serialize all operations through one
//! exclusive critical section per instance (the boundary layer wraps the
//! simulator in a mutex). Nothing in here blocks, performs I/O or spawns
//! work; durations are arithmetic that decides *when* follow-on events are
//! scheduled.

use tracing::{debug, info, warn};

use lsmsim_core::config::SimConfig;
use lsmsim_core::error::{Error, Result};
use lsmsim_core::metrics::{Metrics, MetricsSnapshot};
use lsmsim_core::types::{us_to_secs_f64, LogEvent, LogKind, SimState, SimTime, MB};

use crate::levels::{compaction_candidate, effective_reduction, FileMeta, Level, Memtable};
use crate::queue::{Event, EventKind, EventQueue};
use crate::resources::{compaction_cost, flush_cost, ResourceBudget};

/// Cadence of the recurring client-write generation event.
const WRITE_INTERVAL_US: SimTime = 100_000;

/// Result of one `step` or `run_until` call: where the clock landed, how many
/// events were processed, and the notifications they produced.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub now: SimTime,
    pub processed: usize,
    pub logs: Vec<LogEvent>,
}

/// The aggregate root of the simulation.
pub struct Simulator {
    config: SimConfig,
    queue: EventQueue,
    budget: ResourceBudget,
    levels: Vec<Level>,
    memtable: Memtable,
    metrics: Metrics,
    now: SimTime,
    stalled: bool,
    oom_killed: bool,
    /// Latched description of an internal invariant violation. Once set,
    /// `step` keeps returning the fault until `reset`.
    fault: Option<String>,
    next_file_id: u64,
}

impl Simulator {
    /// Creates a simulator in its initial, not-yet-run state.
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let num_levels = config.compaction.num_levels;
        Ok(Self {
            budget: ResourceBudget::new(config.compaction.max_background_jobs),
            levels: (0..num_levels).map(Level::new).collect(),
            memtable: Memtable::new(),
            metrics: Metrics::new(num_levels as usize),
            queue: EventQueue::new(),
            config,
            now: 0,
            stalled: false,
            oom_killed: false,
            fault: None,
            next_file_id: 1,
        })
    }

    /// Clears all mutable state and returns the simulator to its initial
    /// state. Atomic with respect to in-flight events: the queue and all
    /// resource-busy timestamps are discarded together with level and metric
    /// state, so no stale event can be processed afterward.
    ///
    /// Fails only if the current configuration is itself invalid.
    pub fn reset(&mut self) -> Result<()> {
        self.config.validate()?;
        let num_levels = self.config.compaction.num_levels;
        self.queue.clear();
        self.budget.reset(self.config.compaction.max_background_jobs);
        self.levels = (0..num_levels).map(Level::new).collect();
        self.memtable.reset();
        self.metrics = Metrics::new(num_levels as usize);
        self.now = 0;
        self.stalled = false;
        self.oom_killed = false;
        self.fault = None;
        self.next_file_id = 1;
        info!("simulator reset");
        Ok(())
    }

    /// Advances virtual time to the next due event and processes every event
    /// due at that timestamp in `(timestamp, sequence)` order.
    ///
    /// A no-op once OOM-killed; returns the latched fault if one occurred.
    pub fn step(&mut self) -> Result<StepReport> {
        if let Some(message) = &self.fault {
            return Err(Error::fault(message.clone()));
        }
        let mut logs = Vec::new();
        if self.oom_killed {
            return Ok(StepReport { now: self.now, processed: 0, logs });
        }
        self.seed_if_fresh();

        let mut processed = 0;
        if let Some(due) = self.queue.next_time() {
            self.now = self.now.max(due);
            processed = self.drain_due(due, &mut logs)?;
        }
        Ok(StepReport { now: self.now, processed, logs })
    }

    /// Processes all events due at or before `target` and lands the clock on
    /// `target`. This is the tick-boundary form of `step` used by cadence
    /// drivers.
    pub fn run_until(&mut self, target: SimTime) -> Result<StepReport> {
        if let Some(message) = &self.fault {
            return Err(Error::fault(message.clone()));
        }
        let mut logs = Vec::new();
        if self.oom_killed {
            return Ok(StepReport { now: self.now, processed: 0, logs });
        }
        self.seed_if_fresh();

        let mut processed = 0;
        while let Some(due) = self.queue.next_time() {
            if due > target || self.oom_killed {
                break;
            }
            self.now = self.now.max(due);
            processed += self.drain_due(due, &mut logs)?;
        }
        if !self.oom_killed {
            self.now = self.now.max(target);
        }
        Ok(StepReport { now: self.now, processed, logs })
    }

    /// Validates and applies a new configuration.
    ///
    /// Before the first step (virtual time zero) any change is allowed and
    /// re-initializes the simulator. Once time has advanced only the write
    /// rate may change; structural changes fail with no partial mutation.
    pub fn update_config(&mut self, new: SimConfig) -> Result<()> {
        new.validate()?;
        if self.now == 0 {
            self.config = new;
            return self.reset();
        }
        if !new.is_hot_swappable_from(&self.config) {
            return Err(Error::validation(
                "only write_rate_mbps may change while the simulation is running",
            ));
        }
        info!(
            old = self.config.write_rate_mbps,
            new = new.write_rate_mbps,
            "write rate updated"
        );
        self.config.write_rate_mbps = new.write_rate_mbps;
        Ok(())
    }

    /// Read-only metrics snapshot with derived statistics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.now, self.read_amp())
    }

    /// Read-only snapshot of memtable, stall/OOM flags and the level
    /// hierarchy.
    pub fn state(&self) -> SimState {
        let ratio = self.config.compression_profile().ratio;
        let logical: u64 = self.levels.iter().map(|l| l.total_bytes()).sum();
        SimState {
            now_us: self.now,
            memtable_bytes: self.memtable.active_bytes(),
            pending_buffers: self.memtable.sealed_count(),
            is_stalled: self.stalled,
            is_oom_killed: self.oom_killed,
            disk_used_bytes: (logical as f64 / ratio).round() as u64,
            levels: self.levels.iter().map(|l| l.snapshot(self.now)).collect(),
        }
    }

    /// Clears only the since-last-reset metrics window.
    pub fn reset_metrics_window(&mut self) {
        self.metrics.reset_window(self.now);
    }

    /// True until the first step after creation or reset; lets the caller
    /// distinguish "never started" from "paused".
    pub fn is_queue_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    pub fn is_oom_killed(&self) -> bool {
        self.oom_killed
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Event processing
    // ------------------------------------------------------------------

    /// Seeds the recurring write-generation event on the first advance after
    /// creation or reset. Kept out of `reset` so a freshly reset simulator
    /// reports an empty queue.
    fn seed_if_fresh(&mut self) {
        if self.now == 0 && self.queue.is_empty() {
            self.queue.push(WRITE_INTERVAL_US, EventKind::Write);
        }
    }

    /// Processes every queued event due exactly at `due`.
    fn drain_due(&mut self, due: SimTime, logs: &mut Vec<LogEvent>) -> Result<usize> {
        let mut processed = 0;
        while self.queue.next_time() == Some(due) {
            let Some(event) = self.queue.pop() else { break };
            if let Err(err) = self.process_event(event, logs) {
                if let Error::Fault { message } = &err {
                    self.fault = Some(message.clone());
                }
                return Err(err);
            }
            processed += 1;
            if self.oom_killed {
                break;
            }
        }
        Ok(processed)
    }

    fn process_event(&mut self, event: Event, logs: &mut Vec<LogEvent>) -> Result<()> {
        debug!(at = event.at, seq = event.seq, kind = ?event.kind, "processing event");
        match event.kind {
            EventKind::Write => self.on_write(logs),
            EventKind::Flush { buffer_bytes } => self.on_flush(buffer_bytes, logs),
            EventKind::Compaction { source_level, input_files, input_bytes, output_bytes } => {
                self.on_compaction(source_level, input_files, input_bytes, output_bytes, logs)
            }
        }
    }

    /// Bytes one write tick deposits at the current rate.
    fn bytes_per_tick(&self) -> u64 {
        let secs = WRITE_INTERVAL_US as f64 / 1_000_000.0;
        (self.config.write_rate_mbps * secs * MB as f64).round() as u64
    }

    fn on_write(&mut self, logs: &mut Vec<LogEvent>) -> Result<()> {
        let bytes = self.bytes_per_tick();
        self.memtable.deposit(bytes, self.now);
        self.metrics.record_ingest(bytes);

        // Client pressure the engine cannot absorb accumulates in the active
        // buffer; crossing the ceiling is fatal, unlike a stall.
        if self.memtable.buffered_bytes() > self.config.memory_ceiling_bytes() {
            self.oom_killed = true;
            warn!(
                buffered = self.memtable.buffered_bytes(),
                ceiling = self.config.memory_ceiling_bytes(),
                "memory ceiling exceeded, simulated process OOM-killed"
            );
            logs.push(LogEvent::new(
                self.now,
                LogKind::OomKilled,
                format!(
                    "OOM: {} MB buffered exceeds {} MB ceiling",
                    self.memtable.buffered_bytes() / MB,
                    self.config.memory_ceiling_bytes() / MB
                ),
            ));
            return Ok(());
        }

        self.maybe_seal(logs);
        self.queue.push(self.now + WRITE_INTERVAL_US, EventKind::Write);
        Ok(())
    }

    /// Seals the active buffer and schedules its flush if a trigger fired and
    /// a buffer slot is free; otherwise raises the stall flag.
    fn maybe_seal(&mut self, logs: &mut Vec<LogEvent>) {
        if !self.memtable.wants_seal(&self.config, self.now) {
            return;
        }
        if self.memtable.can_seal(&self.config) {
            let buffer_bytes = self.memtable.seal();
            let cost = flush_cost(&self.config, buffer_bytes);
            let completion = self.budget.admit(self.now, cost);
            self.metrics.record_disk_busy(cost.io_us());
            self.queue.push(completion, EventKind::Flush { buffer_bytes });
            debug_assert_eq!(self.queue.pending_flushes(), self.memtable.sealed_count() as usize);
            debug!(
                bytes = buffer_bytes,
                completion_s = us_to_secs_f64(completion),
                "memtable sealed, flush scheduled"
            );
        } else if !self.stalled {
            self.stalled = true;
            self.metrics.record_stall();
            warn!(
                pending = self.memtable.sealed_count(),
                "write buffers exhausted, stalling writes"
            );
            logs.push(LogEvent::new(
                self.now,
                LogKind::Stall,
                format!("write stall: {} buffers pending flush", self.memtable.sealed_count()),
            ));
        }
    }

    fn on_flush(&mut self, buffer_bytes: u64, logs: &mut Vec<LogEvent>) -> Result<()> {
        self.memtable
            .flush_done(buffer_bytes)
            .ok_or_else(|| Error::fault("flush completion without a matching sealed buffer"))?;

        let file = FileMeta { id: self.next_file_id, size_bytes: buffer_bytes, created_at: self.now };
        self.next_file_id += 1;
        self.level_mut(0)?.add_file(file);
        self.metrics.record_flush(buffer_bytes);

        info!(bytes = buffer_bytes, l0_files = self.levels[0].file_count(), "flush complete");
        logs.push(LogEvent::new(
            self.now,
            LogKind::Flush,
            format!("flushed {} MB to L0", buffer_bytes / MB),
        ));

        if self.stalled {
            self.stalled = false;
            logs.push(LogEvent::new(self.now, LogKind::Resume, "write stall cleared"));
        }
        // The freed slot may immediately absorb an overfull active buffer.
        self.maybe_seal(logs);
        self.maybe_schedule_compactions();
        Ok(())
    }

    fn on_compaction(
        &mut self,
        source_level: u32,
        input_files: Vec<u64>,
        input_bytes: u64,
        output_bytes: u64,
        logs: &mut Vec<LogEvent>,
    ) -> Result<()> {
        let source = self.level_mut(source_level)?;
        let removed = source
            .remove_files(&input_files)
            .ok_or_else(|| Error::fault("compaction consumed files missing from source level"))?;
        source.set_compacting(false);
        if removed != input_bytes {
            return Err(Error::fault(format!(
                "compaction byte mismatch at L{source_level}: removed {removed}, expected {input_bytes}"
            )));
        }

        // Outputs land as files near the target size.
        let target_size = self.config.compaction.target_file_size_mb * MB;
        let count = output_bytes.div_ceil(target_size).max(1);
        let base = output_bytes / count;
        let remainder = output_bytes % count;
        for i in 0..count {
            let size_bytes = base + if i < remainder { 1 } else { 0 };
            let file = FileMeta { id: self.next_file_id, size_bytes, created_at: self.now };
            self.next_file_id += 1;
            self.level_mut(source_level + 1)?.add_file(file);
        }

        self.metrics.record_compaction(source_level as usize, input_bytes, output_bytes);
        self.budget.release_job();

        info!(
            source = source_level,
            input_mb = input_bytes / MB,
            output_mb = output_bytes / MB,
            "compaction complete"
        );
        logs.push(LogEvent::new(
            self.now,
            LogKind::Compaction,
            format!(
                "compacted {} MB from L{} into {} MB at L{}",
                input_bytes / MB,
                source_level,
                output_bytes / MB,
                source_level + 1
            ),
        ));

        // The freed slot may admit the next pending trigger, on this level or
        // the one the output just grew.
        self.maybe_schedule_compactions();
        Ok(())
    }

    /// Schedules compactions for every triggered level while job slots last.
    /// If no slot is free the trigger condition simply persists and is
    /// re-evaluated when a slot frees, so brief L0 spikes above the trigger
    /// are absorbed without stalling.
    fn maybe_schedule_compactions(&mut self) {
        while let Some(index) = compaction_candidate(&self.levels, &self.config) {
            if !self.budget.try_acquire_job() {
                debug!(level = index, "compaction trigger pending, no job slot free");
                break;
            }
            let (input_files, input_bytes) = if index == 0 {
                self.levels[index as usize].all_file_ids()
            } else {
                self.levels[index as usize].files_over_budget(self.config.level_target_bytes(index))
            };
            if input_files.is_empty() {
                self.budget.release_job();
                break;
            }

            let reduction = effective_reduction(self.config.compaction.reduction_factor, index);
            let output_bytes = (input_bytes as f64 * reduction).round() as u64;
            let cost = compaction_cost(&self.config, input_bytes, output_bytes, input_files.len());
            let completion = self.budget.admit(self.now, cost);
            self.metrics.record_disk_busy(cost.io_us());

            self.levels[index as usize].set_compacting(true);
            debug!(
                source = index,
                input_mb = input_bytes / MB,
                files = input_files.len(),
                completion_s = us_to_secs_f64(completion),
                "compaction scheduled"
            );
            self.queue.push(
                completion,
                EventKind::Compaction { source_level: index, input_files, input_bytes, output_bytes },
            );
        }
    }

    fn level_mut(&mut self, index: u32) -> Result<&mut Level> {
        self.levels
            .get_mut(index as usize)
            .ok_or_else(|| Error::fault(format!("level L{index} out of range")))
    }

    /// Sorted runs a point read must consult: every L0 file overlaps, deeper
    /// levels contribute one run each when non-empty.
    fn read_amp(&self) -> f64 {
        let l0 = self.levels.first().map(|l| l.file_count()).unwrap_or(0);
        let deeper = self.levels.iter().skip(1).filter(|l| l.file_count() > 0).count();
        (l0 + deeper) as f64
    }
}
