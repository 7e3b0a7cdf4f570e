//! # Level State Machine
//!
//! Per-level bookkeeping (files, byte totals, outstanding-compaction state)
//! plus the memtable the write path fills.
//!
//! Level 0 is special: its files overlap in key range, so its *file count*
//! governs compaction triggering. Levels >= 1 are treated as consolidated
//! runs and trigger on their byte budget
//! `max_bytes_for_level_base_mb * level_multiplier^(level-1)`.

use lsmsim_core::config::SimConfig;
use lsmsim_core::types::{secs_to_us, us_to_secs_f64, FileSnapshot, LevelSnapshot, SimTime, MB};

/// One simulated on-disk file. Sizes are logical (pre-compression) bytes.
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub id: u64,
    pub size_bytes: u64,
    pub created_at: SimTime,
}

/// One level of the hierarchy.
#[derive(Debug, Clone)]
pub struct Level {
    pub index: u32,
    files: Vec<FileMeta>,
    /// One outstanding compaction may target this level as source.
    compacting: bool,
}

impl Level {
    pub fn new(index: u32) -> Self {
        Self { index, files: Vec::new(), compacting: false }
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn files(&self) -> &[FileMeta] {
        &self.files
    }

    pub fn add_file(&mut self, file: FileMeta) {
        self.files.push(file);
    }

    pub fn is_compacting(&self) -> bool {
        self.compacting
    }

    pub fn set_compacting(&mut self, compacting: bool) {
        self.compacting = compacting;
    }

    /// Ids and byte total of every current file. Used to pick L0 compaction
    /// inputs: all overlapping files go together.
    pub fn all_file_ids(&self) -> (Vec<u64>, u64) {
        let ids = self.files.iter().map(|f| f.id).collect();
        (ids, self.total_bytes())
    }

    /// Oldest files whose removal brings the level back to `budget_bytes`.
    /// Files are stored in creation order, so a front scan is oldest-first.
    pub fn files_over_budget(&self, budget_bytes: u64) -> (Vec<u64>, u64) {
        let mut remaining = self.total_bytes();
        let mut ids = Vec::new();
        let mut taken = 0u64;
        for file in &self.files {
            if remaining <= budget_bytes {
                break;
            }
            remaining -= file.size_bytes;
            taken += file.size_bytes;
            ids.push(file.id);
        }
        (ids, taken)
    }

    /// Removes files by id, returning the bytes removed or `None` if any id
    /// is missing (an accounting bug the simulator surfaces as a fault).
    pub fn remove_files(&mut self, ids: &[u64]) -> Option<u64> {
        let before = self.file_count();
        let mut removed = 0u64;
        self.files.retain(|f| {
            if ids.contains(&f.id) {
                removed += f.size_bytes;
                false
            } else {
                true
            }
        });
        if before - self.file_count() == ids.len() {
            Some(removed)
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.compacting = false;
    }

    pub fn snapshot(&self, now: SimTime) -> LevelSnapshot {
        LevelSnapshot {
            index: self.index,
            file_count: self.file_count(),
            total_bytes: self.total_bytes(),
            is_compacting: self.compacting,
            files: self
                .files
                .iter()
                .map(|f| FileSnapshot {
                    id: f.id,
                    size_bytes: f.size_bytes,
                    age_secs: us_to_secs_f64(now.saturating_sub(f.created_at)),
                })
                .collect(),
        }
    }
}

/// Picks the shallowest level with a pending compaction trigger, skipping
/// levels that already have one outstanding and the last level (nothing
/// below it to compact into).
pub fn compaction_candidate(levels: &[Level], config: &SimConfig) -> Option<u32> {
    let last = config.compaction.num_levels.saturating_sub(1);
    for level in levels {
        if level.index >= last || level.is_compacting() || level.file_count() == 0 {
            continue;
        }
        let triggered = if level.index == 0 {
            level.file_count() >= config.compaction.l0_compaction_trigger as usize
        } else {
            level.total_bytes() > config.level_target_bytes(level.index)
        };
        if triggered {
            return Some(level.index);
        }
    }
    None
}

/// Effective fraction of input bytes surviving a compaction out of
/// `source_level`. L0 -> L1 sees the configured factor verbatim; deeper
/// levels halve the reduction each step, converging toward 1.0 because old
/// levels hold fewer still-live duplicate keys.
pub fn effective_reduction(base: f64, source_level: u32) -> f64 {
    1.0 - (1.0 - base) / 2f64.powi(source_level as i32)
}

/// The in-memory write buffer and its sealed, flush-pending companions.
#[derive(Debug, Clone)]
pub struct Memtable {
    active_bytes: u64,
    /// Virtual time the active buffer was opened (for the timeout trigger).
    opened_at: SimTime,
    sealed_count: u32,
    sealed_bytes: u64,
}

impl Memtable {
    pub fn new() -> Self {
        Self { active_bytes: 0, opened_at: 0, sealed_count: 0, sealed_bytes: 0 }
    }

    /// Deposits client bytes into the active buffer.
    pub fn deposit(&mut self, bytes: u64, now: SimTime) {
        if self.active_bytes == 0 {
            self.opened_at = now;
        }
        self.active_bytes += bytes;
    }

    /// Whether the active buffer should be sealed: size threshold reached, or
    /// it has been open longer than the timeout (0 disables), whichever first.
    pub fn wants_seal(&self, config: &SimConfig, now: SimTime) -> bool {
        if self.active_bytes == 0 {
            return false;
        }
        if self.active_bytes >= config.memtable.flush_size_mb * MB {
            return true;
        }
        let timeout = config.memtable.flush_timeout_sec;
        timeout > 0 && now.saturating_sub(self.opened_at) >= secs_to_us(timeout)
    }

    /// Whether a buffer slot is free for sealing: the sealed backlog may hold
    /// at most `max_write_buffer_number - 1` buffers (the active one occupies
    /// the remaining slot).
    pub fn can_seal(&self, config: &SimConfig) -> bool {
        self.sealed_count + 1 < config.memtable.max_write_buffer_number
    }

    /// Seals the active buffer, returning its size.
    pub fn seal(&mut self) -> u64 {
        let bytes = self.active_bytes;
        self.active_bytes = 0;
        self.sealed_count += 1;
        self.sealed_bytes += bytes;
        bytes
    }

    /// Accounts a completed flush of a sealed buffer. `None` on underflow.
    pub fn flush_done(&mut self, buffer_bytes: u64) -> Option<()> {
        if self.sealed_count == 0 || self.sealed_bytes < buffer_bytes {
            return None;
        }
        self.sealed_count -= 1;
        self.sealed_bytes -= buffer_bytes;
        Some(())
    }

    pub fn active_bytes(&self) -> u64 {
        self.active_bytes
    }

    pub fn sealed_count(&self) -> u32 {
        self.sealed_count
    }

    /// Total buffered bytes (active + awaiting flush) counted against the
    /// memory ceiling.
    pub fn buffered_bytes(&self) -> u64 {
        self.active_bytes + self.sealed_bytes
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Memtable {
    fn default() -> Self {
        Self::new()
    }
}
