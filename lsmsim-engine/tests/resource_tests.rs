//! Resource contention model tests: duration arithmetic, track
//! serialization, and background-job slot accounting.

use lsmsim_core::config::{CompressionKind, SimConfig};
use lsmsim_core::types::MB;
use lsmsim_engine::resources::{compaction_cost, flush_cost, OperationCost, ResourceBudget};

fn base_config() -> SimConfig {
    let mut config = SimConfig::default();
    config.compression = CompressionKind::None;
    config.hardware.io_latency_ms = 0.1;
    config.hardware.io_throughput_mbps = 500.0;
    config
}

#[test]
fn flush_cost_is_seek_plus_write_plus_compress() {
    let config = base_config();
    let cost = flush_cost(&config, 64 * MB);

    // seek 0.0001s + 64MB / 500MBps
    assert!((cost.io_secs - 0.1281).abs() < 1e-9);
    // 64MB / 10000MBps (the "none" profile is effectively free)
    assert!((cost.cpu_secs - 0.0064).abs() < 1e-9);
}

#[test]
fn compaction_cost_charges_both_directions() {
    let config = base_config();
    let cost = compaction_cost(&config, 64 * MB, 32 * MB, 4);

    // two seeks + read 64MB + write 32MB at 500MBps
    let expected_io = 0.0002 + 64.0 / 500.0 + 32.0 / 500.0;
    assert!((cost.io_secs - expected_io).abs() < 1e-9);
    assert!(cost.cpu_secs > 0.0);
}

#[test]
fn subcompactions_shorten_cpu_but_not_io() {
    let mut config = base_config();
    let serial = compaction_cost(&config, 256 * MB, 128 * MB, 8);

    config.compaction.max_subcompactions = 4;
    let parallel = compaction_cost(&config, 256 * MB, 128 * MB, 8);

    assert!((parallel.cpu_secs - serial.cpu_secs / 4.0).abs() < 1e-12);
    assert_eq!(parallel.io_secs, serial.io_secs);
}

#[test]
fn subcompaction_parallelism_is_bounded_by_input_files() {
    let mut config = base_config();
    config.compaction.max_subcompactions = 8;
    let two_files = compaction_cost(&config, 64 * MB, 32 * MB, 2);

    config.compaction.max_subcompactions = 2;
    let capped = compaction_cost(&config, 64 * MB, 32 * MB, 2);

    assert_eq!(two_files.cpu_secs, capped.cpu_secs);
}

#[test]
fn slower_compression_profiles_cost_more_cpu() {
    let mut config = base_config();
    let none = flush_cost(&config, 64 * MB);

    config.compression = CompressionKind::Zstd;
    let zstd = flush_cost(&config, 64 * MB);

    assert!(zstd.cpu_secs > none.cpu_secs);
    // zstd shrinks the physical write
    assert!(zstd.io_secs < none.io_secs);
}

#[test]
fn disk_track_serializes_back_to_back_operations() {
    let mut budget = ResourceBudget::new(2);
    let cost = OperationCost { io_secs: 1.0, cpu_secs: 0.1 };

    let first = budget.admit(0, cost);
    assert_eq!(first, 1_000_000);

    // Requested at the same instant, but the disk is busy until the first
    // finishes.
    let second = budget.admit(0, cost);
    assert_eq!(second, 2_000_000);
    assert_eq!(budget.disk_busy_until(), 2_000_000);
}

#[test]
fn cpu_bound_operation_completes_on_the_cpu_track() {
    let mut budget = ResourceBudget::new(2);
    let done = budget.admit(0, OperationCost { io_secs: 0.1, cpu_secs: 1.0 });
    assert_eq!(done, 1_000_000);
}

#[test]
fn idle_gap_does_not_backdate_starts() {
    let mut budget = ResourceBudget::new(2);
    budget.admit(0, OperationCost { io_secs: 0.5, cpu_secs: 0.0 });

    // Disk went idle at 0.5s; an operation requested at 2s starts at 2s.
    let done = budget.admit(2_000_000, OperationCost { io_secs: 0.5, cpu_secs: 0.0 });
    assert_eq!(done, 2_500_000);
}

#[test]
fn job_slots_are_bounded() {
    let mut budget = ResourceBudget::new(2);
    assert!(budget.try_acquire_job());
    assert!(budget.try_acquire_job());
    assert!(!budget.try_acquire_job());
    assert_eq!(budget.active_jobs(), 2);

    budget.release_job();
    assert!(budget.try_acquire_job());
    assert!(budget.active_jobs() <= budget.max_jobs());
}

#[test]
fn reset_discards_busy_state() {
    let mut budget = ResourceBudget::new(1);
    budget.try_acquire_job();
    budget.admit(0, OperationCost { io_secs: 10.0, cpu_secs: 10.0 });

    budget.reset(3);
    assert_eq!(budget.disk_busy_until(), 0);
    assert_eq!(budget.cpu_busy_until(), 0);
    assert_eq!(budget.active_jobs(), 0);
    assert_eq!(budget.max_jobs(), 3);
}
