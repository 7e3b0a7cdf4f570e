//! End-to-end simulator behavior: the write/flush/compaction causal chain,
//! stall and OOM semantics, reset, and configuration updates.
//!
//! All scenarios use the "none" compression profile so byte arithmetic stays
//! exact and hand-checkable.

use lsmsim_core::config::{CompressionKind, SimConfig};
use lsmsim_core::types::{secs_to_us, MB};
use lsmsim_engine::Simulator;

/// Config with compaction unreachable and exact-byte write arithmetic.
fn quiet_config() -> SimConfig {
    let mut config = SimConfig::default();
    config.compression = CompressionKind::None;
    config.write_rate_mbps = 10.0;
    config.memtable.flush_size_mb = 64;
    config.memtable.max_write_buffer_number = 4;
    config.memtable.flush_timeout_sec = 0;
    config.compaction.l0_compaction_trigger = 999;
    config
}

#[test]
fn virtual_time_never_decreases() {
    let mut sim = Simulator::new(SimConfig::default()).unwrap();
    let mut last = 0;
    for _ in 0..500 {
        let report = sim.step().unwrap();
        assert!(report.now >= last, "time went backwards: {} < {last}", report.now);
        last = report.now;
    }
}

#[test]
fn single_flush_scenario() {
    // 64 MB buffer at 10 MB/s fills after exactly 6.4 virtual seconds.
    let mut sim = Simulator::new(quiet_config()).unwrap();

    sim.run_until(secs_to_us(6) + 400_000).unwrap();
    let state = sim.state();
    assert_eq!(state.pending_buffers, 1, "buffer should be sealed at 6.4s");
    assert_eq!(sim.metrics().lifetime.flush_count, 0, "flush still in flight");

    sim.run_until(secs_to_us(8)).unwrap();
    let state = sim.state();
    let metrics = sim.metrics();
    assert_eq!(metrics.lifetime.flush_count, 1);
    assert_eq!(state.levels[0].file_count, 1);
    assert_eq!(state.levels[0].total_bytes, 64 * MB);
    assert_eq!(state.pending_buffers, 0);
}

#[test]
fn write_amp_is_exactly_one_before_any_compaction() {
    let mut sim = Simulator::new(quiet_config()).unwrap();
    sim.run_until(secs_to_us(15)).unwrap();

    let metrics = sim.metrics();
    assert!(metrics.lifetime.flush_count >= 1);
    assert_eq!(metrics.lifetime.compaction_count, 0);
    assert_eq!(metrics.write_amp, 1.0);
}

#[test]
fn bytes_are_conserved_with_compaction_disabled() {
    let mut config = quiet_config();
    config.memtable.flush_size_mb = 16;
    let mut sim = Simulator::new(config).unwrap();

    sim.run_until(secs_to_us(20)).unwrap();
    let state = sim.state();
    let metrics = sim.metrics();

    // Fills every 1.6s; the 12th flush lands just after 19.2s.
    assert_eq!(metrics.lifetime.flush_count, 12);
    assert_eq!(state.levels[0].total_bytes, metrics.lifetime.bytes_written[0]);
    assert_eq!(state.levels[0].total_bytes, 12 * 16 * MB);
    for level in &state.levels[1..] {
        assert_eq!(level.total_bytes, 0);
    }
}

#[test]
fn fourth_flush_triggers_l0_compaction() {
    let mut config = quiet_config();
    config.memtable.flush_size_mb = 16;
    config.compaction.l0_compaction_trigger = 4;
    config.compaction.max_background_jobs = 1;
    config.compaction.reduction_factor = 0.85;
    let mut sim = Simulator::new(config).unwrap();

    // Flushes complete near 1.63s, 3.23s, 4.83s, 6.43s; the fourth trips the
    // L0 trigger and the compaction finishes well before 7s.
    sim.run_until(secs_to_us(7)).unwrap();
    let state = sim.state();
    let metrics = sim.metrics();

    assert_eq!(metrics.lifetime.flush_count, 4);
    assert_eq!(metrics.lifetime.compaction_count, 1);
    assert_eq!(state.levels[0].file_count, 0);

    let input = 4 * 16 * MB;
    let expected_output = (input as f64 * 0.85).round() as u64;
    assert_eq!(state.levels[1].total_bytes, expected_output);
    assert_eq!(metrics.lifetime.bytes_read[0], input);
    assert_eq!(metrics.lifetime.bytes_written[1], expected_output);

    // write amp = (flushed + compacted out) / flushed = 1 + reduction
    assert!((metrics.write_amp - 1.85).abs() < 1e-6);
    assert!(metrics.read_amp >= 1.0);
}

#[test]
fn stall_sets_when_buffers_exhaust_and_clears_on_flush() {
    let mut config = quiet_config();
    config.write_rate_mbps = 160.0;
    config.memtable.max_write_buffer_number = 2;
    config.hardware.io_throughput_mbps = 100.0;
    let mut sim = Simulator::new(config).unwrap();

    // First buffer seals at 0.4s and flushes until ~1.04s; the active buffer
    // refills by 0.8s with no slot free.
    sim.run_until(900_000).unwrap();
    let state = sim.state();
    assert!(state.is_stalled);
    assert!(!state.is_oom_killed);
    assert_eq!(sim.metrics().lifetime.flush_count, 0);
    assert_eq!(sim.metrics().lifetime.stall_count, 1);

    // The flush completes at ~1.04s, freeing a slot and clearing the stall.
    sim.run_until(1_200_000).unwrap();
    let state = sim.state();
    assert!(!state.is_stalled);
    assert_eq!(sim.metrics().lifetime.flush_count, 1);
    assert_eq!(state.levels[0].total_bytes, 64 * MB);
}

#[test]
fn oom_is_terminal_and_freezes_the_clock() {
    let mut config = quiet_config();
    config.write_rate_mbps = 1600.0;
    config.memtable.max_write_buffer_number = 2;
    let mut sim = Simulator::new(config).unwrap();

    // 160 MB arrives per tick; the second tick pushes buffered bytes past the
    // 192 MB ceiling (2 x 64 MB x 1.5).
    assert_eq!(sim.config().memory_ceiling_bytes(), 192 * MB);
    sim.run_until(300_000).unwrap();

    let state = sim.state();
    assert!(state.is_oom_killed);
    assert!(!state.is_stalled, "OOM is distinct from a stall");
    assert_eq!(state.now_us, 200_000);

    // Step is a no-op now; the clock stays frozen and no event is processed.
    let report = sim.step().unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(report.now, 200_000);
    sim.run_until(secs_to_us(10)).unwrap();
    assert_eq!(sim.now(), 200_000);
}

#[test]
fn timeout_seals_a_partial_buffer() {
    let mut config = quiet_config();
    config.memtable.flush_size_mb = 1024;
    config.memtable.flush_timeout_sec = 2;
    let mut sim = Simulator::new(config).unwrap();

    sim.run_until(secs_to_us(3)).unwrap();
    let metrics = sim.metrics();
    let state = sim.state();
    assert_eq!(metrics.lifetime.flush_count, 1);
    // Opened at 0.1s, sealed at 2.1s: 21 ticks of 1 MB.
    assert_eq!(state.levels[0].total_bytes, 21 * MB);
}

#[test]
fn reset_restores_the_initial_state() {
    let mut sim = Simulator::new(quiet_config()).unwrap();
    sim.run_until(secs_to_us(10)).unwrap();
    assert!(!sim.is_queue_empty());
    assert!(sim.metrics().lifetime.user_bytes > 0);

    sim.reset().unwrap();
    assert!(sim.is_queue_empty(), "reset yields an empty queue");
    assert_eq!(sim.now(), 0);

    let metrics = sim.metrics();
    assert_eq!(metrics.lifetime.user_bytes, 0);
    assert_eq!(metrics.window.user_bytes, 0);
    assert_eq!(metrics.lifetime.flush_count, 0);

    let state = sim.state();
    assert_eq!(state.memtable_bytes, 0);
    assert!(state.levels.iter().all(|l| l.file_count == 0));
    assert!(!state.is_stalled);
    assert!(!state.is_oom_killed);
}

#[test]
fn structural_config_changes_are_rejected_while_running() {
    let mut sim = Simulator::new(quiet_config()).unwrap();
    sim.run_until(secs_to_us(1)).unwrap();

    let mut structural = quiet_config();
    structural.compaction.l0_compaction_trigger = 8;
    let err = sim.update_config(structural).unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    // No partial mutation.
    assert_eq!(sim.config().compaction.l0_compaction_trigger, 999);

    let mut rate_only = quiet_config();
    rate_only.write_rate_mbps = 42.0;
    sim.update_config(rate_only).unwrap();
    assert_eq!(sim.config().write_rate_mbps, 42.0);
}

#[test]
fn any_config_change_is_allowed_before_the_first_step() {
    let mut sim = Simulator::new(quiet_config()).unwrap();

    let mut structural = quiet_config();
    structural.compaction.num_levels = 3;
    sim.update_config(structural).unwrap();
    assert_eq!(sim.config().compaction.num_levels, 3);
    assert_eq!(sim.state().levels.len(), 3);
}

#[test]
fn invalid_config_update_leaves_state_untouched() {
    let mut sim = Simulator::new(quiet_config()).unwrap();
    sim.run_until(secs_to_us(2)).unwrap();
    let before = sim.metrics().lifetime.user_bytes;

    let mut bad = quiet_config();
    bad.write_rate_mbps = -1.0;
    assert!(sim.update_config(bad).is_err());
    assert_eq!(sim.metrics().lifetime.user_bytes, before);
    assert_eq!(sim.now(), secs_to_us(2));
}

#[test]
fn metrics_window_resets_independently_of_lifetime() {
    let mut sim = Simulator::new(quiet_config()).unwrap();
    sim.run_until(secs_to_us(10)).unwrap();

    let before = sim.metrics();
    assert!(before.lifetime.user_bytes > 0);
    assert_eq!(before.window.user_bytes, before.lifetime.user_bytes);

    sim.reset_metrics_window();
    let after = sim.metrics();
    assert_eq!(after.window.user_bytes, 0);
    assert_eq!(after.lifetime.user_bytes, before.lifetime.user_bytes);

    // The window throughput now reflects only post-reset ingest.
    sim.run_until(secs_to_us(20)).unwrap();
    let later = sim.metrics();
    assert!((later.throughput_mbps - 10.0).abs() < 0.5);
}

#[test]
fn deterministic_replay_from_identical_configs() {
    let mut config = quiet_config();
    config.compaction.l0_compaction_trigger = 4;
    config.memtable.flush_size_mb = 16;

    let mut a = Simulator::new(config.clone()).unwrap();
    let mut b = Simulator::new(config).unwrap();
    a.run_until(secs_to_us(30)).unwrap();
    b.run_until(secs_to_us(30)).unwrap();

    let (ma, mb) = (a.metrics(), b.metrics());
    assert_eq!(ma.lifetime.flush_count, mb.lifetime.flush_count);
    assert_eq!(ma.lifetime.compaction_count, mb.lifetime.compaction_count);
    assert_eq!(ma.lifetime.bytes_written, mb.lifetime.bytes_written);

    let (sa, sb) = (a.state(), b.state());
    assert_eq!(sa.now_us, sb.now_us);
    for (la, lb) in sa.levels.iter().zip(&sb.levels) {
        assert_eq!(la.total_bytes, lb.total_bytes);
        assert_eq!(la.file_count, lb.file_count);
    }
}

#[test]
fn deep_levels_fill_under_sustained_load() {
    let mut config = SimConfig::default();
    config.compression = CompressionKind::None;
    config.write_rate_mbps = 50.0;
    config.memtable.flush_size_mb = 32;
    config.memtable.max_write_buffer_number = 4;
    config.compaction.l0_compaction_trigger = 2;
    config.compaction.max_bytes_for_level_base_mb = 64;
    config.compaction.level_multiplier = 4.0;
    let mut sim = Simulator::new(config).unwrap();

    sim.run_until(secs_to_us(120)).unwrap();
    let state = sim.state();
    let metrics = sim.metrics();

    assert!(!state.is_oom_killed);
    assert!(metrics.lifetime.compaction_count > 1);
    assert!(state.levels[2].total_bytes > 0, "data should reach L2");
    assert!(metrics.write_amp > 1.0);
    // Conservation: everything written came from flushes plus compaction
    // outputs, never more than amplification of what was flushed.
    let flushed = metrics.lifetime.bytes_written[0];
    assert!(metrics.lifetime.total_bytes_written() >= flushed);
}
