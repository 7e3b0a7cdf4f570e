//! # Boundary Session
//!
//! The driver half of the core/boundary seam: owns the simulator behind one
//! exclusive critical section, steps it on a fixed wall-clock cadence from a
//! background task, and forwards log events through a bounded channel.
//!
//! The start/pause flag lives entirely here; it gates stepping and has no
//! core semantics. Log forwarding uses `try_send` on a fixed-capacity queue:
//! when the consumer is slow, new notifications are counted and dropped;
//! simulation correctness never depends on the consumer keeping up.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::error;

use lsmsim_core::{LogEvent, MetricsSnapshot, Result, SimConfig, SimState};
use lsmsim_engine::Simulator;

/// Driver tuning for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Wall-clock stepping cadence.
    pub tick: Duration,
    /// Virtual seconds advanced per wall-clock second.
    pub speed: f64,
    /// Capacity of the bounded log channel.
    pub log_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { tick: Duration::from_millis(100), speed: 1.0, log_capacity: 1024 }
    }
}

/// A running simulator session.
pub struct Session {
    sim: Arc<Mutex<Simulator>>,
    running: Arc<AtomicBool>,
    dropped_logs: Arc<AtomicU64>,
    shutdown: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl Session {
    /// Builds the simulator and spawns the cadence task, paused. Returns the
    /// receiving end of the bounded log channel.
    pub fn spawn(
        config: SimConfig,
        opts: SessionConfig,
    ) -> Result<(Self, mpsc::Receiver<LogEvent>)> {
        let sim = Arc::new(Mutex::new(Simulator::new(config)?));
        let (log_tx, log_rx) = mpsc::channel(opts.log_capacity.max(1));
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let running = Arc::new(AtomicBool::new(false));
        let dropped_logs = Arc::new(AtomicU64::new(0));

        let task_sim = Arc::clone(&sim);
        let task_running = Arc::clone(&running);
        let task_dropped = Arc::clone(&dropped_logs);
        let virtual_tick_us = (opts.tick.as_secs_f64() * opts.speed * 1_000_000.0).round() as u64;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(opts.tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !task_running.load(Ordering::Relaxed) {
                            continue;
                        }
                        let outcome = {
                            let mut sim = task_sim.lock();
                            let target = sim.now() + virtual_tick_us;
                            sim.run_until(target)
                        };
                        match outcome {
                            Ok(report) => {
                                for log in report.logs {
                                    if log_tx.try_send(log).is_err() {
                                        task_dropped.fetch_add(1, Ordering::Relaxed);
                                    }
                                }
                            }
                            Err(err) => {
                                error!(error = %err, "simulation fault, pausing session");
                                task_running.store(false, Ordering::Relaxed);
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        Ok((Session { sim, running, dropped_logs, shutdown, handle }, log_rx))
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::Relaxed);
    }

    pub fn pause(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Resets the simulator. Safe at any time: the core discards the queue,
    /// resource timestamps and level/metric state atomically.
    pub fn reset(&self) -> Result<()> {
        self.sim.lock().reset()
    }

    pub fn update_config(&self, config: SimConfig) -> Result<()> {
        self.sim.lock().update_config(config)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.sim.lock().metrics()
    }

    pub fn state(&self) -> SimState {
        self.sim.lock().state()
    }

    /// Log events dropped because the consumer fell behind.
    pub fn dropped_logs(&self) -> u64 {
        self.dropped_logs.load(Ordering::Relaxed)
    }

    /// Stops the cadence task and waits for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
