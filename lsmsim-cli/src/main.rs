//! # lsmsim CLI
//!
//! Runs the LSM write-path simulator from the command line: fast-forward a
//! configuration through virtual time and inspect the resulting metrics, or
//! watch a live session tick along at a wall-clock cadence.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lsmsim_core::types::{secs_f64_to_us, us_to_secs_f64, MB};
use lsmsim_core::{MetricsSnapshot, SimConfig, SimState};
use lsmsim_engine::Simulator;

mod session;
use session::{Session, SessionConfig};

#[derive(Parser)]
#[command(name = "lsmsim")]
#[command(about = "Discrete-event simulator of an LSM storage engine's write path")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Fast-forward the simulation through virtual time and print results
    Run {
        /// JSON configuration file (defaults apply when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Virtual seconds to simulate
        #[arg(long, default_value_t = 60.0)]
        seconds: f64,
        /// Emit machine-readable JSON instead of the summary table
        #[arg(long)]
        json: bool,
    },
    /// Drive a live session at a wall-clock cadence until Ctrl-C
    Watch {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Stepping cadence in milliseconds
        #[arg(long, default_value_t = 100)]
        tick_ms: u64,
        /// Virtual seconds advanced per wall-clock second
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
    },
    /// Validate a configuration file and exit
    Validate {
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config, seconds, json } => run(config, seconds, json),
        Commands::Watch { config, tick_ms, speed } => watch(config, tick_ms, speed).await,
        Commands::Validate { config } => {
            let cfg = load_config(Some(&config))?;
            cfg.validate()?;
            println!("ok: {}", config.display());
            Ok(())
        }
    }
}

fn run(config: Option<PathBuf>, seconds: f64, json: bool) -> Result<()> {
    let cfg = load_config(config.as_deref())?;
    let mut sim = Simulator::new(cfg)?;
    sim.run_until(secs_f64_to_us(seconds))?;

    let metrics = sim.metrics();
    let state = sim.state();
    if json {
        let out = serde_json::json!({ "metrics": metrics, "state": state });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_summary(&metrics, &state);
    }
    Ok(())
}

async fn watch(config: Option<PathBuf>, tick_ms: u64, speed: f64) -> Result<()> {
    let cfg = load_config(config.as_deref())?;
    let opts = SessionConfig {
        tick: Duration::from_millis(tick_ms.max(1)),
        speed,
        ..SessionConfig::default()
    };
    let (session, mut logs) = Session::spawn(cfg, opts)?;
    session.start();
    println!("watching (Ctrl-C to stop)");

    let mut report = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            Some(log) = logs.recv() => println!("{log}"),
            _ = report.tick() => {
                let m = session.metrics();
                let s = session.state();
                println!(
                    "t={:>8.1}s  wa={:.2}  ra={:.1}  tp={:>6.1} MB/s  util={:>5.1}%  mem={:>4} MB{}{}",
                    us_to_secs_f64(s.now_us),
                    m.write_amp,
                    m.read_amp,
                    m.throughput_mbps,
                    m.disk_utilization * 100.0,
                    s.memtable_bytes / MB,
                    if s.is_stalled { "  [STALLED]" } else { "" },
                    if s.is_oom_killed { "  [OOM-KILLED]" } else { "" },
                );
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.pause();
    let dropped = session.dropped_logs();
    if dropped > 0 {
        println!("({dropped} log events dropped)");
    }
    session.stop().await;
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: SimConfig = serde_json::from_str(&raw)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}

fn print_summary(metrics: &MetricsSnapshot, state: &SimState) {
    println!("virtual time        {:>12.1} s", us_to_secs_f64(state.now_us));
    println!("write amplification {:>12.2}", metrics.write_amp);
    println!("read amplification  {:>12.1}", metrics.read_amp);
    println!("ingest throughput   {:>12.1} MB/s", metrics.throughput_mbps);
    println!("disk utilization    {:>11.1} %", metrics.disk_utilization * 100.0);
    println!("flushes             {:>12}", metrics.lifetime.flush_count);
    println!("compactions         {:>12}", metrics.lifetime.compaction_count);
    println!("stalls              {:>12}", metrics.lifetime.stall_count);
    println!("user bytes          {:>12} MB", metrics.lifetime.user_bytes / MB);
    println!("bytes written       {:>12} MB", metrics.lifetime.total_bytes_written() / MB);
    println!("disk used           {:>12} MB", state.disk_used_bytes / MB);
    if state.is_oom_killed {
        println!("terminal state: OOM-KILLED");
    }
    println!();
    println!("level    files        bytes  compacting");
    for level in &state.levels {
        println!(
            "L{:<6} {:>6} {:>9} MB  {}",
            level.index,
            level.file_count,
            level.total_bytes / MB,
            if level.is_compacting { "yes" } else { "" },
        );
    }
}
