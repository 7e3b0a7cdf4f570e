//! # lsmsim Core
//!
//! Shared building blocks for the lsmsim LSM write-path simulator:
//! - Configuration (tunables, compression profiles, validation)
//! - Error types
//! - Metrics (lifetime + window accumulators, derived statistics)
//! - Core types (virtual time, snapshots, log events)
//!
//! The simulation engine itself lives in `lsmsim-engine`; this crate holds
//! everything both the engine and its callers need to agree on.

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// Re-export commonly used types
pub use config::{CompressionKind, CompressionProfile, SimConfig};
pub use error::{Error, Result};
pub use metrics::{Metrics, MetricsSnapshot};
pub use types::{LevelSnapshot, LogEvent, LogKind, SimState, SimTime, MB};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
