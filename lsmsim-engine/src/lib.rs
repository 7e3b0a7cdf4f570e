//! # lsmsim Engine
//!
//! The discrete-event simulation core.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Simulator                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │   Write event (recurring)                                    │
//! │        │ deposit bytes                                       │
//! │        ▼                                                     │
//! │   ┌──────────┐  seal   ┌───────────────┐  Flush   ┌───────┐  │
//! │   │ Memtable │────────>│ sealed buffer │─────────>│  L0   │  │
//! │   └──────────┘         └───────────────┘          └───┬───┘  │
//! │                                                       │      │
//! │                       trigger: file count / byte budget      │
//! │                                                       ▼      │
//! │   ┌────────────────┐   Compaction events    ┌────────────┐   │
//! │   │ ResourceBudget │<───── durations ───────│ L1 .. Ln   │   │
//! │   │ disk/cpu/slots │                        └────────────┘   │
//! │   └────────────────┘                                         │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything is single-threaded and deterministic: durations are arithmetic,
//! never real waits, and equal-timestamp events are ordered by an explicit
//! sequence counter so two runs with the same configuration are identical.

pub mod levels;
pub mod queue;
pub mod resources;
pub mod simulator;

pub use queue::{Event, EventKind, EventQueue};
pub use resources::{OperationCost, ResourceBudget};
pub use simulator::{Simulator, StepReport};
