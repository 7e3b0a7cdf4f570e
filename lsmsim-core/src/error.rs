//! # Error Handling
//!
//! Error types for the simulator.
//!
//! Three things can go wrong, and only two of them are errors:
//!
//! 1. **Validation**: a proposed configuration violates a bound, or attempts
//!    a structural change while the simulation has already advanced. Reported
//!    synchronously; simulator state is untouched.
//! 2. **Fault**: an internal invariant was violated during event processing
//!    (a model bug). The simulation stops and the fault is surfaced to the
//!    caller instead of crossing the boundary as a panic.
//! 3. OOM-killed is *not* an error. It is a queryable terminal model state
//!    on the state snapshot, distinct from a fault.

use thiserror::Error;

/// Result type alias for simulator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Primary error type for the simulator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A configuration bound was violated, or a disallowed live change was
    /// attempted. State is unchanged.
    #[error("invalid configuration: {message}")]
    Validation { message: String },

    /// An internal invariant was violated while processing an event. The
    /// simulation is stopped; only `Reset` recovers.
    #[error("simulation fault: {message}")]
    Fault { message: String },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation { message: message.into() }
    }

    pub fn fault(message: impl Into<String>) -> Self {
        Error::Fault { message: message.into() }
    }

    /// Faults indicate a bug in the model; validation errors indicate a bad
    /// request and are always recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Get error code for monitoring
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "VALIDATION_ERROR",
            Error::Fault { .. } => "SIMULATION_FAULT",
        }
    }
}
