//! # Error Types
//!
//! Structured error taxonomy for the batch core using thiserror. Per-job
//! failures are represented in job state, not as errors; only configuration
//! problems and internal invariant violations abort a run.

use thiserror::Error;

/// Errors surfaced by the batch-submission and reconciliation core.
#[derive(Error, Debug)]
pub enum ChargenError {
    /// Invalid tunables. Fatal, raised before any submission happens.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A duplicate record identifier was found while the duplicate policy
    /// is `Reject`.
    #[error("Duplicate record identifier: {id}")]
    DuplicateRecord { id: String },

    /// A serialized job payload exceeded the configured ceiling. Recoverable
    /// by re-chunking with a smaller shard size; never truncated internally.
    #[error(
        "Payload for shard {shard_id} is {size_bytes} bytes, exceeds limit of {limit_bytes} bytes"
    )]
    PayloadTooLarge {
        shard_id: usize,
        size_bytes: usize,
        limit_bytes: usize,
    },

    /// Submission retries were exhausted (or the service rejected the
    /// payload outright). The job is downgraded to failed locally; sibling
    /// jobs keep going.
    #[error("Submission for shard {shard_id} failed after {attempts} attempt(s): {message}")]
    Submission {
        shard_id: usize,
        attempts: u32,
        message: String,
    },

    /// An illegal job state transition was requested.
    #[error("Invalid job state transition from {from} via {event}")]
    StateTransition { from: String, event: String },

    /// The terminal job set handed to the reconciler does not cover every
    /// shard. Indicates a bug in the orchestration, not a user error.
    #[error("Reconciliation invariant violated: {message}")]
    Reconciliation { message: String },
}

impl ChargenError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a reconciliation invariant error
    pub fn reconciliation(message: impl Into<String>) -> Self {
        Self::Reconciliation {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChargenError>;
