//! # External Service Boundary
//!
//! The core treats the classification backend as an abstract capability with
//! two operations: submit a payload, poll a handle. Any queuing or
//! batch-processing API with these operations satisfies the contract; the
//! concrete client lives outside this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opaque external job identifier returned by the service on submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote job status vocabulary as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    /// Accepted, being validated or queued
    Validating,
    /// Being processed
    InProgress,
    /// Results are being assembled
    Finalizing,
    /// Done, output available
    Completed,
    /// The service gave up on the job
    Failed,
    /// The service's own completion window ran out
    Expired,
    /// Cancelled on the service side
    Cancelled,
}

/// One poll answer: the remote status plus, when completed, the output
/// payload, or an error description for failed jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSnapshot {
    pub status: RemoteStatus,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl PollSnapshot {
    pub fn status(status: RemoteStatus) -> Self {
        Self {
            status,
            output: None,
            error: None,
        }
    }

    pub fn completed(output: impl Into<String>) -> Self {
        Self {
            status: RemoteStatus::Completed,
            output: Some(output.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: RemoteStatus::Failed,
            output: None,
            error: Some(error.into()),
        }
    }
}

/// Errors at the service boundary, split into transient conditions worth
/// retrying and permanent rejections that are not.
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    #[error("rate limited: {message}")]
    RateLimited { message: String },

    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("service rejected the request: {message}")]
    Rejected { message: String },

    #[error("unknown job handle: {handle}")]
    UnknownHandle { handle: String },
}

impl ServiceError {
    /// Whether a retry with backoff is worthwhile.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Network { .. }
        )
    }
}

/// The two-operation capability the core orchestrates against.
#[async_trait]
pub trait ClassificationService: Send + Sync {
    /// Submit one serialized job payload; returns the opaque handle.
    async fn submit(&self, body: &str) -> Result<JobHandle, ServiceError>;

    /// Poll the current status of a previously submitted job.
    async fn poll(&self, handle: &JobHandle) -> Result<PollSnapshot, ServiceError>;
}
