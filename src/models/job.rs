use super::shard::ShardId;
use crate::service::JobHandle;
use crate::state_machine::JobState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal payload of a job, tagged by how the job ended. Only a succeeded
/// job can carry a result payload; the other variants cannot be misread as
/// carrying one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    /// Not terminal yet.
    Unresolved,
    /// The service returned a result payload.
    Succeeded { output: String },
    /// The service reported an explicit error, or submission was exhausted.
    Failed { reason: String },
    /// The local wait budget ran out before a terminal answer arrived.
    Expired { reason: String },
}

/// One external submission derived from exactly one shard.
///
/// Jobs live in the registry; the submitter inserts them and the monitor
/// drives their state transitions. Everyone else sees cloned snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub shard_id: ShardId,
    /// SHA-256 over shard content, the idempotency key for submission.
    pub content_hash: String,
    /// Opaque external identifier, present once submission succeeded.
    pub handle: Option<JobHandle>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub state: JobState,
    pub outcome: JobOutcome,
}

impl Job {
    /// A fresh, unsubmitted job for a shard.
    pub fn new(shard_id: ShardId, content_hash: String) -> Self {
        Self {
            shard_id,
            content_hash,
            handle: None,
            submitted_at: None,
            state: JobState::default(),
            outcome: JobOutcome::Unresolved,
        }
    }

    /// Record a successful submission.
    pub fn mark_submitted(&mut self, handle: JobHandle, at: DateTime<Utc>) {
        self.handle = Some(handle);
        self.submitted_at = Some(at);
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// The reason attached to a failed or expired job, if any.
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            JobOutcome::Failed { reason } | JobOutcome::Expired { reason } => Some(reason),
            _ => None,
        }
    }

    /// The result payload of a succeeded job, if any.
    pub fn output(&self) -> Option<&str> {
        match &self.outcome {
            JobOutcome::Succeeded { output } => Some(output),
            _ => None,
        }
    }
}
