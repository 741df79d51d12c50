//! # Job Registry
//!
//! Explicit, passed-in arena of jobs keyed by shard id, owned by the
//! orchestrating caller rather than living in process-wide state. The
//! submitter inserts, the monitor updates; everyone else reads cloned
//! snapshots. State transitions run under the entry lock so no reader can
//! observe a half-updated job.

use crate::error::Result;
use crate::models::{Job, ShardId};
use crate::service::JobHandle;
use crate::state_machine::{JobEvent, JobState, JobStateMachine};
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Counts of jobs grouped by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub pending: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub expired: usize,
}

impl StatusSummary {
    pub fn total(&self) -> usize {
        self.pending + self.running + self.succeeded + self.failed + self.expired
    }

    pub fn terminal(&self) -> usize {
        self.succeeded + self.failed + self.expired
    }
}

/// Shared job arena for one run.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<ShardId, Job>,
    hash_index: DashMap<String, ShardId>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh job. The content hash is indexed for idempotent
    /// re-submission lookups.
    pub fn insert(&self, job: Job) {
        self.hash_index
            .insert(job.content_hash.clone(), job.shard_id);
        self.jobs.insert(job.shard_id, job);
    }

    /// Look up the shard already registered for a content hash, if any.
    pub fn find_by_hash(&self, content_hash: &str) -> Option<ShardId> {
        self.hash_index.get(content_hash).map(|entry| *entry)
    }

    /// Atomically register a fresh job unless its content hash is already
    /// taken. Returns false when another job owns the hash.
    pub fn try_reserve(&self, job: Job) -> bool {
        match self.hash_index.entry(job.content_hash.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(job.shard_id);
                self.jobs.insert(job.shard_id, job);
                true
            }
        }
    }

    /// Snapshot of one job.
    pub fn get(&self, shard_id: ShardId) -> Option<Job> {
        self.jobs.get(&shard_id).map(|entry| entry.value().clone())
    }

    /// Record a successful submission under the entry lock.
    pub fn record_submission(&self, shard_id: ShardId, handle: JobHandle, at: DateTime<Utc>) {
        if let Some(mut entry) = self.jobs.get_mut(&shard_id) {
            entry.mark_submitted(handle, at);
        }
    }

    /// Validate and apply a state transition under the entry lock.
    pub fn apply_event(&self, shard_id: ShardId, event: JobEvent) -> Result<JobState> {
        let mut entry = self.jobs.get_mut(&shard_id).ok_or_else(|| {
            crate::error::ChargenError::reconciliation(format!(
                "no job registered for shard {shard_id}"
            ))
        })?;
        JobStateMachine::apply(&mut entry, event)
    }

    /// Jobs that were submitted and have not reached a terminal state.
    pub fn outstanding(&self) -> Vec<(ShardId, JobHandle)> {
        let mut jobs: Vec<(ShardId, JobHandle)> = self
            .jobs
            .iter()
            .filter(|entry| !entry.is_terminal())
            .filter_map(|entry| entry.handle.clone().map(|h| (entry.shard_id, h)))
            .collect();
        jobs.sort_by_key(|(shard_id, _)| *shard_id);
        jobs
    }

    /// Snapshot of every job, ordered by shard id.
    pub fn snapshot(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.iter().map(|entry| entry.value().clone()).collect();
        jobs.sort_by_key(|job| job.shard_id);
        jobs
    }

    /// Counts of jobs grouped by state.
    pub fn status_summary(&self) -> StatusSummary {
        let mut summary = StatusSummary::default();
        for entry in self.jobs.iter() {
            match entry.state {
                JobState::Pending => summary.pending += 1,
                JobState::Running => summary.running += 1,
                JobState::Succeeded => summary.succeeded += 1,
                JobState::Failed => summary.failed += 1,
                JobState::Expired => summary.expired += 1,
            }
        }
        summary
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_index_finds_registered_shard() {
        let registry = JobRegistry::new();
        registry.insert(Job::new(ShardId(0), "hash-a".to_string()));
        registry.insert(Job::new(ShardId(1), "hash-b".to_string()));

        assert_eq!(registry.find_by_hash("hash-b"), Some(ShardId(1)));
        assert_eq!(registry.find_by_hash("hash-x"), None);
    }

    #[test]
    fn test_try_reserve_rejects_duplicate_hash() {
        let registry = JobRegistry::new();
        assert!(registry.try_reserve(Job::new(ShardId(0), "same".to_string())));
        assert!(!registry.try_reserve(Job::new(ShardId(1), "same".to_string())));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_apply_event_transitions_under_lock() {
        let registry = JobRegistry::new();
        registry.insert(Job::new(ShardId(0), "hash".to_string()));

        let state = registry.apply_event(ShardId(0), JobEvent::Start).unwrap();
        assert_eq!(state, JobState::Running);
        assert_eq!(registry.get(ShardId(0)).unwrap().state, JobState::Running);
    }

    #[test]
    fn test_apply_event_unknown_shard_is_an_error() {
        let registry = JobRegistry::new();
        assert!(registry.apply_event(ShardId(9), JobEvent::Start).is_err());
    }

    #[test]
    fn test_outstanding_excludes_terminal_and_unsubmitted() {
        let registry = JobRegistry::new();

        let mut submitted = Job::new(ShardId(0), "a".to_string());
        submitted.mark_submitted(JobHandle::new("job-0"), Utc::now());
        registry.insert(submitted);

        // Never submitted, no handle
        registry.insert(Job::new(ShardId(1), "b".to_string()));

        let mut done = Job::new(ShardId(2), "c".to_string());
        done.mark_submitted(JobHandle::new("job-2"), Utc::now());
        registry.insert(done);
        registry.apply_event(ShardId(2), JobEvent::Start).unwrap();
        registry
            .apply_event(ShardId(2), JobEvent::Succeed(String::new()))
            .unwrap();

        let outstanding = registry.outstanding();
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].0, ShardId(0));
    }

    #[test]
    fn test_status_summary_counts() {
        let registry = JobRegistry::new();
        registry.insert(Job::new(ShardId(0), "a".to_string()));
        registry.insert(Job::new(ShardId(1), "b".to_string()));
        registry.apply_event(ShardId(1), JobEvent::Start).unwrap();
        registry
            .apply_event(ShardId(1), JobEvent::Fail("boom".to_string()))
            .unwrap();

        let summary = registry.status_summary();
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), 2);
        assert_eq!(summary.terminal(), 1);
    }
}
