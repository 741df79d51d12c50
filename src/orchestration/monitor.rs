//! # Job Monitor
//!
//! Drives every outstanding job to a terminal state by polling the external
//! service. Each job gets its own poll task with a doubling interval and a
//! wall-clock expiry deadline; a semaphore bounds concurrent poll calls
//! without letting one job's wait stall another's progress. A stop signal
//! halts polling promptly and leaves every job at a consistent snapshot.

use crate::config::BatchConfig;
use crate::error::Result;
use crate::models::ShardId;
use crate::orchestration::registry::JobRegistry;
use crate::orchestration::stop::StopSignal;
use crate::service::{ClassificationService, JobHandle, PollSnapshot, RemoteStatus};
use crate::state_machine::{JobEvent, JobState};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

pub struct JobMonitor {
    service: Arc<dyn ClassificationService>,
    registry: Arc<JobRegistry>,
    stop: Arc<StopSignal>,
    config: BatchConfig,
}

impl JobMonitor {
    pub fn new(
        service: Arc<dyn ClassificationService>,
        registry: Arc<JobRegistry>,
        stop: Arc<StopSignal>,
        config: BatchConfig,
    ) -> Self {
        Self {
            service,
            registry,
            stop,
            config,
        }
    }

    /// Poll every outstanding job until it is terminal, expired, or a stop
    /// is requested. Job state after return is whatever the registry holds;
    /// cancellation never tears a job record.
    pub async fn run(&self) -> Result<()> {
        let outstanding = self.registry.outstanding();
        if outstanding.is_empty() {
            debug!("no outstanding jobs to monitor");
            return Ok(());
        }

        info!(jobs = outstanding.len(), "monitoring outstanding jobs");
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_polls));

        let mut tasks = Vec::with_capacity(outstanding.len());
        for (shard_id, handle) in outstanding {
            let service = self.service.clone();
            let registry = self.registry.clone();
            let stop = self.stop.clone();
            let config = self.config.clone();
            let semaphore = semaphore.clone();

            tasks.push(tokio::spawn(async move {
                poll_until_terminal(service, registry, stop, config, semaphore, shard_id, handle)
                    .await
            }));
        }

        for joined in futures::future::join_all(tasks).await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(error = %err, "poll task ended with error"),
                Err(err) => error!(error = %err, "poll task panicked"),
            }
        }

        let summary = self.registry.status_summary();
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            expired = summary.expired,
            unresolved = summary.pending + summary.running,
            "monitoring finished"
        );
        Ok(())
    }
}

/// One job's poll loop. The semaphore permit covers the poll call only, so
/// backoff sleeps never starve other jobs of poll slots.
async fn poll_until_terminal(
    service: Arc<dyn ClassificationService>,
    registry: Arc<JobRegistry>,
    stop: Arc<StopSignal>,
    config: BatchConfig,
    semaphore: Arc<Semaphore>,
    shard_id: ShardId,
    handle: JobHandle,
) -> Result<()> {
    let deadline = Instant::now() + config.max_job_wait;
    let mut interval = config.poll_initial_interval;

    loop {
        if stop.is_stopped() {
            debug!(shard_id = %shard_id, "stop requested, leaving job at current state");
            return Ok(());
        }

        if Instant::now() >= deadline {
            let reason = format!(
                "no terminal answer within {}s",
                config.max_job_wait.as_secs()
            );
            warn!(shard_id = %shard_id, handle = %handle, "job expired locally");
            registry.apply_event(shard_id, JobEvent::Expire(reason))?;
            return Ok(());
        }

        let poll_result = {
            let _permit = semaphore
                .acquire()
                .await
                .expect("poll semaphore is never closed");
            service.poll(&handle).await
        };

        match poll_result {
            Ok(snapshot) => {
                if apply_snapshot(&registry, shard_id, snapshot)? {
                    return Ok(());
                }
            }
            Err(err) if err.is_transient() => {
                warn!(
                    shard_id = %shard_id,
                    handle = %handle,
                    error = %err,
                    "transient poll error, will poll again"
                );
            }
            Err(err) => {
                warn!(shard_id = %shard_id, handle = %handle, error = %err, "poll failed permanently");
                ensure_running(&registry, shard_id)?;
                registry.apply_event(shard_id, JobEvent::fail_with_error(err.to_string()))?;
                return Ok(());
            }
        }

        let mut sleep_for = interval;
        if config.jitter {
            sleep_for = sleep_for.mul_f64(1.0 + fastrand::f64() * 0.1);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        sleep_for = sleep_for.min(remaining);

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            _ = stop.cancelled() => {
                debug!(shard_id = %shard_id, "stop requested during poll backoff");
                return Ok(());
            }
        }

        interval = interval
            .mul_f64(config.poll_backoff_multiplier)
            .min(config.poll_max_interval);
    }
}

/// Map one remote snapshot onto the local state machine. Returns true when
/// the job reached a terminal state.
fn apply_snapshot(
    registry: &JobRegistry,
    shard_id: ShardId,
    snapshot: PollSnapshot,
) -> Result<bool> {
    match snapshot.status {
        RemoteStatus::Validating => Ok(false),
        RemoteStatus::InProgress | RemoteStatus::Finalizing => {
            ensure_running(registry, shard_id)?;
            Ok(false)
        }
        RemoteStatus::Completed => {
            ensure_running(registry, shard_id)?;
            let output = snapshot.output.unwrap_or_default();
            registry.apply_event(shard_id, JobEvent::Succeed(output))?;
            info!(shard_id = %shard_id, "job succeeded");
            Ok(true)
        }
        RemoteStatus::Failed | RemoteStatus::Cancelled => {
            let reason = snapshot
                .error
                .unwrap_or_else(|| "service reported failure without detail".to_string());
            ensure_running(registry, shard_id)?;
            registry.apply_event(shard_id, JobEvent::Fail(reason))?;
            Ok(true)
        }
        RemoteStatus::Expired => {
            ensure_running(registry, shard_id)?;
            registry.apply_event(
                shard_id,
                JobEvent::Expire("service completion window elapsed".to_string()),
            )?;
            Ok(true)
        }
    }
}

/// Transitions within a job are monotonic and sequential: a job observed
/// straight at a terminal remote status still passes through running first.
fn ensure_running(registry: &JobRegistry, shard_id: ShardId) -> Result<()> {
    if let Some(job) = registry.get(shard_id) {
        if job.state == JobState::Pending {
            registry.apply_event(shard_id, JobEvent::Start)?;
        }
    }
    Ok(())
}
