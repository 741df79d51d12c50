//! # Job Submitter
//!
//! Hands serialized payloads to the external service. Transient failures
//! are retried with exponential backoff and jitter up to a bounded attempt
//! count; exhaustion downgrades the job to failed locally and surfaces the
//! error without touching sibling jobs. Submission is idempotent over shard
//! content: a shard whose hash is already registered is not submitted twice.

use crate::config::BatchConfig;
use crate::error::{ChargenError, Result};
use crate::models::Job;
use crate::orchestration::builder::JobPayload;
use crate::orchestration::registry::JobRegistry;
use crate::orchestration::stop::StopSignal;
use crate::service::ClassificationService;
use crate::state_machine::JobEvent;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct JobSubmitter {
    service: Arc<dyn ClassificationService>,
    registry: Arc<JobRegistry>,
    stop: Arc<StopSignal>,
    config: BatchConfig,
}

impl JobSubmitter {
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

    /// Submit one payload, returning the registered job snapshot.
    ///
    /// Re-submitting a payload whose content hash is already registered
    /// returns the existing job without another service call. On retry
    /// exhaustion the job is marked failed and a `Submission` error is
    /// returned; the caller logs it and keeps going with other shards.
    pub async fn submit_shard(&self, payload: &JobPayload) -> Result<Job> {
        // Reserve the hash before the first network call; a concurrent or
        // repeated submission of the same content lands on the existing job.
        let fresh = Job::new(payload.shard_id, payload.content_hash.clone());
        if !self.registry.try_reserve(fresh) {
            let existing_id = self
                .registry
                .find_by_hash(&payload.content_hash)
                .ok_or_else(|| {
                    ChargenError::reconciliation("hash index entry vanished during reservation")
                })?;
            debug!(
                shard_id = %payload.shard_id,
                existing_shard_id = %existing_id,
                "shard content already registered, reusing existing job"
            );
            return self.registry.get(existing_id).ok_or_else(|| {
                ChargenError::reconciliation(format!(
                    "hash index points at unregistered shard {existing_id}"
                ))
            });
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            if self.stop.is_stopped() {
                return self.fail_job(payload, attempt, "stopped before submission");
            }

            match self.service.submit(&payload.body).await {
                Ok(handle) => {
                    info!(
                        shard_id = %payload.shard_id,
                        handle = %handle,
                        attempt = attempt,
                        records = payload.mapping.record_count(),
                        "job submitted"
                    );
                    self.registry
                        .record_submission(payload.shard_id, handle, Utc::now());
                    return self.registry.get(payload.shard_id).ok_or_else(|| {
                        ChargenError::reconciliation(format!(
                            "job for shard {} vanished after submission",
                            payload.shard_id
                        ))
                    });
                }
                Err(err) if err.is_transient() && attempt < self.config.max_submit_attempts => {
                    let delay = self.retry_delay(attempt);
                    warn!(
                        shard_id = %payload.shard_id,
                        attempt = attempt,
                        max_attempts = self.config.max_submit_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient submission error, backing off"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.stop.cancelled() => {
                            return self.fail_job(payload, attempt, "stopped during submission backoff");
                        }
                    }
                }
                Err(err) => {
                    return self.fail_job(payload, attempt, &err.to_string());
                }
            }
        }
    }

    /// Downgrade the job locally and surface the failure to the caller.
    fn fail_job(&self, payload: &JobPayload, attempts: u32, reason: &str) -> Result<Job> {
        warn!(
            shard_id = %payload.shard_id,
            attempts = attempts,
            reason = reason,
            "submission failed, job downgraded"
        );
        self.registry
            .apply_event(payload.shard_id, JobEvent::fail_with_error(reason))?;
        Err(ChargenError::Submission {
            shard_id: payload.shard_id.0,
            attempts,
            message: reason.to_string(),
        })
    }

    /// Exponential backoff with cap and optional jitter.
    fn retry_delay(&self, attempt: u32) -> Duration {
        let base = self.config.submit_base_delay;
        let max = self.config.submit_max_delay;

        let delay = base.mul_f64(2f64.powi(attempt.saturating_sub(1) as i32));
        let delay = delay.min(max);

        if self.config.jitter {
            let jitter = fastrand::f64() * 0.1;
            delay.mul_f64(1.0 + jitter).min(max)
        } else {
            delay
        }
    }
}
