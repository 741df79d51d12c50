//! # Batch Runner
//!
//! Owns the shared pieces of one run — configuration, job registry, service
//! handle, stop signal — and drives the pipeline end to end: chunk, build,
//! submit, monitor, reconcile. Per-job failures are logged and reflected in
//! the result set; only configuration problems, oversized payloads, and
//! internal invariant violations abort the run.

use crate::config::BatchConfig;
use crate::error::{ChargenError, Result};
use crate::models::{Record, RecordSet, ResultSet, ShardId};
use crate::orchestration::builder::{build_payload, ItemMapping, RequestTemplate};
use crate::orchestration::chunker::chunk;
use crate::orchestration::monitor::JobMonitor;
use crate::orchestration::reconciler::ResultReconciler;
use crate::orchestration::registry::{JobRegistry, StatusSummary};
use crate::orchestration::stop::StopSignal;
use crate::orchestration::submitter::JobSubmitter;
use crate::service::ClassificationService;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct BatchRunner {
    config: BatchConfig,
    template: RequestTemplate,
    service: Arc<dyn ClassificationService>,
    registry: Arc<JobRegistry>,
    stop: Arc<StopSignal>,
    run_id: Uuid,
}

impl BatchRunner {
    /// Validate the configuration and assemble a runner. Fails fast before
    /// any shard exists or any submission happens.
    pub fn new(
        config: BatchConfig,
        template: RequestTemplate,
        service: Arc<dyn ClassificationService>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            template,
            service,
            registry: Arc::new(JobRegistry::new()),
            stop: Arc::new(StopSignal::new()),
            run_id: Uuid::new_v4(),
        })
    }

    /// The stop signal for this run; share it with whatever decides to
    /// cancel (signal handler, deadline, operator).
    pub fn stop_signal(&self) -> Arc<StopSignal> {
        self.stop.clone()
    }

    /// The job registry for this run, for status inspection.
    pub fn registry(&self) -> Arc<JobRegistry> {
        self.registry.clone()
    }

    /// Counts of this run's jobs grouped by state.
    pub fn status_summary(&self) -> StatusSummary {
        self.registry.status_summary()
    }

    /// Run the full pipeline and return one entry per input record, in
    /// input order.
    ///
    /// `PayloadTooLarge` aborts before any submission: re-run with a
    /// smaller `max_shard_size`. Submission failures downgrade their job
    /// and keep the run going; the affected records come back as missing.
    pub async fn run(&self, records: Vec<Record>) -> Result<ResultSet> {
        let record_set = RecordSet::new(records, self.config.duplicate_policy)?;
        let shards: Vec<_> =
            chunk(record_set.records(), self.config.max_shard_size)?.collect();

        info!(
            run_id = %self.run_id,
            records = record_set.len(),
            shards = shards.len(),
            max_shard_size = self.config.max_shard_size,
            "starting batch run"
        );

        // Build every payload before submitting anything so an oversized
        // shard aborts the run while it is still free of side effects.
        let mut payloads = Vec::with_capacity(shards.len());
        let mut mappings: HashMap<ShardId, ItemMapping> = HashMap::with_capacity(shards.len());
        for shard in &shards {
            let payload = build_payload(shard, &self.template, self.config.max_payload_bytes)?;
            mappings.insert(shard.id, payload.mapping.clone());
            payloads.push(payload);
        }

        let submitter = JobSubmitter::new(
            self.service.clone(),
            self.registry.clone(),
            self.stop.clone(),
            self.config.clone(),
        );
        for payload in &payloads {
            match submitter.submit_shard(payload).await {
                Ok(_) => {}
                Err(err @ ChargenError::Submission { .. }) => {
                    // Already reflected in the registry as a failed job.
                    warn!(run_id = %self.run_id, error = %err, "continuing after submission failure");
                }
                Err(err) => return Err(err),
            }
        }

        let monitor = JobMonitor::new(
            self.service.clone(),
            self.registry.clone(),
            self.stop.clone(),
            self.config.clone(),
        );
        monitor.run().await?;

        let jobs = self.registry.snapshot();
        let result = ResultReconciler::reconcile(record_set.records(), &mappings, &jobs)?;

        let counts = result.counts();
        info!(
            run_id = %self.run_id,
            classified = counts.classified,
            errors = counts.error,
            missing = counts.missing,
            "batch run reconciled"
        );
        Ok(result)
    }
}
