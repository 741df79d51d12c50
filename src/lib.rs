#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Chargen Core
//!
//! Async batch-submission and reconciliation core for bulk classification
//! jobs ("Chargen": production lots). The crate partitions a large, ordered
//! record set into bounded-size shards, submits each as one job to an
//! external batch-classification service, polls the jobs concurrently until
//! every one is terminal, and reassembles a complete, order-preserving
//! result set keyed by the records' stable identifiers.
//!
//! The classification itself happens outside this crate: the service is an
//! abstract capability with two operations (submit a payload, poll a
//! handle), and spreadsheet loading/export are the caller's concern. What
//! this crate owns is the orchestration — chunking, idempotent submission
//! with retries, the per-job state machine with backoff and expiry, and the
//! guarantee that every input record is accounted for in the output, even
//! if only as missing.
//!
//! ## Module Organization
//!
//! - [`models`] - Records, shards, jobs and result entries
//! - [`state_machine`] - Job lifecycle states, events and transitions
//! - [`service`] - The external service boundary
//! - [`orchestration`] - Chunker, builder, submitter, monitor, reconciler
//! - [`config`] - Run tunables with validation
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chargen_core::config::BatchConfig;
//! use chargen_core::models::Record;
//! use chargen_core::orchestration::{BatchRunner, RequestTemplate};
//! use chargen_core::service::ClassificationService;
//! use std::sync::Arc;
//!
//! # async fn example(service: Arc<dyn ClassificationService>) -> anyhow::Result<()> {
//! let config = BatchConfig::default();
//! let template = RequestTemplate::new("Klassifiziere jeden Artikel.", "gpt-4o-mini");
//! let runner = BatchRunner::new(config, template, service)?;
//!
//! let records = vec![
//!     Record::new("SKU1", "Winkelschleifer 125mm"),
//!     Record::new("SKU2", "Spiralbohrer Set"),
//! ];
//! let results = runner.run(records).await?;
//! for entry in results.entries() {
//!     println!("{} -> {:?} ({})", entry.id, entry.label, entry.status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod service;
pub mod state_machine;

pub use config::BatchConfig;
pub use error::{ChargenError, Result};
pub use models::{
    DuplicatePolicy, EntryStatus, Job, JobOutcome, Record, RecordId, RecordSet, ResultEntry,
    ResultSet, Shard, ShardId, StatusCounts,
};
pub use orchestration::{BatchRunner, JobRegistry, RequestTemplate, StopSignal};
pub use service::{ClassificationService, JobHandle, PollSnapshot, RemoteStatus, ServiceError};
pub use state_machine::{JobEvent, JobState, JobStateMachine};
