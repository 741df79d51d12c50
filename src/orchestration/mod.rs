//! # Batch Orchestration
//!
//! The five components of the pipeline, left to right: chunker, builder,
//! submitter, monitor, reconciler — plus the registry they share and the
//! runner that wires one run together. Data flows through once; only the
//! monitor loops.

pub mod builder;
pub mod chunker;
pub mod core;
pub mod monitor;
pub mod reconciler;
pub mod registry;
pub mod stop;
pub mod submitter;

pub use builder::{build_payload, content_hash, ItemMapping, JobPayload, RequestTemplate};
pub use chunker::chunk;
pub use core::BatchRunner;
pub use monitor::JobMonitor;
pub use reconciler::ResultReconciler;
pub use registry::{JobRegistry, StatusSummary};
pub use stop::StopSignal;
pub use submitter::JobSubmitter;
