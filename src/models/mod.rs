//! # Domain Models
//!
//! Data-only types for the batch core: input records, shards, jobs and
//! reconciled result entries. Components exchange these as immutable
//! snapshots; mutation is confined to the owning component.

pub mod job;
pub mod record;
pub mod result_entry;
pub mod shard;

pub use job::{Job, JobOutcome};
pub use record::{DuplicatePolicy, Record, RecordId, RecordSet};
pub use result_entry::{EntryStatus, ResultEntry, ResultSet, StatusCounts};
pub use shard::{Shard, ShardId};
