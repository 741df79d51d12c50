use super::record::{Record, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Final status of one input record after reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// A label was assigned by the service.
    Classified,
    /// The record reached the service but its answer could not be used.
    Error,
    /// No usable answer covered this record (job failed, expired, or the
    /// identifier was absent from the output).
    Missing,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classified => write!(f, "classified"),
            Self::Error => write!(f, "error"),
            Self::Missing => write!(f, "missing"),
        }
    }
}

/// One reconciled output row. Constructed only by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub id: RecordId,
    pub label: Option<String>,
    pub status: EntryStatus,
    /// Failure or parse reason for non-classified entries.
    pub reason: Option<String>,
}

impl ResultEntry {
    pub fn classified(id: RecordId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: Some(label.into()),
            status: EntryStatus::Classified,
            reason: None,
        }
    }

    pub fn error(id: RecordId, reason: impl Into<String>) -> Self {
        Self {
            id,
            label: None,
            status: EntryStatus::Error,
            reason: Some(reason.into()),
        }
    }

    pub fn missing(id: RecordId, reason: impl Into<String>) -> Self {
        Self {
            id,
            label: None,
            status: EntryStatus::Missing,
            reason: Some(reason.into()),
        }
    }
}

/// Counts of entries by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub classified: usize,
    pub error: usize,
    pub missing: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.classified + self.error + self.missing
    }
}

/// The ordered, complete result of a run: exactly one entry per input
/// record, in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSet {
    entries: Vec<ResultEntry>,
}

impl ResultSet {
    pub fn new(entries: Vec<ResultEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for entry in &self.entries {
            match entry.status {
                EntryStatus::Classified => counts.classified += 1,
                EntryStatus::Error => counts.error += 1,
                EntryStatus::Missing => counts.missing += 1,
            }
        }
        counts
    }

    /// The sub-sequence of `originals` whose entries did not end up
    /// classified, in original order. Feeding these back through another
    /// run reprocesses exactly the unanswered records.
    pub fn missing_records(&self, originals: &[Record]) -> Vec<Record> {
        let status_by_id: HashMap<&RecordId, EntryStatus> = self
            .entries
            .iter()
            .map(|entry| (&entry.id, entry.status))
            .collect();

        originals
            .iter()
            .filter(|record| {
                status_by_id
                    .get(&record.id)
                    .map_or(true, |status| *status != EntryStatus::Classified)
            })
            .cloned()
            .collect()
    }
}
