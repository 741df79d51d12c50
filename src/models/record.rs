use crate::error::{ChargenError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Stable record identifier, e.g. a SKU.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One input row: a unique identifier plus the free-text description to be
/// classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub text: String,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Policy for duplicate record identifiers in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Reject the whole input on the first duplicate identifier.
    #[default]
    Reject,
    /// Keep the first occurrence, drop later ones.
    MergeFirstWins,
}

/// An ordered record collection with identifier uniqueness enforced.
#[derive(Debug, Clone)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    /// Validate and build a record set according to the duplicate policy.
    pub fn new(records: Vec<Record>, policy: DuplicatePolicy) -> Result<Self> {
        let mut seen: HashSet<RecordId> = HashSet::with_capacity(records.len());
        let mut deduped = Vec::with_capacity(records.len());

        for record in records {
            if seen.contains(&record.id) {
                match policy {
                    DuplicatePolicy::Reject => {
                        return Err(ChargenError::DuplicateRecord {
                            id: record.id.to_string(),
                        })
                    }
                    DuplicatePolicy::MergeFirstWins => {
                        debug!(id = %record.id, "dropping duplicate record, first occurrence wins");
                        continue;
                    }
                }
            }
            seen.insert(record.id.clone());
            deduped.push(record);
        }

        Ok(Self { records: deduped })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
