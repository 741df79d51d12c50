//! # Job Builder
//!
//! Turns one shard into a serialized batch payload: a JSON-lines body whose
//! lines each carry a bounded group of records under a `custom_id`, plus the
//! mapping from every payload position back to its record identifier. The
//! mapping is bijective over the shard by construction and is the only piece
//! of the shard retained after submission.

use crate::error::{ChargenError, Result};
use crate::models::{RecordId, Shard, ShardId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Fixed instructions plus the per-item formatting rule for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTemplate {
    /// Instruction block sent with every request line.
    pub instructions: String,
    /// Model identifier forwarded to the service.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion-token ceiling per request line.
    pub max_completion_tokens: u32,
    /// How many records are grouped into a single request line.
    pub items_per_request: usize,
}

impl RequestTemplate {
    pub fn new(instructions: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            model: model.into(),
            temperature: 0.2,
            max_completion_tokens: 16_000,
            items_per_request: 40,
        }
    }
}

/// Mapping from request line (`custom_id`) and position to record
/// identifiers, in payload order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMapping {
    entries: Vec<(String, Vec<RecordId>)>,
}

impl ItemMapping {
    /// All mapped identifiers in payload order.
    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.entries.iter().flat_map(|(_, ids)| ids.iter())
    }

    /// Identifiers expected under one request line.
    pub fn expected_for(&self, custom_id: &str) -> Option<&[RecordId]> {
        self.entries
            .iter()
            .find(|(id, _)| id == custom_id)
            .map(|(_, ids)| ids.as_slice())
    }

    /// Request line ids in payload order.
    pub fn custom_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn record_count(&self) -> usize {
        self.entries.iter().map(|(_, ids)| ids.len()).sum()
    }

    /// True when the mapping covers exactly the shard's records, each once.
    pub fn is_bijection_over(&self, shard: &Shard) -> bool {
        let mapped: Vec<&RecordId> = self.ids().collect();
        if mapped.len() != shard.len() {
            return false;
        }
        let unique: HashSet<&RecordId> = mapped.iter().copied().collect();
        if unique.len() != mapped.len() {
            return false;
        }
        shard.records.iter().all(|r| unique.contains(&r.id))
    }
}

/// Serialized payload for one job, ready for submission.
#[derive(Debug, Clone)]
pub struct JobPayload {
    pub shard_id: ShardId,
    /// JSON-lines body handed to the service verbatim.
    pub body: String,
    pub mapping: ItemMapping,
    /// SHA-256 over shard content, the submission idempotency key.
    pub content_hash: String,
}

#[derive(Serialize)]
struct WireItem<'a> {
    id: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireBody<'a> {
    model: &'a str,
    temperature: f64,
    max_completion_tokens: u32,
    messages: [WireMessage<'a>; 2],
}

#[derive(Serialize)]
struct WireRequestLine<'a> {
    custom_id: &'a str,
    method: &'static str,
    url: &'static str,
    body: WireBody<'a>,
}

/// Deterministic content hash over the shard's `(id, text)` pairs in order.
pub fn content_hash(shard: &Shard) -> String {
    let mut hasher = Sha256::new();
    for record in &shard.records {
        hasher.update(record.id.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(record.text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Build the serialized payload and identifier mapping for one shard.
///
/// Fails with `PayloadTooLarge` if the body exceeds `max_payload_bytes`;
/// the caller re-chunks with a smaller shard size, nothing is truncated
/// here.
pub fn build_payload(
    shard: &Shard,
    template: &RequestTemplate,
    max_payload_bytes: usize,
) -> Result<JobPayload> {
    let items_per_request = template.items_per_request.max(1);
    let mut lines = Vec::new();
    let mut entries = Vec::new();

    for (request_index, group) in shard.records.chunks(items_per_request).enumerate() {
        let custom_id = format!("shard_{}_req_{}", shard.id, request_index);

        let items: Vec<WireItem<'_>> = group
            .iter()
            .map(|record| WireItem {
                id: record.id.as_str(),
                text: &record.text,
            })
            .collect();
        let user_content = serde_json::to_string(&items)
            .map_err(|e| ChargenError::reconciliation(format!("item serialization: {e}")))?;

        let line = WireRequestLine {
            custom_id: &custom_id,
            method: "POST",
            url: "/v1/chat/completions",
            body: WireBody {
                model: &template.model,
                temperature: template.temperature,
                max_completion_tokens: template.max_completion_tokens,
                messages: [
                    WireMessage {
                        role: "system",
                        content: &template.instructions,
                    },
                    WireMessage {
                        role: "user",
                        content: &user_content,
                    },
                ],
            },
        };
        lines.push(
            serde_json::to_string(&line)
                .map_err(|e| ChargenError::reconciliation(format!("line serialization: {e}")))?,
        );

        entries.push((custom_id, group.iter().map(|r| r.id.clone()).collect()));
    }

    let body = lines.join("\n");
    if body.len() > max_payload_bytes {
        return Err(ChargenError::PayloadTooLarge {
            shard_id: shard.id.0,
            size_bytes: body.len(),
            limit_bytes: max_payload_bytes,
        });
    }

    Ok(JobPayload {
        shard_id: shard.id,
        body,
        mapping: ItemMapping { entries },
        content_hash: content_hash(shard),
    })
}
