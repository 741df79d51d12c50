//! # Result Reconciler
//!
//! Folds every terminal job back into one ordered result set covering the
//! original records exactly. Succeeded jobs are parsed through the item
//! mapping; identifiers the output does not answer become missing entries,
//! never silent gaps. Failed and expired jobs mark their whole shard
//! missing with the captured reason. Model output is parsed tolerantly:
//! markdown fences are stripped and the outermost JSON array is extracted
//! before giving up on a line.

use crate::error::{ChargenError, Result};
use crate::models::{Job, Record, RecordId, ResultEntry, ResultSet, ShardId};
use crate::orchestration::builder::ItemMapping;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// One line of a succeeded job's output payload.
#[derive(Debug, Deserialize)]
struct OutputLine {
    custom_id: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabeledItem {
    id: String,
    label: String,
}

pub struct ResultReconciler;

impl ResultReconciler {
    /// Assemble one entry per original record, in original order.
    ///
    /// Every shard that produced a mapping must have a job and vice versa;
    /// anything else is a coverage violation reported as
    /// `ReconciliationError`.
    pub fn reconcile(
        records: &[Record],
        mappings: &HashMap<ShardId, ItemMapping>,
        jobs: &[Job],
    ) -> Result<ResultSet> {
        let jobs_by_shard: HashMap<ShardId, &Job> =
            jobs.iter().map(|job| (job.shard_id, job)).collect();

        for shard_id in mappings.keys() {
            if !jobs_by_shard.contains_key(shard_id) {
                return Err(ChargenError::reconciliation(format!(
                    "shard {shard_id} has a mapping but no job"
                )));
            }
        }
        for job in jobs {
            if !mappings.contains_key(&job.shard_id) {
                return Err(ChargenError::reconciliation(format!(
                    "job for shard {} has no mapping",
                    job.shard_id
                )));
            }
        }

        let mut outcomes: HashMap<RecordId, ResultEntry> = HashMap::with_capacity(records.len());
        for job in jobs {
            let mapping = &mappings[&job.shard_id];
            match (job.output(), job.failure_reason()) {
                (Some(output), _) => {
                    Self::collect_succeeded(job.shard_id, output, mapping, &mut outcomes);
                }
                (None, Some(reason)) => {
                    for id in mapping.ids() {
                        outcomes.insert(id.clone(), ResultEntry::missing(id.clone(), reason));
                    }
                }
                (None, None) => {
                    // Unresolved after a cancelled run: account for the
                    // shard rather than dropping it.
                    let reason = format!(
                        "job still {} when results were assembled",
                        job.state
                    );
                    for id in mapping.ids() {
                        outcomes
                            .insert(id.clone(), ResultEntry::missing(id.clone(), reason.as_str()));
                    }
                }
            }
        }

        let entries: Vec<ResultEntry> = records
            .iter()
            .map(|record| {
                outcomes.remove(&record.id).unwrap_or_else(|| {
                    ResultEntry::missing(record.id.clone(), "no job covered this identifier")
                })
            })
            .collect();

        Ok(ResultSet::new(entries))
    }

    /// Parse one succeeded job's JSONL output through its mapping.
    fn collect_succeeded(
        shard_id: ShardId,
        output: &str,
        mapping: &ItemMapping,
        outcomes: &mut HashMap<RecordId, ResultEntry>,
    ) {
        let mut lines_by_custom_id: HashMap<&str, &str> = HashMap::new();
        let mut parsed_lines: Vec<OutputLine> = Vec::new();
        for (line_number, line) in output.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<OutputLine>(line) {
                Ok(parsed) => parsed_lines.push(parsed),
                Err(err) => {
                    warn!(
                        shard_id = %shard_id,
                        line = line_number + 1,
                        error = %err,
                        "skipping unparseable output line"
                    );
                }
            }
        }
        for parsed in &parsed_lines {
            lines_by_custom_id.insert(
                parsed.custom_id.as_str(),
                parsed.content.as_deref().unwrap_or_default(),
            );
        }
        let errors_by_custom_id: HashMap<&str, &str> = parsed_lines
            .iter()
            .filter_map(|line| {
                line.error
                    .as_deref()
                    .map(|err| (line.custom_id.as_str(), err))
            })
            .collect();

        for custom_id in mapping.custom_ids() {
            let expected = mapping
                .expected_for(custom_id)
                .expect("custom_ids and entries come from the same mapping");

            if let Some(error) = errors_by_custom_id.get(custom_id) {
                for id in expected {
                    outcomes.insert(
                        id.clone(),
                        ResultEntry::error(id.clone(), format!("service error: {error}")),
                    );
                }
                continue;
            }

            let Some(content) = lines_by_custom_id.get(custom_id) else {
                for id in expected {
                    outcomes.insert(
                        id.clone(),
                        ResultEntry::missing(id.clone(), "request line absent from job output"),
                    );
                }
                continue;
            };

            match parse_labels(content) {
                Ok(items) => {
                    let mut labels: HashMap<&str, &str> = HashMap::new();
                    for item in &items {
                        // First answer wins for a duplicated identifier.
                        labels.entry(item.id.as_str()).or_insert(item.label.as_str());
                    }
                    for id in expected {
                        match labels.get(id.as_str()) {
                            Some(label) => {
                                outcomes.insert(
                                    id.clone(),
                                    ResultEntry::classified(id.clone(), *label),
                                );
                            }
                            None => {
                                outcomes.insert(
                                    id.clone(),
                                    ResultEntry::missing(
                                        id.clone(),
                                        "identifier absent from job output",
                                    ),
                                );
                            }
                        }
                    }
                    let expected_count = expected.len();
                    if items.len() != expected_count {
                        debug!(
                            shard_id = %shard_id,
                            custom_id = custom_id,
                            expected = expected_count,
                            answered = items.len(),
                            "output item count differs from request"
                        );
                    }
                }
                Err(reason) => {
                    for id in expected {
                        outcomes
                            .insert(id.clone(), ResultEntry::error(id.clone(), reason.as_str()));
                    }
                }
            }
        }
    }
}

/// Strip markdown code fences the model sometimes wraps around its answer.
fn clean_content(content: &str) -> String {
    let mut cleaned = content.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.replace("```", "").trim().to_string()
}

/// The outermost JSON array in otherwise noisy content.
fn extract_json_array(content: &str) -> Option<&str> {
    let start = content.find('[')?;
    let end = content.rfind(']')?;
    (start < end).then(|| &content[start..=end])
}

/// Parse labeled items out of model content, tolerating fenced or prefixed
/// answers. Items without the expected fields are dropped with a warning.
fn parse_labels(content: &str) -> std::result::Result<Vec<LabeledItem>, String> {
    let cleaned = clean_content(content);
    if cleaned.is_empty() {
        return Err("empty response content".to_string());
    }

    let value: serde_json::Value = match serde_json::from_str(&cleaned) {
        Ok(value) => value,
        Err(_) => {
            let array = extract_json_array(&cleaned)
                .ok_or_else(|| "no JSON array found in response content".to_string())?;
            serde_json::from_str(array)
                .map_err(|err| format!("unparseable response content: {err}"))?
        }
    };

    let items = match value {
        serde_json::Value::Array(items) => items,
        object @ serde_json::Value::Object(_) => vec![object],
        other => return Err(format!("unexpected response shape: {other}")),
    };

    let mut labeled = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<LabeledItem>(item.clone()) {
            Ok(parsed) => labeled.push(parsed),
            Err(_) => {
                warn!(item = %item, "dropping output item without id/label fields");
            }
        }
    }
    Ok(labeled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryStatus, Shard, ShardId};
    use crate::orchestration::builder::{build_payload, RequestTemplate};
    use crate::state_machine::{JobEvent, JobStateMachine};
    use proptest::prelude::*;

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::new(format!("SKU{i}"), format!("Artikel {i}")))
            .collect()
    }

    fn mapping_for(shard: &Shard) -> ItemMapping {
        let template = RequestTemplate::new("Klassifiziere.", "gpt-4o-mini");
        build_payload(shard, &template, usize::MAX).unwrap().mapping
    }

    fn succeeded_job(shard_id: ShardId, output: &str) -> Job {
        let mut job = Job::new(shard_id, format!("hash-{shard_id}"));
        JobStateMachine::apply(&mut job, JobEvent::Start).unwrap();
        JobStateMachine::apply(&mut job, JobEvent::Succeed(output.to_string())).unwrap();
        job
    }

    fn output_line(custom_id: &str, content: &str) -> String {
        serde_json::json!({ "custom_id": custom_id, "content": content }).to_string()
    }

    #[test]
    fn test_labels_assigned_through_mapping() {
        let input = records(2);
        let shard = Shard::new(ShardId(0), input.clone());
        let mappings = HashMap::from([(ShardId(0), mapping_for(&shard))]);

        let content = r#"[{"id":"SKU0","label":"Bohrer"},{"id":"SKU1","label":"Kleber"}]"#;
        let jobs = vec![succeeded_job(ShardId(0), &output_line("shard_0_req_0", content))];

        let result = ResultReconciler::reconcile(&input, &mappings, &jobs).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.entries()[0].label.as_deref(), Some("Bohrer"));
        assert_eq!(result.entries()[1].label.as_deref(), Some("Kleber"));
        assert!(result
            .entries()
            .iter()
            .all(|e| e.status == EntryStatus::Classified));
    }

    #[test]
    fn test_fenced_content_is_tolerated() {
        let input = records(1);
        let shard = Shard::new(ShardId(0), input.clone());
        let mappings = HashMap::from([(ShardId(0), mapping_for(&shard))]);

        let content = "```json\n[{\"id\":\"SKU0\",\"label\":\"Trennscheibe\"}]\n```";
        let jobs = vec![succeeded_job(ShardId(0), &output_line("shard_0_req_0", content))];

        let result = ResultReconciler::reconcile(&input, &mappings, &jobs).unwrap();
        assert_eq!(result.entries()[0].label.as_deref(), Some("Trennscheibe"));
    }

    #[test]
    fn test_prefixed_array_is_extracted() {
        let input = records(1);
        let shard = Shard::new(ShardId(0), input.clone());
        let mappings = HashMap::from([(ShardId(0), mapping_for(&shard))]);

        let content = r#"Hier ist das Ergebnis: [{"id":"SKU0","label":"Schraube"}] Gruss"#;
        let jobs = vec![succeeded_job(ShardId(0), &output_line("shard_0_req_0", content))];

        let result = ResultReconciler::reconcile(&input, &mappings, &jobs).unwrap();
        assert_eq!(result.entries()[0].label.as_deref(), Some("Schraube"));
    }

    #[test]
    fn test_unanswered_identifier_becomes_missing() {
        let input = records(2);
        let shard = Shard::new(ShardId(0), input.clone());
        let mappings = HashMap::from([(ShardId(0), mapping_for(&shard))]);

        // Output only answers SKU0.
        let content = r#"[{"id":"SKU0","label":"Bohrer"}]"#;
        let jobs = vec![succeeded_job(ShardId(0), &output_line("shard_0_req_0", content))];

        let result = ResultReconciler::reconcile(&input, &mappings, &jobs).unwrap();
        assert_eq!(result.entries()[0].status, EntryStatus::Classified);
        assert_eq!(result.entries()[1].status, EntryStatus::Missing);
        assert_eq!(
            result.entries()[1].reason.as_deref(),
            Some("identifier absent from job output")
        );
    }

    #[test]
    fn test_unparseable_content_marks_line_errored() {
        let input = records(1);
        let shard = Shard::new(ShardId(0), input.clone());
        let mappings = HashMap::from([(ShardId(0), mapping_for(&shard))]);

        let jobs = vec![succeeded_job(
            ShardId(0),
            &output_line("shard_0_req_0", "keine Antwort"),
        )];

        let result = ResultReconciler::reconcile(&input, &mappings, &jobs).unwrap();
        assert_eq!(result.entries()[0].status, EntryStatus::Error);
    }

    #[test]
    fn test_failed_job_marks_whole_shard_missing_with_reason() {
        let input = records(3);
        let shard = Shard::new(ShardId(0), input.clone());
        let mappings = HashMap::from([(ShardId(0), mapping_for(&shard))]);

        let mut job = Job::new(ShardId(0), "hash".to_string());
        JobStateMachine::apply(&mut job, JobEvent::fail_with_error("rate limited")).unwrap();

        let result = ResultReconciler::reconcile(&input, &mappings, &[job]).unwrap();
        assert_eq!(result.len(), 3);
        for entry in result.entries() {
            assert_eq!(entry.status, EntryStatus::Missing);
            assert_eq!(entry.reason.as_deref(), Some("rate limited"));
        }
    }

    #[test]
    fn test_missing_job_for_shard_is_a_coverage_violation() {
        let input = records(2);
        let shard = Shard::new(ShardId(0), input.clone());
        let mappings = HashMap::from([(ShardId(0), mapping_for(&shard))]);

        let err = ResultReconciler::reconcile(&input, &mappings, &[]).unwrap_err();
        assert!(matches!(err, ChargenError::Reconciliation { .. }));
    }

    proptest! {
        #[test]
        fn prop_every_record_gets_exactly_one_entry(
            n in 1usize..120,
            shard_size in 1usize..40,
            fail_every in 2usize..5,
        ) {
            let input = records(n);
            let mut mappings = HashMap::new();
            let mut jobs = Vec::new();

            for (index, window) in input.chunks(shard_size).enumerate() {
                let shard = Shard::new(ShardId(index), window.to_vec());
                let mapping = mapping_for(&shard);

                if index % fail_every == 0 {
                    let mut job = Job::new(shard.id, format!("hash-{index}"));
                    JobStateMachine::apply(&mut job, JobEvent::fail_with_error("boom")).unwrap();
                    jobs.push(job);
                } else {
                    let items: Vec<serde_json::Value> = window
                        .iter()
                        .map(|r| serde_json::json!({ "id": r.id.as_str(), "label": "Teil" }))
                        .collect();
                    let output: Vec<String> = mapping
                        .custom_ids()
                        .map(|custom_id| output_line(custom_id, &serde_json::Value::Array(items.clone()).to_string()))
                        .collect();
                    jobs.push(succeeded_job(shard.id, &output.join("\n")));
                }
                mappings.insert(shard.id, mapping);
            }

            let result = ResultReconciler::reconcile(&input, &mappings, &jobs).unwrap();
            prop_assert_eq!(result.len(), n);

            let ids: Vec<&str> = result.entries().iter().map(|e| e.id.as_str()).collect();
            let expected: Vec<&str> = input.iter().map(|r| r.id.as_str()).collect();
            prop_assert_eq!(ids, expected);
        }
    }
}
