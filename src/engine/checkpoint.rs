//! Checkpoint pattern detection and consolidation planning.
//!
//! Checkpoints are structurally repetitive — the same task signature
//! re-emitted run after run. [`CheckpointDetector`] recognizes them (by
//! record kind or configurable content patterns) and reduces each one to a
//! task signature with the volatile parts replaced by placeholders, so that
//! re-emissions of the same task become byte-identical for scoring.
//! [`consolidate`] collapses a qualifying group into one synthesized
//! summary record plus a plan-equivalent artifact a dry run can preview.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;
use uuid::Uuid;

use super::error::EngineError;
use super::types::{
    Action, Candidate, ConsolidatedCheckpoint, DuplicateGroup, MemoryRecord, RecordKind,
    ResolutionPlan, Strategy,
};

/// Default content patterns marking a record as a checkpoint.
pub const DEFAULT_PATTERNS: &[&str] = &[
    r"CHECKPOINT\s+\w+\s+\w+\s+\d+\s+\d+:\d+:\d+\s+\w+\s+\d+:\s+auto-sync",
    r"auto-sync",
    r"SYNC:\s*\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}",
    r"Checkpoint\s+\d+\s+completed",
    r"Auto-save\s+at\s+\d{4}-\d{2}-\d{2}",
];

/// Placeholder substitutions applied, in order, to build a task signature.
static SIGNATURE_REWRITES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\w+\s+\w+\s+\d+\s+\d+:\d+:\d+\s+\w+\s+\d+", "TIMESTAMP"),
        (r"\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}", "DATETIME"),
        (r"\d{2}:\d{2}:\d{2}", "TIME"),
        (r"\d+", "NUM"),
    ]
    .iter()
    .map(|(p, sub)| (Regex::new(p).expect("valid pattern"), *sub))
    .collect()
});

/// Recognizes checkpoint-shaped records and derives their task signatures.
#[derive(Debug)]
pub struct CheckpointDetector {
    patterns: Vec<Regex>,
}

impl CheckpointDetector {
    /// Compile the configured patterns (case-insensitive), failing fast on
    /// an invalid one.
    pub fn new(patterns: &[String]) -> Result<Self, EngineError> {
        let compiled = patterns
            .iter()
            .map(|p| {
                Regex::new(&format!("(?i){p}")).map_err(|e| EngineError::InvalidPattern {
                    pattern: p.clone(),
                    detail: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns: compiled })
    }

    /// A record is a checkpoint if it is tagged as one, or if its content
    /// matches any configured pattern.
    pub fn is_checkpoint(&self, record: &MemoryRecord) -> bool {
        record.kind == RecordKind::Checkpoint
            || self.patterns.iter().any(|p| p.is_match(&record.content))
    }

    /// Task signature: content with timestamps and counters replaced by
    /// placeholders, lowercased and whitespace-collapsed. Two re-emissions
    /// of the same task share a signature exactly.
    pub fn signature(&self, content: &str) -> String {
        let mut signature = content.to_string();
        for (pattern, placeholder) in SIGNATURE_REWRITES.iter() {
            signature = pattern.replace_all(&signature, *placeholder).into_owned();
        }
        signature
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Average minutes between consecutive occurrences, `None` for fewer than
/// two members.
pub fn frequency_minutes(timestamps: &[DateTime<Utc>]) -> Option<f64> {
    if timestamps.len() < 2 {
        return None;
    }
    let mut sorted = timestamps.to_vec();
    sorted.sort();
    let total: i64 = sorted
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds())
        .sum();
    Some(total as f64 / 60.0 / (sorted.len() - 1) as f64)
}

/// Collapse a qualifying checkpoint group into one synthesized record.
///
/// The summary carries an `occurrence_count` and the full identifier trail
/// of the folded records; the accompanying plan merges every member into
/// the summary, so the consolidation is previewable and auditable like any
/// other resolution.
pub fn consolidate(
    group: &DuplicateGroup,
    members: &[Candidate<'_>],
    signature: &str,
    dry_run: bool,
) -> ConsolidatedCheckpoint {
    let timestamps: Vec<DateTime<Utc>> = members.iter().map(|c| c.created).collect();
    let first = timestamps.iter().min().copied().unwrap_or_default();
    let last = timestamps.iter().max().copied().unwrap_or_default();
    let frequency = frequency_minutes(&timestamps);

    let frequency_text = frequency
        .map(|m| format!("~{m:.1} min"))
        .unwrap_or_else(|| "n/a".to_string());
    let content = format!(
        "SUMMARY: {} automatic checkpoints from {} to {} - {}",
        members.len(),
        first.format("%Y-%m-%d %H:%M"),
        last.format("%Y-%m-%d %H:%M"),
        frequency_text,
    );

    let mut folded: Vec<String> = group.members.clone();
    folded.sort();

    let mut metadata = serde_json::Map::new();
    metadata.insert("checkpoint_summary".into(), true.into());
    metadata.insert("occurrence_count".into(), members.len().into());
    metadata.insert("pattern".into(), signature.into());
    metadata.insert(
        "consolidated_from".into(),
        serde_json::Value::Array(folded.iter().cloned().map(Into::into).collect()),
    );
    metadata.insert("first_occurrence".into(), first.to_rfc3339().into());
    metadata.insert("last_occurrence".into(), last.to_rfc3339().into());
    if let Some(minutes) = frequency {
        metadata.insert("frequency_minutes".into(), minutes.into());
    }

    let summary = MemoryRecord {
        id: Uuid::now_v7().to_string(),
        kind: RecordKind::Checkpoint,
        content,
        created_at: last.to_rfc3339(),
        metadata: Some(serde_json::Value::Object(metadata)),
    };

    let actions = folded
        .iter()
        .map(|id| Action::MergeInto {
            id: id.clone(),
            target: summary.id.clone(),
        })
        .collect();

    let plan = ResolutionPlan {
        actions,
        justification: format!(
            "consolidated {} checkpoints sharing signature {:?} into summary {}",
            members.len(),
            signature,
            summary.id,
        ),
        merged_metadata: None,
        applied: !dry_run,
    };

    ConsolidatedCheckpoint {
        occurrence_count: members.len(),
        signature: signature.to_string(),
        summary,
        group: group.clone(),
        plan,
    }
}
