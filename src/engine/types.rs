//! Core engine type definitions.
//!
//! Defines [`MemoryRecord`] (a record borrowed from the store), [`SimilarityScore`]
//! (per-algorithm evidence plus the weighted composite), [`DuplicateGroup`] and
//! [`ResolutionPlan`] (the auditable output of a dedup run), and
//! [`ConsolidatedCheckpoint`] (the synthesized summary for a checkpoint group).

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Free-form observation produced by an agent.
    Observation,
    /// Task/step snapshot prone to repetitive re-emission.
    Checkpoint,
}

impl RecordKind {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Observation => "observation",
            Self::Checkpoint => "checkpoint",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "observation" => Ok(Self::Observation),
            "checkpoint" => Ok(Self::Checkpoint),
            _ => Err(format!("unknown record kind: {s}")),
        }
    }
}

/// A record fetched from the store. Immutable once inside the engine; the
/// external store holds the mutable source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// UUID v7 (time-sortable) primary key.
    pub id: String,
    /// Record kind — observations and checkpoints run through separate pipelines.
    pub kind: RecordKind,
    /// The full text content of the record.
    pub content: String,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// Arbitrary JSON metadata (e.g. `{"merged_into": "..."}`).
    pub metadata: Option<serde_json::Value>,
}

/// A validated record paired with its parsed timestamp, built once per run so
/// downstream stages never re-parse RFC 3339 text.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub record: &'a MemoryRecord,
    pub created: DateTime<Utc>,
}

/// Raw sub-scores from the four similarity algorithms, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SubScores {
    pub exact_match: f64,
    pub sequence_similarity: f64,
    pub levenshtein_similarity: f64,
    pub jaccard_similarity: f64,
}

/// Composite similarity between two records, with the per-algorithm evidence
/// kept alongside so a merge decision can be explained after the fact.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityScore {
    /// Identifier pair, sorted ascending so `score(a, b) == score(b, a)`.
    pub pair: (String, String),
    /// Raw per-algorithm sub-scores.
    pub parts: SubScores,
    /// Weighted sum of the sub-scores, in `[0, 1]`.
    pub composite: f64,
}

/// Policy for converting a duplicate group into concrete actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Keep the most recently created member, delete the rest.
    KeepLatest,
    /// Synthesize merged metadata on the representative, supersede the rest.
    Merge,
    /// Flag every member for human review; never touches stored content.
    FlagOnly,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeepLatest => "keep_latest",
            Self::Merge => "merge",
            Self::FlagOnly => "flag_only",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep_latest" => Ok(Self::KeepLatest),
            "merge" => Ok(Self::Merge),
            "flag_only" => Ok(Self::FlagOnly),
            _ => Err(format!("unknown resolution strategy: {s}")),
        }
    }
}

/// A maximal set of records connected by above-threshold similarity.
///
/// Groups from one run are pairwise disjoint and always have size >= 2.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    /// Member record identifiers, sorted ascending.
    pub members: Vec<String>,
    /// Canonical pick: most recently created member, ties broken by the
    /// lexicographically greater identifier.
    pub representative: String,
    /// Strategy this group will be resolved with.
    pub strategy: Strategy,
    /// The above-threshold edges that formed this group.
    pub scores: Vec<SimilarityScore>,
}

/// A single per-record action inside a [`ResolutionPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Keep { id: String },
    Delete { id: String },
    MergeInto { id: String, target: String },
    Flag { id: String },
}

impl Action {
    /// Identifier of the record this action applies to.
    pub fn record_id(&self) -> &str {
        match self {
            Self::Keep { id } | Self::Delete { id } | Self::MergeInto { id, .. } | Self::Flag { id } => id,
        }
    }
}

/// Auditable change plan for one duplicate group.
///
/// Created fresh per run, never mutated after creation, and consumed exactly
/// once — either by a dry-run reporter or by a committing [`PlanWriter`].
///
/// [`PlanWriter`]: crate::store::PlanWriter
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionPlan {
    /// One action per group member.
    pub actions: Vec<Action>,
    /// Human-readable explanation referencing the triggering scores.
    pub justification: String,
    /// Metadata synthesized for the representative under the `merge` strategy.
    pub merged_metadata: Option<serde_json::Value>,
    /// Set from the dry-run flag at planning time. The write adapter must
    /// refuse plans with `applied == false`.
    pub applied: bool,
}

/// A checkpoint group collapsed into one synthesized summary record.
#[derive(Debug, Clone, Serialize)]
pub struct ConsolidatedCheckpoint {
    /// The synthesized summary record (new identifier, not yet persisted).
    pub summary: MemoryRecord,
    /// The underlying duplicate group of checkpoint records.
    pub group: DuplicateGroup,
    /// Plan-equivalent artifact: every member merges into the summary, so a
    /// dry run can preview the consolidation without writing.
    pub plan: ResolutionPlan,
    /// Number of checkpoint occurrences folded into the summary.
    pub occurrence_count: usize,
    /// Normalized task signature shared by the group.
    pub signature: String,
}
