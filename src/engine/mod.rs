//! Deduplication and consolidation engine.
//!
//! The core pipeline: records are validated, bucketed by the blocking
//! index, candidate pairs are scored, above-threshold pairs are clustered
//! into disjoint duplicate groups, and each group is turned into an
//! auditable [`ResolutionPlan`] (or a [`ConsolidatedCheckpoint`] for the
//! checkpoint pipeline). The engine never performs I/O: it borrows read
//! access to records and returns plans; applying them is the write
//! adapter's job, so a run has no side effects until a plan is handed off
//! and can be safely aborted between batches.

pub mod blocking;
pub mod checkpoint;
pub mod error;
pub mod grouper;
pub mod report;
pub mod resolve;
pub mod scorer;
pub mod types;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::config::EngineConfig;
use blocking::BlockingIndex;
use checkpoint::CheckpointDetector;
use error::EngineError;
use grouper::ScoredPair;
use report::Finding;
use scorer::SimilarityScorer;
use types::{
    Candidate, ConsolidatedCheckpoint, DuplicateGroup, MemoryRecord, ResolutionPlan, Strategy,
};

/// Result of one deduplication run over a record batch.
#[derive(Debug)]
pub struct DedupRun {
    pub total_records: usize,
    /// Records not scored: malformed, or already carrying a merged marker.
    pub excluded_records: usize,
    pub scored_pairs: u64,
    pub estimated_bytes_saved: u64,
    pub groups: Vec<(DuplicateGroup, ResolutionPlan)>,
    pub findings: Vec<Finding>,
}

/// Result of one checkpoint consolidation run.
#[derive(Debug)]
pub struct ConsolidationRun {
    pub total_records: usize,
    pub excluded_records: usize,
    /// Records recognized as checkpoints and fed to the pipeline.
    pub checkpoint_records: usize,
    pub scored_pairs: u64,
    pub estimated_bytes_saved: u64,
    pub consolidations: Vec<ConsolidatedCheckpoint>,
    pub findings: Vec<Finding>,
}

/// Find duplicate groups across `records` and plan their resolution.
///
/// Pure except for plan timestamps: records in, plans out. Fails only on
/// configuration errors; malformed records and rejected plans become
/// findings in the returned run.
pub fn compute_duplicates(
    records: &[MemoryRecord],
    config: &EngineConfig,
) -> Result<DedupRun, EngineError> {
    config.validate()?;

    let (candidates, mut findings, skipped) = validate_records(records);
    let malformed = findings.len();
    let scorer = SimilarityScorer::new(config.algorithm_weights);

    let normalized: Vec<String> = candidates
        .iter()
        .map(|c| scorer::normalize(&c.record.content))
        .collect();
    let index = BlockingIndex::build(&normalized, config.batch_size);
    debug!(
        records = candidates.len(),
        blocks = index.block_count(),
        "blocking index built"
    );

    let mut scored_pairs = 0u64;
    let pairs = index.candidate_pairs().map(|(i, j)| {
        scored_pairs += 1;
        ScoredPair {
            a: i,
            b: j,
            score: scorer.score_normalized(
                &candidates[i].record.id,
                &normalized[i],
                &candidates[j].record.id,
                &normalized[j],
            ),
        }
    });

    let groups = grouper::group(
        &candidates,
        pairs,
        config.similarity_threshold,
        config.resolution_strategy,
    );

    let by_id: HashMap<&str, usize> = candidates
        .iter()
        .enumerate()
        .map(|(idx, c)| (c.record.id.as_str(), idx))
        .collect();

    let mut out = Vec::with_capacity(groups.len());
    let mut estimated_bytes_saved = 0u64;
    for group in groups {
        let members: Vec<Candidate<'_>> = group
            .members
            .iter()
            .map(|id| candidates[by_id[id.as_str()]])
            .collect();
        let plan = resolve::resolve(&group, &members, config.resolution_strategy, config.dry_run);
        if let Some(detail) = resolve::conflict(&plan) {
            findings.push(Finding::ResolutionConflict {
                representative: group.representative.clone(),
                detail,
            });
            continue;
        }
        estimated_bytes_saved += inactive_bytes(&plan, &members);
        out.push((group, plan));
    }

    Ok(DedupRun {
        total_records: records.len(),
        excluded_records: skipped + malformed,
        scored_pairs,
        estimated_bytes_saved,
        groups: out,
        findings,
    })
}

/// Consolidate repetitive checkpoint records into summary records.
///
/// Reuses the blocking/scoring/grouping pipeline over task signatures, then
/// gates groups on `consolidation_threshold` — smaller groups are not worth
/// the overhead and are left untouched.
pub fn compute_checkpoint_consolidation(
    records: &[MemoryRecord],
    config: &EngineConfig,
) -> Result<ConsolidationRun, EngineError> {
    config.validate()?;
    let detector = CheckpointDetector::new(&config.checkpoint_patterns)?;

    let (candidates, findings, skipped) = validate_records(records);
    let malformed = findings.len();
    let checkpoints: Vec<Candidate<'_>> = candidates
        .into_iter()
        .filter(|c| detector.is_checkpoint(c.record) && !is_summary(c.record))
        .collect();

    let scorer = SimilarityScorer::new(config.algorithm_weights);
    // Score over task signatures, not raw content: re-emissions of the same
    // task become byte-identical and exact-match carries the composite.
    let signatures: Vec<String> = checkpoints
        .iter()
        .map(|c| detector.signature(&c.record.content))
        .collect();
    let index = BlockingIndex::build(&signatures, config.batch_size);

    let mut scored_pairs = 0u64;
    let pairs = index.candidate_pairs().map(|(i, j)| {
        scored_pairs += 1;
        ScoredPair {
            a: i,
            b: j,
            score: scorer.score_normalized(
                &checkpoints[i].record.id,
                &signatures[i],
                &checkpoints[j].record.id,
                &signatures[j],
            ),
        }
    });

    let groups = grouper::group(
        &checkpoints,
        pairs,
        config.similarity_threshold,
        Strategy::Merge,
    );

    let by_id: HashMap<&str, usize> = checkpoints
        .iter()
        .enumerate()
        .map(|(idx, c)| (c.record.id.as_str(), idx))
        .collect();

    let mut consolidations = Vec::new();
    let mut estimated_bytes_saved = 0u64;
    for group in groups {
        if group.members.len() < config.consolidation_threshold {
            debug!(
                size = group.members.len(),
                threshold = config.consolidation_threshold,
                "checkpoint group below consolidation threshold, left untouched"
            );
            continue;
        }
        let member_indices: Vec<usize> = group
            .members
            .iter()
            .map(|id| by_id[id.as_str()])
            .collect();
        let members: Vec<Candidate<'_>> =
            member_indices.iter().map(|&idx| checkpoints[idx]).collect();
        let signature = signatures[member_indices[0]].clone();

        let consolidated = checkpoint::consolidate(&group, &members, &signature, config.dry_run);
        let folded_bytes: u64 = members
            .iter()
            .map(|c| c.record.content.len() as u64)
            .sum();
        estimated_bytes_saved +=
            folded_bytes.saturating_sub(consolidated.summary.content.len() as u64);
        consolidations.push(consolidated);
    }

    Ok(ConsolidationRun {
        total_records: records.len(),
        excluded_records: skipped + malformed,
        checkpoint_records: checkpoints.len(),
        scored_pairs,
        estimated_bytes_saved,
        consolidations,
        findings,
    })
}

/// Split records into scorable candidates and findings.
///
/// Malformed records (missing identifier or unusable timestamp) are
/// excluded and reported, not fatal to the batch. Records already marked as
/// merged are skipped so re-running a batch is idempotent. Returns
/// (candidates, findings, silently-skipped count).
fn validate_records(records: &[MemoryRecord]) -> (Vec<Candidate<'_>>, Vec<Finding>, usize) {
    let mut candidates = Vec::with_capacity(records.len());
    let mut findings = Vec::new();
    let mut skipped = 0usize;

    for record in records {
        if record.id.trim().is_empty() {
            findings.push(Finding::MalformedRecord {
                id: None,
                reason: "missing identifier".to_string(),
            });
            continue;
        }
        if has_marker(record, "merged_into") {
            skipped += 1;
            continue;
        }
        match record.created_at.parse::<DateTime<Utc>>() {
            Ok(created) => candidates.push(Candidate { record, created }),
            Err(e) => findings.push(Finding::MalformedRecord {
                id: Some(record.id.clone()),
                reason: format!("unusable created_at {:?}: {e}", record.created_at),
            }),
        }
    }

    (candidates, findings, skipped)
}

fn has_marker(record: &MemoryRecord, key: &str) -> bool {
    record
        .metadata
        .as_ref()
        .and_then(|m| m.get(key))
        .is_some()
}

fn is_summary(record: &MemoryRecord) -> bool {
    record
        .metadata
        .as_ref()
        .and_then(|m| m.get("checkpoint_summary"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// Content bytes that become inactive if the plan is applied.
fn inactive_bytes(plan: &ResolutionPlan, members: &[Candidate<'_>]) -> u64 {
    plan.actions
        .iter()
        .filter(|a| matches!(a, types::Action::Delete { .. } | types::Action::MergeInto { .. }))
        .filter_map(|a| {
            members
                .iter()
                .find(|c| c.record.id == a.record_id())
                .map(|c| c.record.content.len() as u64)
        })
        .sum()
}
