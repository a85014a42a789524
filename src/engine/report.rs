//! Structured run results for the reporting collaborator.
//!
//! The engine emits [`RunReport`] (plus per-run [`Finding`]s) and leaves
//! serialization format and persistence to whoever consumes it.

use serde::Serialize;

use super::types::Strategy;
use super::{ConsolidationRun, DedupRun};
use crate::config::EngineConfig;

/// A recoverable condition surfaced during a run. Findings never abort the
/// batch; only configuration errors do.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// Record excluded from scoring: missing identifier or unusable timestamp.
    MalformedRecord {
        id: Option<String>,
        reason: String,
    },
    /// A plan violated the merge-target invariant and was rejected.
    ResolutionConflict {
        representative: String,
        detail: String,
    },
    /// The write adapter failed to apply a plan; the run continued.
    ApplyFailed {
        representative: String,
        detail: String,
    },
}

/// Aggregate result object handed to reporting/storage collaborators.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub timestamp: String,
    pub total_records: usize,
    pub excluded_records: usize,
    pub scored_pairs: u64,
    pub duplicate_groups: usize,
    pub duplicate_records: usize,
    /// Percentage of records that sit in some duplicate group.
    pub duplicate_rate: f64,
    pub records_affected: usize,
    pub estimated_bytes_saved: u64,
    pub strategy: Strategy,
    pub dry_run: bool,
    pub similarity_threshold: f64,
    pub findings: Vec<Finding>,
    pub recommendations: Vec<String>,
}

impl RunReport {
    pub fn from_dedup(run: &DedupRun, config: &EngineConfig) -> Self {
        let duplicate_records: usize = run.groups.iter().map(|(g, _)| g.members.len()).sum();
        let duplicate_rate = if run.total_records > 0 {
            duplicate_records as f64 / run.total_records as f64 * 100.0
        } else {
            0.0
        };
        let records_affected: usize = run
            .groups
            .iter()
            .map(|(_, plan)| plan.actions.len())
            .sum();

        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            total_records: run.total_records,
            excluded_records: run.excluded_records,
            scored_pairs: run.scored_pairs,
            duplicate_groups: run.groups.len(),
            duplicate_records,
            duplicate_rate,
            records_affected,
            estimated_bytes_saved: run.estimated_bytes_saved,
            strategy: config.resolution_strategy,
            dry_run: config.dry_run,
            similarity_threshold: config.similarity_threshold,
            findings: run.findings.clone(),
            recommendations: recommendations(duplicate_rate, run.groups.len()),
        }
    }

    pub fn from_consolidation(run: &ConsolidationRun, config: &EngineConfig) -> Self {
        let duplicate_records: usize = run
            .consolidations
            .iter()
            .map(|c| c.occurrence_count)
            .sum();
        let duplicate_rate = if run.checkpoint_records > 0 {
            duplicate_records as f64 / run.checkpoint_records as f64 * 100.0
        } else {
            0.0
        };

        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            total_records: run.total_records,
            excluded_records: run.excluded_records,
            scored_pairs: run.scored_pairs,
            duplicate_groups: run.consolidations.len(),
            duplicate_records,
            duplicate_rate,
            records_affected: duplicate_records,
            estimated_bytes_saved: run.estimated_bytes_saved,
            strategy: Strategy::Merge,
            dry_run: config.dry_run,
            similarity_threshold: config.similarity_threshold,
            findings: run.findings.clone(),
            recommendations: recommendations(duplicate_rate, run.consolidations.len()),
        }
    }
}

/// Operator guidance keyed off the duplicate rate.
fn recommendations(duplicate_rate: f64, group_count: usize) -> Vec<String> {
    let mut out = Vec::new();
    if duplicate_rate > 10.0 {
        out.push(format!(
            "HIGH duplicate rate ({duplicate_rate:.1}%) - immediate cleanup recommended"
        ));
    } else if duplicate_rate > 5.0 {
        out.push(format!(
            "MEDIUM duplicate rate ({duplicate_rate:.1}%) - schedule a cleanup pass"
        ));
    } else if duplicate_rate > 1.0 {
        out.push(format!(
            "LOW duplicate rate ({duplicate_rate:.1}%) - monitor trends"
        ));
    } else {
        out.push("duplicate rate is negligible - maintain current practices".to_string());
    }
    if group_count > 0 {
        out.push("schedule regular deduplication maintenance".to_string());
        out.push("review similarity thresholds against resolved groups".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recommendations_track_rate_bands() {
        assert!(recommendations(15.0, 3)[0].starts_with("HIGH"));
        assert!(recommendations(7.0, 3)[0].starts_with("MEDIUM"));
        assert!(recommendations(2.0, 1)[0].starts_with("LOW"));
        assert_eq!(recommendations(0.5, 0).len(), 1);
    }
}
