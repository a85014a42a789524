mod helpers;

use anyhow::Result;
use distill::config::EngineConfig;
use distill::engine;
use distill::engine::types::{ConsolidatedCheckpoint, RecordKind, ResolutionPlan, Strategy};
use distill::store::{self, ApplyOutcome, PlanWriter, SqliteWriter};
use helpers::{insert_record, record, test_db};

/// Observing writer: counts invocations instead of persisting anything.
#[derive(Default)]
struct RecordingWriter {
    plans: usize,
    consolidations: usize,
}

impl PlanWriter for RecordingWriter {
    fn apply_plan(&mut self, _plan: &ResolutionPlan) -> Result<ApplyOutcome> {
        self.plans += 1;
        Ok(ApplyOutcome { actions_applied: 0 })
    }

    fn apply_consolidation(&mut self, _c: &ConsolidatedCheckpoint) -> Result<ApplyOutcome> {
        self.consolidations += 1;
        Ok(ApplyOutcome { actions_applied: 0 })
    }
}

#[test]
fn dry_run_plans_are_refused_by_the_sqlite_writer() {
    let mut conn = test_db();
    insert_record(&conn, "same note", RecordKind::Observation, "2026-01-01T00:00:00Z");
    insert_record(&conn, "same note", RecordKind::Observation, "2026-01-02T00:00:00Z");

    let records = store::fetch_active(&conn, None, 100).unwrap();
    let config = EngineConfig {
        dry_run: true,
        ..EngineConfig::default()
    };
    let run = engine::compute_duplicates(&records, &config).unwrap();
    assert_eq!(run.groups.len(), 1);

    let mut writer = SqliteWriter::new(&mut conn);
    assert!(writer.apply_plan(&run.groups[0].1).is_err());

    // Nothing was touched.
    let after = store::fetch_active(&conn, None, 100).unwrap();
    assert_eq!(after.len(), 2);
}

#[test]
fn keep_latest_apply_deletes_older_duplicates() {
    let mut conn = test_db();
    let old = insert_record(&conn, "fix auth bug", RecordKind::Observation, "2026-01-01T00:00:00Z");
    let new = insert_record(&conn, "fix auth bug", RecordKind::Observation, "2026-01-02T00:00:00Z");

    let records = store::fetch_active(&conn, None, 100).unwrap();
    let run = engine::compute_duplicates(&records, &EngineConfig::default()).unwrap();
    assert_eq!(run.groups.len(), 1);

    let mut writer = SqliteWriter::new(&mut conn);
    let outcome = writer.apply_plan(&run.groups[0].1).unwrap();
    assert_eq!(outcome.actions_applied, 2);

    let after = store::fetch_active(&conn, None, 100).unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, new);
    assert!(!after.iter().any(|r| r.id == old));

    // Both actions left an audit trail.
    let audit = store::audit_counts(&conn).unwrap();
    assert!(audit.iter().any(|(op, n)| op == "keep" && *n == 1));
    assert!(audit.iter().any(|(op, n)| op == "delete" && *n == 1));
}

#[test]
fn merge_apply_supersedes_and_is_idempotent() {
    let mut conn = test_db();
    let old = insert_record(&conn, "deploy done", RecordKind::Observation, "2026-01-01T00:00:00Z");
    let new = insert_record(&conn, "deploy done", RecordKind::Observation, "2026-01-02T00:00:00Z");

    let config = EngineConfig {
        resolution_strategy: Strategy::Merge,
        ..EngineConfig::default()
    };

    let records = store::fetch_active(&conn, None, 100).unwrap();
    let run = engine::compute_duplicates(&records, &config).unwrap();
    let mut writer = SqliteWriter::new(&mut conn);
    writer.apply_plan(&run.groups[0].1).unwrap();

    // The older record is superseded, not deleted, and carries provenance.
    let active = store::fetch_active(&conn, None, 100).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, new);
    let merged_from: Vec<String> = active[0].metadata.as_ref().unwrap()["merged_from"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(merged_from, vec![old.clone()]);

    // A second run over the surviving records finds nothing to do.
    let records = store::fetch_active(&conn, None, 100).unwrap();
    let rerun = engine::compute_duplicates(&records, &config).unwrap();
    assert!(rerun.groups.is_empty());
}

#[test]
fn dry_run_never_reaches_the_writer() {
    let config = EngineConfig {
        dry_run: true,
        ..EngineConfig::default()
    };
    let records = vec![
        record("a", "same thing", "2026-01-01T00:00:00Z"),
        record("b", "same thing", "2026-01-02T00:00:00Z"),
    ];
    let run = engine::compute_duplicates(&records, &config).unwrap();

    let mut writer = RecordingWriter::default();
    for (_, plan) in &run.groups {
        if plan.applied {
            writer.apply_plan(plan).unwrap();
        }
    }
    assert_eq!(writer.plans, 0);
}

#[test]
fn flag_only_apply_leaves_records_untouched() {
    let mut conn = test_db();
    insert_record(&conn, "repeated fact", RecordKind::Observation, "2026-01-01T00:00:00Z");
    insert_record(&conn, "repeated fact", RecordKind::Observation, "2026-01-02T00:00:00Z");

    let config = EngineConfig {
        resolution_strategy: Strategy::FlagOnly,
        ..EngineConfig::default()
    };
    let records = store::fetch_active(&conn, None, 100).unwrap();
    let run = engine::compute_duplicates(&records, &config).unwrap();

    let mut writer = SqliteWriter::new(&mut conn);
    writer.apply_plan(&run.groups[0].1).unwrap();

    let after = store::fetch_active(&conn, None, 100).unwrap();
    assert_eq!(after.len(), 2, "flagging changes no stored content");
    let audit = store::audit_counts(&conn).unwrap();
    assert!(audit.iter().any(|(op, n)| op == "flag" && *n == 2));
}
