mod helpers;

use distill::config::EngineConfig;
use distill::engine;
use distill::engine::types::RecordKind;
use distill::store::{self, PlanWriter, SqliteWriter};
use helpers::{checkpoint, test_db};

fn auto_sync_batch(n: usize) -> Vec<distill::engine::types::MemoryRecord> {
    (0..n)
        .map(|i| {
            checkpoint(
                &format!("cp-{i}"),
                &format!("CHECKPOINT 2026-01-01 0{i}:00:00: auto-sync"),
                &format!("2026-01-01T0{i}:00:00Z"),
            )
        })
        .collect()
}

#[test]
fn repetitive_checkpoints_consolidate_into_one_summary() {
    let records = auto_sync_batch(5);
    let run =
        engine::compute_checkpoint_consolidation(&records, &EngineConfig::default()).unwrap();

    assert_eq!(run.checkpoint_records, 5);
    assert_eq!(run.consolidations.len(), 1);

    let consolidated = &run.consolidations[0];
    assert_eq!(consolidated.occurrence_count, 5);
    assert!(consolidated.summary.content.starts_with("SUMMARY: 5 automatic checkpoints"));
    assert_eq!(consolidated.summary.kind, RecordKind::Checkpoint);

    // Hourly cadence comes out of the occurrence timestamps.
    let frequency = consolidated.summary.metadata.as_ref().unwrap()["frequency_minutes"]
        .as_f64()
        .unwrap();
    assert!((frequency - 60.0).abs() < 1e-9);

    // Every member folds into the summary.
    assert_eq!(consolidated.plan.actions.len(), 5);
}

#[test]
fn groups_below_threshold_are_left_alone() {
    let records = auto_sync_batch(4);
    let run =
        engine::compute_checkpoint_consolidation(&records, &EngineConfig::default()).unwrap();
    assert_eq!(run.checkpoint_records, 4);
    assert!(run.consolidations.is_empty());
}

#[test]
fn distinct_tasks_consolidate_separately() {
    let mut records = auto_sync_batch(5);
    for i in 0..5 {
        records.push(checkpoint(
            &format!("save-{i}"),
            &format!("Auto-save triggered at 1{i}:30:00"),
            &format!("2026-01-02T1{i}:30:00Z"),
        ));
    }

    let run =
        engine::compute_checkpoint_consolidation(&records, &EngineConfig::default()).unwrap();
    assert_eq!(run.consolidations.len(), 2);
    assert!(run
        .consolidations
        .iter()
        .all(|c| c.occurrence_count == 5));
}

#[test]
fn apply_inserts_summary_and_supersedes_members() {
    let mut conn = test_db();
    for i in 0..5 {
        store::insert_record(
            &conn,
            &format!("CHECKPOINT 2026-01-01 0{i}:00:00: auto-sync"),
            RecordKind::Checkpoint,
            Some(&format!("2026-01-01T0{i}:00:00Z")),
            None,
        )
        .unwrap();
    }

    let records = store::fetch_active(&conn, None, 100).unwrap();
    let run =
        engine::compute_checkpoint_consolidation(&records, &EngineConfig::default()).unwrap();
    assert_eq!(run.consolidations.len(), 1);

    let mut writer = SqliteWriter::new(&mut conn);
    let outcome = writer.apply_consolidation(&run.consolidations[0]).unwrap();
    assert_eq!(outcome.actions_applied, 5);

    // Only the summary remains active.
    let active = store::fetch_active(&conn, None, 100).unwrap();
    assert_eq!(active.len(), 1);
    assert!(active[0].content.starts_with("SUMMARY:"));
    assert_eq!(
        active[0].metadata.as_ref().unwrap()["occurrence_count"],
        serde_json::json!(5)
    );

    // Consolidation leaves an audit entry for the summary.
    let audit = store::audit_counts(&conn).unwrap();
    assert!(audit.iter().any(|(op, n)| op == "consolidate" && *n == 1));

    // Re-running over the survivors is a no-op: the summary is excluded
    // from the checkpoint pipeline by its marker.
    let records = store::fetch_active(&conn, None, 100).unwrap();
    let rerun =
        engine::compute_checkpoint_consolidation(&records, &EngineConfig::default()).unwrap();
    assert_eq!(rerun.checkpoint_records, 0);
    assert!(rerun.consolidations.is_empty());
}

#[test]
fn dry_run_consolidations_cannot_be_applied() {
    let mut conn = test_db();
    for i in 0..5 {
        store::insert_record(
            &conn,
            "SYNC: session state persisted",
            RecordKind::Checkpoint,
            Some(&format!("2026-01-01T0{i}:00:00Z")),
            None,
        )
        .unwrap();
    }

    let config = EngineConfig {
        dry_run: true,
        ..EngineConfig::default()
    };
    let records = store::fetch_active(&conn, None, 100).unwrap();
    let run = engine::compute_checkpoint_consolidation(&records, &config).unwrap();
    assert_eq!(run.consolidations.len(), 1);
    assert!(!run.consolidations[0].plan.applied);

    let mut writer = SqliteWriter::new(&mut conn);
    assert!(writer.apply_consolidation(&run.consolidations[0]).is_err());
    assert_eq!(store::fetch_active(&conn, None, 100).unwrap().len(), 5);
}
