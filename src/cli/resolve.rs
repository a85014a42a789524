//! `resolve` — plan and (optionally) apply duplicate resolution.

use anyhow::Result;

use crate::config::DistillConfig;
use crate::engine;
use crate::engine::report::{Finding, RunReport};
use crate::engine::types::{Action, Strategy};
use crate::store::{self, PlanWriter, SqliteWriter};

/// Resolve duplicate groups with the given strategy.
///
/// With `dry_run`, plans are printed and reported but the write adapter is
/// never constructed. A plan that fails to apply becomes a finding and the
/// remaining groups still run.
pub fn resolve(config: &DistillConfig, strategy: Option<Strategy>, dry_run: bool) -> Result<()> {
    let db_path = config.resolved_db_path();
    let mut conn = crate::db::open_database(&db_path)?;

    let mut engine_config = config.engine.clone();
    if let Some(strategy) = strategy {
        engine_config.resolution_strategy = strategy;
    }
    engine_config.dry_run = dry_run || config.engine.dry_run;

    let records = store::fetch_active(&conn, None, engine_config.batch_size)?;

    let pb = super::scoring_spinner("scoring candidate pairs...");
    let mut run = engine::compute_duplicates(&records, &engine_config)?;
    pb.finish_and_clear();

    if run.groups.is_empty() {
        println!("No duplicate groups found.");
        return Ok(());
    }

    if engine_config.dry_run {
        println!(
            "Found {} duplicate group(s) (dry run - nothing written):\n",
            run.groups.len()
        );
        println!(
            "{:<38} {:<6} {:<12} {}",
            "Representative", "Size", "Strategy", "Actions"
        );
        println!("{}", "-".repeat(90));
        for (group, plan) in &run.groups {
            println!(
                "{:<38} {:<6} {:<12} {}",
                group.representative,
                group.members.len(),
                group.strategy,
                describe_actions(&plan.actions)
            );
        }
    } else {
        let mut writer = SqliteWriter::new(&mut conn);
        let mut groups_applied = 0usize;
        let mut actions_applied = 0usize;
        for (group, plan) in &run.groups {
            match writer.apply_plan(plan) {
                Ok(outcome) => {
                    groups_applied += 1;
                    actions_applied += outcome.actions_applied;
                }
                Err(e) => run.findings.push(Finding::ApplyFailed {
                    representative: group.representative.clone(),
                    detail: e.to_string(),
                }),
            }
        }
        println!(
            "Applied {groups_applied} of {} plan(s), {actions_applied} action(s) total.",
            run.groups.len()
        );
    }

    let report = RunReport::from_dedup(&run, &engine_config);
    super::print_report_tail(&report);

    let path = super::write_report(config, "resolution", &report)?;
    println!();
    println!("Report written to {}", path.display());
    Ok(())
}

/// Compact per-plan action summary, e.g. `keep 1, delete 2`.
fn describe_actions(actions: &[Action]) -> String {
    let mut keep = 0;
    let mut delete = 0;
    let mut merge = 0;
    let mut flag = 0;
    for action in actions {
        match action {
            Action::Keep { .. } => keep += 1,
            Action::Delete { .. } => delete += 1,
            Action::MergeInto { .. } => merge += 1,
            Action::Flag { .. } => flag += 1,
        }
    }
    let mut parts = Vec::new();
    for (label, count) in [("keep", keep), ("delete", delete), ("merge", merge), ("flag", flag)] {
        if count > 0 {
            parts.push(format!("{label} {count}"));
        }
    }
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_summary_is_compact() {
        let actions = vec![
            Action::Keep { id: "a".into() },
            Action::Delete { id: "b".into() },
            Action::Delete { id: "c".into() },
        ];
        assert_eq!(describe_actions(&actions), "keep 1, delete 2");
    }
}
