//! `checkpoints` — consolidate repetitive checkpoint records into summaries.

use anyhow::Result;

use crate::config::DistillConfig;
use crate::engine;
use crate::engine::report::{Finding, RunReport};
use crate::store::{self, PlanWriter, SqliteWriter};

/// Find checkpoint groups above the consolidation threshold and fold each
/// into one synthesized summary record.
pub fn checkpoints(config: &DistillConfig, dry_run: bool) -> Result<()> {
    let db_path = config.resolved_db_path();
    let mut conn = crate::db::open_database(&db_path)?;

    let mut engine_config = config.engine.clone();
    engine_config.dry_run = dry_run || config.engine.dry_run;

    let records = store::fetch_active(&conn, None, engine_config.batch_size)?;

    let pb = super::scoring_spinner("scoring checkpoint signatures...");
    let mut run = engine::compute_checkpoint_consolidation(&records, &engine_config)?;
    pb.finish_and_clear();

    println!(
        "Scanned {} records, {} recognized as checkpoints.",
        run.total_records, run.checkpoint_records
    );

    if run.consolidations.is_empty() {
        println!(
            "No checkpoint group reached the consolidation threshold ({}).",
            engine_config.consolidation_threshold
        );
        return Ok(());
    }

    println!();
    if engine_config.dry_run {
        println!(
            "Found {} consolidation(s) (dry run - nothing written):\n",
            run.consolidations.len()
        );
    }
    println!("{:<6} {:<10} {}", "Count", "Freq(min)", "Signature");
    println!("{}", "-".repeat(80));
    for consolidated in &run.consolidations {
        let frequency = consolidated
            .summary
            .metadata
            .as_ref()
            .and_then(|m| m.get("frequency_minutes"))
            .and_then(|v| v.as_f64());
        let frequency = match frequency {
            Some(minutes) => format!("{minutes:.1}"),
            None => "-".to_string(),
        };
        println!(
            "{:<6} {:<10} {}",
            consolidated.occurrence_count,
            frequency,
            super::preview(&consolidated.signature, 60)
        );
    }

    if !engine_config.dry_run {
        let mut writer = SqliteWriter::new(&mut conn);
        let mut applied = 0usize;
        let total = run.consolidations.len();
        for consolidated in &run.consolidations {
            match writer.apply_consolidation(consolidated) {
                Ok(_) => applied += 1,
                Err(e) => run.findings.push(Finding::ApplyFailed {
                    representative: consolidated.group.representative.clone(),
                    detail: e.to_string(),
                }),
            }
        }
        println!();
        println!("Applied {applied} of {total} consolidation(s).");
    }

    let report = RunReport::from_consolidation(&run, &engine_config);
    super::print_report_tail(&report);

    let path = super::write_report(config, "consolidation", &report)?;
    println!();
    println!("Report written to {}", path.display());
    Ok(())
}
