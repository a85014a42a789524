//! `analyze` — read-only duplicate scan with a written JSON report.

use anyhow::Result;

use crate::config::DistillConfig;
use crate::engine;
use crate::engine::report::RunReport;
use crate::store;

/// Scan all active records for duplicate groups. Never writes to the record
/// store regardless of configuration; resolution is `resolve`'s job.
pub fn analyze(config: &DistillConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = crate::db::open_database(&db_path)?;

    let records = store::fetch_active(&conn, None, config.engine.batch_size)?;
    println!("Analyzing {} active records...", records.len());

    let mut engine_config = config.engine.clone();
    engine_config.dry_run = true;

    let pb = super::scoring_spinner("scoring candidate pairs...");
    let run = engine::compute_duplicates(&records, &engine_config)?;
    pb.finish_and_clear();

    let report = RunReport::from_dedup(&run, &engine_config);

    println!();
    println!("Duplicate Analysis");
    println!("{}", "=".repeat(40));
    println!("  Records scanned:     {}", report.total_records);
    println!("  Excluded:            {}", report.excluded_records);
    println!("  Pairs scored:        {}", report.scored_pairs);
    println!("  Duplicate groups:    {}", report.duplicate_groups);
    println!("  Duplicate records:   {}", report.duplicate_records);
    println!("  Duplicate rate:      {:.1}%", report.duplicate_rate);
    println!(
        "  Est. space savings:  {} bytes",
        report.estimated_bytes_saved
    );

    if !run.groups.is_empty() {
        println!();
        println!("{:<38} {:<6} {:<8} {}", "Representative", "Size", "Score", "Preview");
        println!("{}", "-".repeat(90));
        for (group, _plan) in &run.groups {
            let max_score = group
                .scores
                .iter()
                .map(|s| s.composite)
                .fold(0.0_f64, f64::max);
            let preview = records
                .iter()
                .find(|r| r.id == group.representative)
                .map(|r| super::preview(&r.content, 36))
                .unwrap_or_default();
            println!(
                "{:<38} {:<6} {:<8.4} {}",
                group.representative,
                group.members.len(),
                max_score,
                preview
            );
        }
    }

    super::print_report_tail(&report);

    let path = super::write_report(config, "deduplication", &report)?;
    println!();
    println!("Report written to {}", path.display());
    Ok(())
}
