use anyhow::Result;

use crate::config::DistillConfig;
use crate::store;

/// Display record-store statistics in the terminal.
pub fn stats(config: &DistillConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = crate::db::open_database(&db_path)?;

    let stats = store::store_stats(&conn, Some(&db_path))?;

    println!("Record Store Statistics");
    println!("{}", "=".repeat(40));
    println!("  Total records:       {}", stats.total_records);
    println!("  Active:              {}", stats.active_records);
    println!("  Superseded:          {}", stats.superseded_records);
    println!();

    println!("By Kind:");
    for kind in &["observation", "checkpoint"] {
        let count = stats.by_kind.get(*kind).copied().unwrap_or(0);
        println!("  {:<12} {}", kind, count);
    }
    println!();

    println!("Database size:         {} bytes", stats.db_size_bytes);
    if let Some(ref oldest) = stats.oldest_record {
        println!("Oldest record:         {oldest}");
    }
    if let Some(ref newest) = stats.newest_record {
        println!("Newest record:         {newest}");
    }

    let audit = store::audit_counts(&conn)?;
    if !audit.is_empty() {
        println!();
        println!("Audit Log:");
        for (operation, count) in &audit {
            println!("  {:<12} {}", operation, count);
        }
    }

    Ok(())
}
