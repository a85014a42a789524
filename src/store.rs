//! Record-store adapter — paged reads, plan application, audit logging.
//!
//! The engine itself never touches the database: it borrows records fetched
//! here and hands back plans. [`PlanWriter`] is the injectable write
//! capability; [`SqliteWriter`] applies each plan inside one transaction and
//! refuses plans produced under dry-run, so a dry run can never write by
//! construction.

use anyhow::{bail, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::engine::types::{Action, ConsolidatedCheckpoint, MemoryRecord, RecordKind, ResolutionPlan};

/// Outcome of applying one plan.
#[derive(Debug, Serialize)]
pub struct ApplyOutcome {
    pub actions_applied: usize,
}

/// Write capability consumed by the CLI after planning. Injectable so tests
/// can observe exactly when (and whether) persistence is requested.
pub trait PlanWriter {
    fn apply_plan(&mut self, plan: &ResolutionPlan) -> Result<ApplyOutcome>;
    fn apply_consolidation(&mut self, consolidated: &ConsolidatedCheckpoint) -> Result<ApplyOutcome>;
}

/// Fetch one page of active records, ordered by id (UUID v7 ids are
/// time-sortable, so this is a stable key). Keyset pagination: pass the last
/// id of the previous page as `after`.
pub fn fetch_page(
    conn: &Connection,
    kind: Option<RecordKind>,
    after: Option<&str>,
    limit: usize,
) -> Result<Vec<MemoryRecord>> {
    let mut sql = String::from(
        "SELECT id, kind, content, created_at, metadata FROM records \
         WHERE superseded_by IS NULL",
    );
    if kind.is_some() {
        sql.push_str(" AND kind = ?1");
    }
    if after.is_some() {
        sql.push_str(if kind.is_some() { " AND id > ?2" } else { " AND id > ?1" });
    }
    sql.push_str(" ORDER BY id LIMIT ");
    sql.push_str(&limit.to_string());

    let mut stmt = conn.prepare(&sql)?;
    let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<MemoryRecord> {
        let kind_text: String = row.get(1)?;
        let kind = kind_text.parse::<RecordKind>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
        })?;
        let metadata: Option<String> = row.get(4)?;
        Ok(MemoryRecord {
            id: row.get(0)?,
            kind,
            content: row.get(2)?,
            created_at: row.get(3)?,
            metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
        })
    };

    let rows = match (kind, after) {
        (Some(k), Some(a)) => stmt.query_map(params![k.as_str(), a], map_row)?,
        (Some(k), None) => stmt.query_map(params![k.as_str()], map_row)?,
        (None, Some(a)) => stmt.query_map(params![a], map_row)?,
        (None, None) => stmt.query_map([], map_row)?,
    };

    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Fetch all active records in `batch_size` pages.
pub fn fetch_active(
    conn: &Connection,
    kind: Option<RecordKind>,
    batch_size: usize,
) -> Result<Vec<MemoryRecord>> {
    let mut records = Vec::new();
    let mut after: Option<String> = None;
    loop {
        let page = fetch_page(conn, kind, after.as_deref(), batch_size)?;
        let Some(last) = page.last() else { break };
        after = Some(last.id.clone());
        let full = page.len() == batch_size;
        records.extend(page);
        if !full {
            break;
        }
    }
    Ok(records)
}

/// Insert a new record. `created_at` defaults to now; returns the new id.
pub fn insert_record(
    conn: &Connection,
    content: &str,
    kind: RecordKind,
    created_at: Option<&str>,
    metadata: Option<&serde_json::Value>,
) -> Result<String> {
    let id = uuid::Uuid::now_v7().to_string();
    insert_record_with_id(conn, &id, content, kind, created_at, metadata)?;
    Ok(id)
}

fn insert_record_with_id(
    conn: &Connection,
    id: &str,
    content: &str,
    kind: RecordKind,
    created_at: Option<&str>,
    metadata: Option<&serde_json::Value>,
) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    let created = created_at.unwrap_or(&now);
    conn.execute(
        "INSERT INTO records (id, kind, content, created_at, updated_at, metadata) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            kind.as_str(),
            content,
            created,
            now,
            metadata.map(|m| m.to_string()),
        ],
    )?;
    write_audit_log(conn, "create", id, None)?;
    Ok(())
}

/// Append an entry to the dedup audit log.
pub fn write_audit_log(
    conn: &Connection,
    operation: &str,
    record_id: &str,
    details: Option<&serde_json::Value>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO dedup_log (operation, record_id, details, created_at) \
         VALUES (?1, ?2, ?3, ?4)",
        params![
            operation,
            record_id,
            details.map(|d| d.to_string()),
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Committing writer over a SQLite connection.
pub struct SqliteWriter<'c> {
    conn: &'c mut Connection,
}

impl<'c> SqliteWriter<'c> {
    pub fn new(conn: &'c mut Connection) -> Self {
        Self { conn }
    }
}

impl PlanWriter for SqliteWriter<'_> {
    /// Apply every action of a plan inside one transaction.
    fn apply_plan(&mut self, plan: &ResolutionPlan) -> Result<ApplyOutcome> {
        if !plan.applied {
            bail!("refusing to apply a dry-run plan");
        }
        let tx = self.conn.transaction()?;
        let actions_applied = apply_actions(&tx, plan)?;
        tx.commit()?;
        Ok(ApplyOutcome { actions_applied })
    }

    /// Insert the synthesized summary, then fold the members under it, all
    /// inside one transaction.
    fn apply_consolidation(
        &mut self,
        consolidated: &ConsolidatedCheckpoint,
    ) -> Result<ApplyOutcome> {
        if !consolidated.plan.applied {
            bail!("refusing to apply a dry-run consolidation");
        }
        let tx = self.conn.transaction()?;
        let summary = &consolidated.summary;
        insert_record_with_id(
            &tx,
            &summary.id,
            &summary.content,
            summary.kind,
            Some(&summary.created_at),
            summary.metadata.as_ref(),
        )?;
        write_audit_log(
            &tx,
            "consolidate",
            &summary.id,
            Some(&serde_json::json!({
                "occurrence_count": consolidated.occurrence_count,
                "signature": consolidated.signature,
            })),
        )?;
        let actions_applied = apply_actions(&tx, &consolidated.plan)?;
        tx.commit()?;
        Ok(ApplyOutcome { actions_applied })
    }
}

fn apply_actions(tx: &Connection, plan: &ResolutionPlan) -> Result<usize> {
    let now = chrono::Utc::now().to_rfc3339();
    let mut applied = 0usize;
    for action in &plan.actions {
        match action {
            Action::Keep { id } => {
                if let Some(metadata) = &plan.merged_metadata {
                    tx.execute(
                        "UPDATE records SET metadata = ?1, updated_at = ?2 WHERE id = ?3",
                        params![metadata.to_string(), now, id],
                    )?;
                }
                write_audit_log(tx, "keep", id, None)?;
            }
            Action::Delete { id } => {
                write_audit_log(
                    tx,
                    "delete",
                    id,
                    Some(&serde_json::json!({"justification": plan.justification})),
                )?;
                tx.execute("DELETE FROM records WHERE id = ?1", params![id])?;
            }
            Action::MergeInto { id, target } => {
                let metadata = patched_metadata(tx, id, "merged_into", target)?;
                tx.execute(
                    "UPDATE records SET superseded_by = ?1, metadata = ?2, updated_at = ?3 \
                     WHERE id = ?4",
                    params![target, metadata, now, id],
                )?;
                write_audit_log(
                    tx,
                    "merge",
                    id,
                    Some(&serde_json::json!({"merged_into": target})),
                )?;
            }
            // Review-only: audit trail entry, stored content untouched.
            Action::Flag { id } => {
                write_audit_log(
                    tx,
                    "flag",
                    id,
                    Some(&serde_json::json!({"justification": plan.justification})),
                )?;
            }
        }
        applied += 1;
    }
    Ok(applied)
}

/// Read a record's metadata, set `key` to `value`, and return the JSON text.
fn patched_metadata(
    conn: &Connection,
    record_id: &str,
    key: &str,
    value: &str,
) -> Result<String> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT metadata FROM records WHERE id = ?1",
            params![record_id],
            |row| row.get(0),
        )
        .optional()?
        .flatten();
    let mut metadata: serde_json::Map<String, serde_json::Value> = existing
        .and_then(|m| serde_json::from_str(&m).ok())
        .unwrap_or_default();
    metadata.insert(key.to_string(), value.into());
    Ok(serde_json::Value::Object(metadata).to_string())
}

// ── Store statistics ─────────────────────────────────────────────────────────

/// Summary counts for the `stats` command and reports.
#[derive(Debug, Serialize)]
pub struct StoreStats {
    pub total_records: u64,
    pub active_records: u64,
    pub superseded_records: u64,
    pub by_kind: HashMap<String, u64>,
    pub db_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_record: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_record: Option<String>,
}

/// Compute record-store statistics. `db_path` is used for file size; pass
/// `None` for in-memory databases.
pub fn store_stats(conn: &Connection, db_path: Option<&Path>) -> Result<StoreStats> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
    let active: i64 = conn.query_row(
        "SELECT COUNT(*) FROM records WHERE superseded_by IS NULL",
        [],
        |row| row.get(0),
    )?;

    let mut by_kind = HashMap::new();
    let mut stmt = conn.prepare("SELECT kind, COUNT(*) FROM records GROUP BY kind")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (kind, count) = row?;
        by_kind.insert(kind, count as u64);
    }

    let (oldest, newest): (Option<String>, Option<String>) = conn.query_row(
        "SELECT MIN(created_at), MAX(created_at) FROM records",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(StoreStats {
        total_records: total as u64,
        active_records: active as u64,
        superseded_records: (total - active) as u64,
        by_kind,
        db_size_bytes,
        oldest_record: oldest,
        newest_record: newest,
    })
}

/// Count audit log entries per operation, most frequent first.
pub fn audit_counts(conn: &Connection) -> Result<Vec<(String, u64)>> {
    let mut stmt = conn.prepare(
        "SELECT operation, COUNT(*) FROM dedup_log GROUP BY operation ORDER BY COUNT(*) DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
