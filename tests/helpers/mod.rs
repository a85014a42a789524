#![allow(dead_code)]

use distill::db;
use distill::engine::types::{MemoryRecord, RecordKind};
use distill::store;
use rusqlite::Connection;

/// Open a fresh in-memory database with the schema applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

/// Insert a record with an explicit creation timestamp. Returns the record ID.
pub fn insert_record(
    conn: &Connection,
    content: &str,
    kind: RecordKind,
    created_at: &str,
) -> String {
    store::insert_record(conn, content, kind, Some(created_at), None).unwrap()
}

/// Build an in-memory record without touching a database.
pub fn record(id: &str, content: &str, created_at: &str) -> MemoryRecord {
    MemoryRecord {
        id: id.to_string(),
        kind: RecordKind::Observation,
        content: content.to_string(),
        created_at: created_at.to_string(),
        metadata: None,
    }
}

/// Build a checkpoint record.
pub fn checkpoint(id: &str, content: &str, created_at: &str) -> MemoryRecord {
    MemoryRecord {
        id: id.to_string(),
        kind: RecordKind::Checkpoint,
        content: content.to_string(),
        created_at: created_at.to_string(),
        metadata: None,
    }
}
