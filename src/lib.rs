//! Deduplication and consolidation engine for AI agent memory stores.
//!
//! Agents that persist observations and checkpoints accumulate near-identical
//! records over time: retried tasks, re-stated facts, periodic auto-save
//! checkpoints. distill scans a record store, finds duplicate groups by
//! weighted lexical similarity, and resolves them with an auditable plan.
//!
//! # Architecture
//!
//! - **Storage**: SQLite (WAL mode) with a `dedup_log` audit trail; every
//!   applied action is logged
//! - **Scoring**: four weighted algorithms (exact match, longest common
//!   subsequence, Levenshtein, token Jaccard) over normalized content
//! - **Blocking**: candidate pairs come from first-token/length-band buckets,
//!   so large batches never pay the full quadratic comparison cost
//! - **Resolution**: `keep_latest`, `merge`, or `flag_only`, always planned
//!   first and applied separately, so dry runs are free
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`db`] — SQLite database initialization and schema
//! - [`engine`] — Scoring, blocking, grouping, resolution, and checkpoint consolidation
//! - [`store`] — Record fetching, plan application, audit logging, and statistics

pub mod config;
pub mod db;
pub mod engine;
pub mod store;
