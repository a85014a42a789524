//! Engine error taxonomy.
//!
//! Only configuration errors abort a run; malformed records and rejected
//! plans are surfaced as findings in the result object instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("algorithm weights must sum to 1.0, got {sum:.4}")]
    WeightSum { sum: f64 },

    #[error("weight for {algorithm} must be in [0, 1], got {value}")]
    WeightRange { algorithm: &'static str, value: f64 },

    #[error("similarity threshold must be in [0, 1], got {0}")]
    ThresholdRange(f64),

    #[error("batch size must be positive")]
    ZeroBatchSize,

    #[error("consolidation threshold must be at least 2, got {0}")]
    ConsolidationThreshold(usize),

    #[error("invalid checkpoint pattern {pattern:?}: {detail}")]
    InvalidPattern { pattern: String, detail: String },
}
