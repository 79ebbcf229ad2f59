//! Error types for log analysis and aggregation.
//!
//! Only structurally invalid input is an error. Absent columns, all-null
//! series and degenerate arithmetic resolve to `None` where they occur.

use thiserror::Error;

/// Errors that abort the analysis of one file or one aggregation request.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No valid timestamped rows, or a required top-level column is missing.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Empty or malformed list of analyses passed to the aggregator.
    #[error("invalid aggregation input: {0}")]
    AggregationInput(String),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// A panic caught at the request boundary.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
