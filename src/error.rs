//! Error types for higgsml
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// higgsml error types
///
/// Every variant is fatal: the pipeline has no recovery paths, callers
/// propagate with `?` and the process exits nonzero.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error: bad variable declarations, malformed or unknown
    /// hyperparameters, invalid split counts, out-of-order stage calls
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error: missing files, missing or mismatched named
    /// collections, schema problems
    #[error("Storage error: {0}")]
    Storage(String),

    /// Training error: degenerate or diverging fit
    #[error("Training error in method '{method}': {reason}")]
    Training {
        /// Registered name of the failing method
        method: String,
        /// What went wrong
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Report serialization error
    #[error("Report serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
