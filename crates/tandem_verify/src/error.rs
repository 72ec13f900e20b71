//! Error types for the verification pipeline.

use thiserror::Error;

/// Errors that abort a verification run.
///
/// Page mismatches are not errors; they are counted in the summary.
#[derive(Debug, Error)]
pub enum Error {
    /// A stage, lane or job buffer failed.
    #[error(transparent)]
    Stream(#[from] tandem_stream::Error),

    /// The report could not be written.
    #[error("report error: {0}")]
    Report(#[from] csv::Error),

    /// The dump could not be read or the report flushed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The summary could not be serialized.
    #[error("summary error: {0}")]
    Summary(#[from] serde_json::Error),

    /// The pipeline configuration cannot run.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Returns true if a stage exceeded its idle bound.
    pub fn is_deadlock(&self) -> bool {
        matches!(self, Self::Stream(e) if e.is_deadlock())
    }
}

/// Result type alias for verification operations.
pub type Result<T> = std::result::Result<T, Error>;
