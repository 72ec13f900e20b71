//! Error types for the streaming harness.

use thiserror::Error;

/// Errors that can abort a streaming run.
#[derive(Debug, Error)]
pub enum Error {
    /// A stage, lane or buffer failed.
    #[error(transparent)]
    Stream(#[from] tandem_stream::Error),

    /// The output sink failed.
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, Error>;
