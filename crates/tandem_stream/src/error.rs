//! Error types for stream operations.

use crate::channel::Direction;
use thiserror::Error;

/// Errors that can occur while moving data through a stage.
#[derive(Debug, Error)]
pub enum Error {
    /// Memory for a buffer block could not be obtained.
    #[error("allocation failed: {what}")]
    AllocationFailure {
        /// Which buffer was growing.
        what: &'static str,
    },

    /// A pop was attempted on an empty bit queue.
    #[error("bit queue is empty")]
    EmptyQueue,

    /// A lane reported a valid or ready count outside `[0, width]`.
    #[error("protocol violation on {direction} lane {lane}: valid={valid} ready={ready} width={width}")]
    ProtocolViolation {
        /// Lane index within the port bank.
        lane: usize,
        /// Which side of the device the lane belongs to.
        direction: Direction,
        /// Elements the source claimed.
        valid: usize,
        /// Elements the sink accepted.
        ready: usize,
        /// Declared lane width.
        width: usize,
    },

    /// A stage made no transfer for longer than the idle bound.
    #[error("hardware deadlock in {stage}: idle for {idle_cycles} cycles (total {cycles} cycles)")]
    HardwareDeadlock {
        /// Name of the stalled stage.
        stage: String,
        /// Consecutive cycles without a transfer.
        idle_cycles: u64,
        /// Total cycles the stage has run.
        cycles: u64,
    },

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Signal trace could not be written.
    #[error(transparent)]
    Trace(#[from] csv::Error),
}

impl Error {
    /// Creates an allocation failure for the named buffer.
    pub const fn allocation(what: &'static str) -> Self {
        Self::AllocationFailure { what }
    }

    /// Returns true if this error is an idle-timeout abort.
    pub const fn is_deadlock(&self) -> bool {
        matches!(self, Self::HardwareDeadlock { .. })
    }
}

/// Result type alias for stream operations.
pub type Result<T> = std::result::Result<T, Error>;
