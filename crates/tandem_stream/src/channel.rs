//! The one-cycle handshake of a decoupled stream.
//!
//! Each cycle the source presents `valid` elements and a `last` flag, the
//! sink presents `ready`. Exactly `min(valid, ready)` elements move. The
//! logical message completes (`restart`) when the source flagged `last` and
//! every presented element was taken.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of a device a lane belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Data flows from the harness into the device.
    Input,
    /// Data flows from the device into the harness.
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Signals presented on one lane during one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Handshake {
    /// Elements the source claims ready.
    pub valid: usize,
    /// Elements the sink can accept.
    pub ready: usize,
    /// Source marks the presented chunk as the end of the message.
    pub last: bool,
}

/// Outcome of a resolved handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transfer {
    /// Elements moved from source to sink.
    pub consumed: usize,
    /// The message's last element was transferred.
    pub restart: bool,
}

impl Transfer {
    /// Returns true if at least one element moved.
    pub const fn moved(&self) -> bool {
        self.consumed > 0
    }
}

impl Handshake {
    /// Creates a handshake from the three lane signals.
    pub const fn new(valid: usize, ready: usize, last: bool) -> Self {
        Self { valid, ready, last }
    }

    /// Resolves the handshake for a lane of the given width.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if `valid` or `ready` exceeds `width`.
    pub fn resolve(self, width: usize, lane: usize, direction: Direction) -> Result<Transfer> {
        if self.valid > width || self.ready > width {
            return Err(Error::ProtocolViolation {
                lane,
                direction,
                valid: self.valid,
                ready: self.ready,
                width,
            });
        }

        let consumed = self.valid.min(self.ready);
        Ok(Transfer {
            consumed,
            restart: self.last && consumed == self.valid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn partial_transfer_does_not_restart() {
        let transfer = Handshake::new(8, 3, true)
            .resolve(8, 0, Direction::Input)
            .unwrap();
        assert_eq!(transfer.consumed, 3);
        assert!(!transfer.restart);
    }

    #[test]
    fn empty_last_chunk_restarts() {
        let transfer = Handshake::new(0, 0, true)
            .resolve(4, 0, Direction::Output)
            .unwrap();
        assert_eq!(transfer.consumed, 0);
        assert!(transfer.restart);
        assert!(!transfer.moved());
    }

    #[test]
    fn oversized_valid_is_rejected() {
        let err = Handshake::new(9, 0, false)
            .resolve(8, 2, Direction::Output)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ProtocolViolation {
                lane: 2,
                valid: 9,
                width: 8,
                ..
            }
        ));
    }

    proptest! {
        #[test]
        fn consumed_is_min_of_valid_and_ready(
            (width, valid, ready, last) in (1usize..64).prop_flat_map(|w| {
                (Just(w), 0..=w, 0..=w, any::<bool>())
            }),
        ) {
            let transfer = Handshake::new(valid, ready, last)
                .resolve(width, 0, Direction::Input)
                .unwrap();

            prop_assert_eq!(transfer.consumed, valid.min(ready));
            prop_assert!(transfer.consumed <= valid && transfer.consumed <= ready);
            prop_assert_eq!(transfer.restart, last && transfer.consumed == valid);
        }
    }
}
