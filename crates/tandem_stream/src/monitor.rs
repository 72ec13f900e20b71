//! Per-stage idle-cycle monitoring.

use crate::error::{Error, Result};
use tracing::error;

/// Default number of consecutive idle cycles before a stage is declared dead.
pub const DEFAULT_IDLE_LIMIT: u64 = 5000;

/// Counts consecutive and total cycles in which a stage moved nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleMonitor {
    limit: u64,
    idle: u64,
    stalls: u64,
}

impl Default for IdleMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_LIMIT)
    }
}

impl IdleMonitor {
    /// Creates a monitor that trips after `limit` idle cycles.
    pub const fn new(limit: u64) -> Self {
        Self {
            limit,
            idle: 0,
            stalls: 0,
        }
    }

    /// Records one cycle; `moved` is true if any lane transferred.
    pub fn record(&mut self, moved: bool) {
        if moved {
            self.idle = 0;
        } else {
            self.idle += 1;
            self.stalls += 1;
        }
    }

    /// Consecutive idle cycles.
    pub const fn idle(&self) -> u64 {
        self.idle
    }

    /// Total idle cycles since creation.
    pub const fn stalls(&self) -> u64 {
        self.stalls
    }

    /// Returns true once the idle bound has been reached.
    pub const fn is_expired(&self) -> bool {
        self.idle >= self.limit
    }

    /// Fails with `HardwareDeadlock` once the idle bound has been reached.
    ///
    /// # Errors
    ///
    /// Returns `HardwareDeadlock` naming the stage and its cycle counts.
    pub fn check(&self, stage: &str, cycles: u64) -> Result<()> {
        if !self.is_expired() {
            return Ok(());
        }
        error!(
            stage,
            idle = self.idle,
            cycles,
            "stage made no transfer within the idle bound"
        );
        Err(Error::HardwareDeadlock {
            stage: stage.to_string(),
            idle_cycles: self.idle,
            cycles,
        })
    }
}
