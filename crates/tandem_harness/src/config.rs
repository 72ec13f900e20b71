//! Streaming harness configuration.

use serde::{Deserialize, Serialize};
use tandem_stream::monitor::DEFAULT_IDLE_LIMIT;

/// Configuration for a fused two-stage run.
///
/// Water marks and the middle lane capacity default to values derived from
/// the stage widths when left unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Consecutive idle cycles after which a stage is declared dead.
    pub idle_limit: u64,
    /// Iterations a stage may go without progress before the other is
    /// forced to step.
    pub stall_override: u32,
    /// Stage A steps while some middle lane holds at most this many bits.
    pub low_water: Option<usize>,
    /// Stage B steps once every middle lane holds at least this many bits.
    pub high_water: Option<usize>,
    /// Bits each middle lane can hold.
    pub lane_capacity: Option<usize>,
    /// Iteration cap; reaching it ends the run as timed out.
    pub max_iterations: Option<u64>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            idle_limit: DEFAULT_IDLE_LIMIT,
            stall_override: 3,
            low_water: None,
            high_water: None,
            lane_capacity: None,
            max_iterations: None,
        }
    }
}

impl HarnessConfig {
    /// Sets the idle bound.
    #[must_use]
    pub const fn with_idle_limit(mut self, cycles: u64) -> Self {
        self.idle_limit = cycles;
        self
    }

    /// Sets the stall override threshold.
    #[must_use]
    pub const fn with_stall_override(mut self, iterations: u32) -> Self {
        self.stall_override = iterations;
        self
    }

    /// Sets both water marks.
    #[must_use]
    pub const fn with_water_marks(mut self, low: usize, high: usize) -> Self {
        self.low_water = Some(low);
        self.high_water = Some(high);
        self
    }

    /// Sets the middle lane capacity.
    #[must_use]
    pub const fn with_lane_capacity(mut self, bits: usize) -> Self {
        self.lane_capacity = Some(bits);
        self
    }

    /// Caps the number of outer iterations.
    #[must_use]
    pub const fn with_max_iterations(mut self, iterations: u64) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: HarnessConfig = serde_json::from_str(r#"{"idle_limit": 100}"#).unwrap();
        assert_eq!(config.idle_limit, 100);
        assert_eq!(config.stall_override, 3);
        assert!(config.max_iterations.is_none());
    }
}
