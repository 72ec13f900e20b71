//! Verification pipeline configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tandem_stream::monitor::DEFAULT_IDLE_LIMIT;

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default number of job slots.
pub const DEFAULT_CAPACITY: usize = 10;

/// Configuration for a verification run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bytes per job.
    pub page_size: usize,
    /// Job slots in flight.
    pub capacity: usize,
    /// Consecutive idle cycles after which a stage is declared dead.
    pub idle_limit: u64,
    /// Job whose payloads are dumped verbatim into the report.
    pub debug_job: Option<u64>,
    /// Name of the dump, echoed in every report row.
    pub dump_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            capacity: DEFAULT_CAPACITY,
            idle_limit: DEFAULT_IDLE_LIMIT,
            debug_job: None,
            dump_name: "-".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Sets the page size.
    #[must_use]
    pub const fn with_page_size(mut self, bytes: usize) -> Self {
        self.page_size = bytes;
        self
    }

    /// Sets the number of job slots.
    #[must_use]
    pub const fn with_capacity(mut self, slots: usize) -> Self {
        self.capacity = slots;
        self
    }

    /// Sets the idle bound.
    #[must_use]
    pub const fn with_idle_limit(mut self, cycles: u64) -> Self {
        self.idle_limit = cycles;
        self
    }

    /// Selects a job for the verbatim debug dump.
    #[must_use]
    pub const fn with_debug_job(mut self, id: u64) -> Self {
        self.debug_job = Some(id);
        self
    }

    /// Sets the dump name.
    #[must_use]
    pub fn with_dump_name(mut self, name: impl Into<String>) -> Self {
        self.dump_name = name.into();
        self
    }

    /// Checks that the pipeline can run with these settings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a zero page size, capacity or idle bound.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::InvalidConfig("page size must be positive".into()));
        }
        if self.capacity == 0 {
            return Err(Error::InvalidConfig("capacity must be positive".into()));
        }
        if self.idle_limit == 0 {
            return Err(Error::InvalidConfig("idle limit must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_page_and_ring_size() {
        let config = PipelineConfig::default();
        assert_eq!(config.page_size, 4096);
        assert_eq!(config.capacity, 10);
        assert_eq!(config.idle_limit, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = PipelineConfig::default().with_capacity(0).validate().unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }
}
