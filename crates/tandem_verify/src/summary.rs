//! Aggregate statistics of a verification run.

use crate::error::Result;
use serde::Serialize;

/// Running totals over every page and every finalized job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Bytes read from the dump.
    pub total_bytes: u64,
    /// Pages read from the dump, including all-zero pages.
    pub total_pages: u64,
    /// Bytes in pages with at least one non-zero byte.
    pub nonzero_bytes: u64,
    /// Pages with at least one non-zero byte; each becomes a job.
    pub nonzero_pages: u64,
    /// Jobs whose round trip reproduced the page.
    pub passed_pages: u64,
    /// Jobs whose round trip did not reproduce the page.
    pub failed_pages: u64,
    /// Compressed bits over all finalized jobs.
    pub compressed_bits: u64,
    /// Compressor cycles.
    pub compress_cycles: u64,
    /// Compressor cycles without any transfer.
    pub compress_stalls: u64,
    /// Decompressor cycles.
    pub decompress_cycles: u64,
    /// Decompressor cycles without any transfer.
    pub decompress_stalls: u64,
    /// `xxh64` digest of the decompressed pages in finalize order.
    pub digest: u64,
    /// A stage exceeded its idle bound and the run was aborted.
    pub timed_out: bool,
}

impl Summary {
    /// Counts a page read from the dump.
    pub fn record_page(&mut self, bytes: usize, zero: bool) {
        let bytes = bytes as u64;
        self.total_pages += 1;
        self.total_bytes += bytes;
        if !zero {
            self.nonzero_pages += 1;
            self.nonzero_bytes += bytes;
        }
    }

    /// Counts a finalized job.
    pub fn record_result(&mut self, passed: bool, compressed_bits: usize) {
        if passed {
            self.passed_pages += 1;
        } else {
            self.failed_pages += 1;
        }
        self.compressed_bits += compressed_bits as u64;
    }

    /// Fraction of jobs that passed.
    #[allow(clippy::cast_precision_loss)]
    pub fn pass_rate(&self) -> f64 {
        self.passed_pages as f64 / self.nonzero_pages as f64
    }

    /// Non-zero input bits per compressed bit.
    #[allow(clippy::cast_precision_loss)]
    pub fn compression_ratio(&self) -> f64 {
        self.nonzero_bytes as f64 / self.compressed_bits as f64 * 8.0
    }

    /// Non-zero input bytes per compressor cycle.
    #[allow(clippy::cast_precision_loss)]
    pub fn compress_throughput(&self) -> f64 {
        self.nonzero_bytes as f64 / self.compress_cycles as f64
    }

    /// Non-zero input bytes per decompressor cycle.
    #[allow(clippy::cast_precision_loss)]
    pub fn decompress_throughput(&self) -> f64 {
        self.nonzero_bytes as f64 / self.decompress_cycles as f64
    }

    /// Process exit status: failed pages, saturating at 255.
    pub fn exit_code(&self) -> u8 {
        u8::try_from(self.failed_pages).unwrap_or(u8::MAX)
    }

    /// Renders the summary as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_pages_count_only_in_totals() {
        let mut summary = Summary::default();
        summary.record_page(4096, false);
        summary.record_page(4096, true);
        summary.record_page(100, false);

        assert_eq!(summary.total_pages, 3);
        assert_eq!(summary.total_bytes, 8292);
        assert_eq!(summary.nonzero_pages, 2);
        assert_eq!(summary.nonzero_bytes, 4196);
    }

    #[test]
    fn rates() {
        let summary = Summary {
            nonzero_pages: 4,
            passed_pages: 3,
            failed_pages: 1,
            nonzero_bytes: 1000,
            compressed_bits: 4000,
            compress_cycles: 500,
            decompress_cycles: 250,
            ..Summary::default()
        };
        assert!((summary.pass_rate() - 0.75).abs() < f64::EPSILON);
        assert!((summary.compression_ratio() - 2.0).abs() < f64::EPSILON);
        assert!((summary.compress_throughput() - 2.0).abs() < f64::EPSILON);
        assert!((summary.decompress_throughput() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn exit_code_saturates() {
        let mut summary = Summary::default();
        assert_eq!(summary.exit_code(), 0);
        summary.failed_pages = 3;
        assert_eq!(summary.exit_code(), 3);
        summary.failed_pages = 1000;
        assert_eq!(summary.exit_code(), 255);
    }

    #[test]
    fn json_carries_timeout_flag() {
        let summary = Summary {
            timed_out: true,
            failed_pages: 2,
            ..Summary::default()
        };
        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(json["timed_out"], true);
        assert_eq!(json["failed_pages"], 2);
    }

    #[test]
    fn empty_run_has_undefined_rates() {
        assert!(Summary::default().pass_rate().is_nan());
    }
}
