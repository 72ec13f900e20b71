//! Per-job report rows, debug dumps and the closing trailer.
//!
//! Rows are CSV; the header is written with the first row, so a run
//! without jobs produces only the trailer. Debug dumps and the trailer are
//! free text interleaved with the rows.

use crate::error::Result;
use crate::job::Job;
use crate::summary::Summary;
use serde::Serialize;
use std::io::Write;

const BANNER: &str = "====================";

#[derive(Debug, Serialize)]
struct JobRecord<'a> {
    dump: &'a str,
    id: u64,
    #[serde(rename = "pass?")]
    pass: &'static str,
    #[serde(rename = "raw size")]
    raw_size: usize,
    #[serde(rename = "compressed size")]
    compressed_size: usize,
    #[serde(rename = "cycles in compressor")]
    compress_cycles: u64,
    #[serde(rename = "cycles in decompressor")]
    decompress_cycles: u64,
}

/// Writes the verification report.
#[derive(Debug)]
pub struct ReportWriter<W: Write> {
    rows: csv::Writer<W>,
    dump: String,
}

impl<W: Write> ReportWriter<W> {
    /// Creates a report for the dump called `dump`.
    pub fn new(sink: W, dump: impl Into<String>) -> Self {
        let rows = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(sink);
        Self {
            rows,
            dump: dump.into(),
        }
    }

    /// Appends the row of a finalized job.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    pub fn record(&mut self, job: &Job, passed: bool) -> Result<()> {
        self.rows.serialize(JobRecord {
            dump: &self.dump,
            id: job.id,
            pass: if passed { "pass" } else { "fail" },
            raw_size: job.raw.len(),
            compressed_size: job.compressed.len(),
            compress_cycles: job.compress_cycles,
            decompress_cycles: job.decompress_cycles,
        })?;
        Ok(())
    }

    /// Writes the payloads of `job` verbatim between banners.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be written.
    pub fn debug_dump(&mut self, job: &Job) -> Result<()> {
        self.rows.flush()?;
        let out = self.rows.get_mut();

        writeln!(out)?;
        writeln!(out, "{BANNER}\n| BEGIN DEBUG DUMP |\n{BANNER}")?;
        writeln!(out, "job ID: {}", job.id)?;

        writeln!(out, "raw: (length = {})", job.raw.len())?;
        out.write_all(&job.raw)?;
        writeln!(out, "\n")?;

        writeln!(out, "compressed: (length = {})", job.compressed.len())?;
        out.write_all(job.compressed.as_bytes())?;
        writeln!(out, "\n")?;

        writeln!(out, "decompressed: (length = {})", job.decompressed.len())?;
        out.write_all(&job.decompressed)?;
        writeln!(out, "\n")?;

        writeln!(out, "{BANNER}\n|  END DEBUG DUMP  |\n{BANNER}\n")?;
        Ok(())
    }

    /// Writes the aggregate totals that close the report.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be written.
    pub fn trailer(&mut self, summary: &Summary) -> Result<()> {
        self.rows.flush()?;
        let out = self.rows.get_mut();

        if summary.timed_out {
            writeln!(out, "***** TIMEOUT *****")?;
        } else {
            writeln!(out, "***** FINISHED *****")?;
        }
        writeln!(out, "dumps: {}", self.dump)?;
        writeln!(out, "total (bytes): {}", summary.total_bytes)?;
        writeln!(out, "total (pages): {}", summary.total_pages)?;
        writeln!(out, "non-zero (bytes): {}", summary.nonzero_bytes)?;
        writeln!(out, "non-zero (pages): {}", summary.nonzero_pages)?;
        writeln!(out, "passed (pages): {}", summary.passed_pages)?;
        writeln!(out, "failed (pages): {}", summary.failed_pages)?;
        writeln!(out, "pass rate: {:.6}", summary.pass_rate())?;
        writeln!(out, "compressed (bits): {}", summary.compressed_bits)?;
        writeln!(out, "compression ratio: {:.6}", summary.compression_ratio())?;
        writeln!(out, "C-cycles: {}", summary.compress_cycles)?;
        writeln!(out, "C-throughput (B/c): {:.6}", summary.compress_throughput())?;
        writeln!(out, "D-cycles: {}", summary.decompress_cycles)?;
        writeln!(out, "D-throughput (B/c): {:.6}", summary.decompress_throughput())?;
        Ok(())
    }

    /// Flushes buffered rows and the underlying sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be flushed.
    pub fn flush(&mut self) -> Result<()> {
        self.rows.flush()?;
        Ok(())
    }

    /// Flushes and returns the underlying sink.
    ///
    /// # Errors
    ///
    /// Returns an error if buffered rows cannot be written.
    pub fn into_inner(self) -> Result<W> {
        self.rows
            .into_inner()
            .map_err(|e| e.into_error().into())
    }
}
