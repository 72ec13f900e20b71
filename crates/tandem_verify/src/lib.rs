//! Round-trip verification of a compressor/decompressor pair for Tandem.
//!
//! This crate provides:
//! - [`JobPipeline`]: pages of a dump pipelined through both units
//! - Per-job pass/fail checking with aggregate [`Summary`] statistics
//! - A CSV [`ReportWriter`] with optional verbatim debug dumps
//! - [`PipelineConfig`] with serde support for configuration files
//!
//! # Example
//!
//! ```rust,ignore
//! use tandem_verify::{JobPipeline, PipelineConfig, ReportWriter};
//!
//! let mut pipeline = JobPipeline::new(compressor, decompressor, &PipelineConfig::default())?;
//! let mut report = ReportWriter::new(std::io::stdout(), "pages.bin");
//! let summary = pipeline.run(&mut dump, &mut report)?;
//! std::process::exit(summary.exit_code().into());
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod report;
pub mod summary;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use job::{Job, PackedBits, Phase};
pub use pipeline::JobPipeline;
pub use report::ReportWriter;
pub use summary::Summary;
