//! Fused two-stage streaming for Tandem.
//!
//! This crate provides:
//! - The water-mark [`Scheduler`] with its stall override and fallback
//! - [`FusedHarness`]: stage A and stage B coupled through bit lanes
//! - [`HarnessConfig`] with serde support for configuration files
//!
//! # Example
//!
//! ```rust,ignore
//! use tandem_harness::{FusedHarness, HarnessConfig};
//!
//! let mut harness = FusedHarness::new(front, back, &HarnessConfig::default());
//! let report = harness.run(&mut input, &mut output)?;
//! eprintln!("{report}");
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod error;
pub mod fused;
pub mod scheduler;

pub use config::HarnessConfig;
pub use error::{Error, Result};
pub use fused::{FusedHarness, StreamReport};
pub use scheduler::{Decision, LaneState, Occupancy, Scheduler, StallTracker};
