//! Stream plumbing for driving simulated units cycle by cycle.
//!
//! This crate provides:
//! - A block-allocated double-ended [`BitQueue`]
//! - The ready/valid/last handshake of a decoupled stream
//! - The register contract a simulated unit exposes ([`Device`])
//! - A three-phase clocked step and the multi-lane [`Stage`] driver
//! - Idle-cycle monitoring and CSV signal traces
//!
//! # Example
//!
//! ```rust,ignore
//! use tandem_stream::{Stage, StageLink};
//!
//! let mut stage = Stage::new("compressor", unit, 5000);
//! stage.reset()?;
//! let report = stage.step(&mut link)?;
//! assert!(report.moved());
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod bitqueue;
pub mod channel;
pub mod clock;
pub mod device;
pub mod driver;
pub mod error;
pub mod lane;
pub mod monitor;
pub mod trace;

pub use bitqueue::BitQueue;
pub use channel::{Direction, Handshake, Transfer};
pub use clock::Clocked;
pub use device::{Device, EdgeDetector, Element, Port, Registers};
pub use driver::{Offer, Stage, StageLink, StepReport};
pub use error::{Error, Result};
pub use lane::{BitLane, ByteLane};
pub use monitor::IdleMonitor;
pub use trace::SignalTrace;
