//! Reference stream units for exercising Tandem harnesses.
//!
//! This crate provides:
//! - [`Serializer`] / [`Deserializer`]: an identity pair that splits bytes
//!   into bit lanes and joins them back
//! - [`Blackhole`]: a unit that never finishes its output message
//! - [`Throttle`]: seeded chaos that narrows lanes cycle by cycle
//! - Property-based generators for pages, dumps and chaos settings
//!
//! # Example
//!
//! ```rust,ignore
//! use tandem_units::{Serializer, Throttle, ThrottleConfig};
//!
//! let unit = Throttle::new(Serializer::<8, 8, 24>::new(), ThrottleConfig::default());
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod fifo;
pub mod generators;
pub mod serial;
pub mod sink;
pub mod throttle;

pub use fifo::MessageFifo;
pub use serial::{Deserializer, Serializer};
pub use sink::Blackhole;
pub use throttle::{Throttle, ThrottleConfig};
