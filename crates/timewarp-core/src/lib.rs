//! timewarp core - shared primitives for scaled-time interposition
//!
//! This crate provides:
//! - `Speed`: the validated virtual/real rate multiplier
//! - `ClockDomain`: Monotonic vs WallClock
//! - Nanosecond conversion and scaling arithmetic
//! - Error types and environment-driven configuration

pub mod config;
pub mod error;
pub mod time;

pub use config::*;
pub use error::*;
pub use time::*;
