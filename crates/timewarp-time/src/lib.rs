//! timewarp Time Engine - scaled virtual clocks
//!
//! This crate implements the clock state authority:
//! - Per-domain anchors mapping real time to virtual time
//! - Continuous speed changes by re-anchoring before the swap
//! - A single lock giving readers a consistent (anchor, speed) pair
//! - Conversion of virtual sleep requests to real waits

pub mod authority;
pub mod clock;
pub mod sleep;
pub mod source;

pub use authority::*;
pub use clock::*;
pub use sleep::*;
pub use source::*;
