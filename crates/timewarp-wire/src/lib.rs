//! timewarp wire protocol - speed control frames
//!
//! The control stream is a sequence of fixed 4-byte frames, each a
//! native-endian IEEE-754 `f32` speed multiplier. There is no header,
//! no acknowledgement and no framing beyond the fixed size.

pub mod frame;

pub use frame::*;
