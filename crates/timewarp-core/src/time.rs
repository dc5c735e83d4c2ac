//! Time primitives for timewarp
//!
//! All instants are signed 64-bit nanosecond counts on the clock they were
//! read from. Virtual time is derived from real time by an affine transform
//! whose slope is the current [`Speed`].

use std::fmt;

use crate::{TimewarpError, TimewarpResult};

pub const NANOS_PER_SEC: i64 = 1_000_000_000;
pub const NANOS_PER_MICRO: i64 = 1_000;
pub const MICROS_PER_SEC: i64 = 1_000_000;

/// Ratio of virtual-time elapse to real-time elapse
/// INVARIANT: finite and never negative
#[derive(Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Speed(f64);

impl Speed {
    /// Unscaled time
    pub const ONE: Speed = Speed(1.0);
    /// Virtual time stands still
    pub const FROZEN: Speed = Speed(0.0);

    /// Validate a raw multiplier
    pub fn new(value: f64) -> TimewarpResult<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(TimewarpError::InvalidSpeed(value));
        }
        Ok(Speed(value))
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn is_frozen(self) -> bool {
        self.0 == 0.0
    }

    /// Real duration that must elapse for `virtual_ns` of virtual time to pass.
    /// A frozen speed has no meaningful conversion, so the request is returned unscaled.
    #[inline]
    pub fn virtual_to_real(self, virtual_ns: i64) -> i64 {
        if self.0 <= 0.0 {
            return virtual_ns;
        }
        scale_delta(virtual_ns, 1.0 / self.0)
    }

    /// Virtual duration corresponding to `real_ns` of real time
    #[inline]
    pub fn real_to_virtual(self, real_ns: i64) -> i64 {
        scale_delta(real_ns, self.0)
    }
}

impl fmt::Debug for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

impl TryFrom<f64> for Speed {
    type Error = TimewarpError;

    fn try_from(value: f64) -> TimewarpResult<Self> {
        Speed::new(value)
    }
}

impl TryFrom<f32> for Speed {
    type Error = TimewarpError;

    fn try_from(value: f32) -> TimewarpResult<Self> {
        Speed::new(value as f64)
    }
}

/// Clock family a clock id belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClockDomain {
    /// Non-decreasing clocks not subject to calendar adjustment
    Monotonic,
    /// Calendar time
    WallClock,
}

impl ClockDomain {
    pub const ALL: [ClockDomain; 2] = [ClockDomain::Monotonic, ClockDomain::WallClock];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            ClockDomain::Monotonic => 0,
            ClockDomain::WallClock => 1,
        }
    }
}

/// Multiply a nanosecond delta by `factor`, truncating toward zero.
/// Saturates at the i64 bounds; a NaN product yields zero.
#[inline]
pub fn scale_delta(delta_ns: i64, factor: f64) -> i64 {
    (delta_ns as f64 * factor) as i64
}

/// Seconds + nanoseconds (a `timespec`) to nanoseconds
#[inline]
pub fn secs_nanos_to_ns(secs: i64, nanos: i64) -> i64 {
    secs.saturating_mul(NANOS_PER_SEC).saturating_add(nanos)
}

/// Nanoseconds to seconds + nanoseconds. Negative input clamps to zero.
#[inline]
pub fn ns_to_secs_nanos(ns: i64) -> (i64, i64) {
    if ns < 0 {
        return (0, 0);
    }
    (ns / NANOS_PER_SEC, ns % NANOS_PER_SEC)
}

/// Seconds + microseconds (a `timeval`) to nanoseconds
#[inline]
pub fn secs_micros_to_ns(secs: i64, micros: i64) -> i64 {
    secs_nanos_to_ns(secs, micros.saturating_mul(NANOS_PER_MICRO))
}

/// Nanoseconds to seconds + microseconds. Negative input clamps to zero.
#[inline]
pub fn ns_to_secs_micros(ns: i64) -> (i64, i64) {
    let (secs, nanos) = ns_to_secs_nanos(ns);
    (secs, nanos / NANOS_PER_MICRO)
}
