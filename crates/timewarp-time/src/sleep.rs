//! Virtual sleep requests converted to real waits
//!
//! The speed is sampled once when the sleep is issued. A speed change during
//! the real wait does not stretch or shorten it.

use timewarp_core::Speed;

/// A relative sleep translated from virtual to real time
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SleepPlan {
    speed: Speed,
    requested_ns: i64,
    real_ns: i64,
}

impl SleepPlan {
    /// Plan a sleep of `requested_ns` virtual nanoseconds at `speed`
    pub fn new(requested_ns: i64, speed: Speed) -> Self {
        SleepPlan {
            speed,
            requested_ns,
            real_ns: speed.virtual_to_real(requested_ns),
        }
    }

    /// A frozen speed cannot be inverted; such sleeps run unscaled
    #[inline]
    pub fn is_passthrough(&self) -> bool {
        self.speed.get() <= 0.0
    }

    #[inline]
    pub fn speed(&self) -> Speed {
        self.speed
    }

    #[inline]
    pub fn requested_ns(&self) -> i64 {
        self.requested_ns
    }

    /// Real nanoseconds to actually wait
    #[inline]
    pub fn real_ns(&self) -> i64 {
        self.real_ns
    }

    /// Remaining time to report after an interrupted wait, in virtual units
    pub fn virtual_remaining(&self, real_remaining_ns: i64) -> i64 {
        if self.is_passthrough() {
            return real_remaining_ns;
        }
        self.speed.real_to_virtual(real_remaining_ns)
    }
}
