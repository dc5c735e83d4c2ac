//! Clock State Authority - the single lock around anchors and speed

use parking_lot::Mutex;

use timewarp_core::{ClockDomain, Speed};

use crate::{ClockState, RealClock, RealNow};

/// Shared clock state for every thread of the host process.
///
/// Readers and the single writer serialize on one mutex; a reader never
/// observes an anchor from one speed segment paired with another segment's
/// speed.
pub struct TimeAuthority {
    state: Mutex<ClockState>,
    scale_wallclock: bool,
}

impl TimeAuthority {
    /// Anchor both domains at the clock's current readings, speed 1.0
    pub fn new<C: RealClock + ?Sized>(clock: &C, scale_wallclock: bool) -> Self {
        Self::at(RealNow::sample(clock), scale_wallclock)
    }

    /// Anchor both domains at explicit readings, speed 1.0
    pub fn at(now: RealNow, scale_wallclock: bool) -> Self {
        TimeAuthority {
            state: Mutex::new(ClockState::new(now, scale_wallclock)),
            scale_wallclock,
        }
    }

    /// Whether reads of `domain` are transformed. Fixed for the process lifetime.
    #[inline]
    pub fn is_scaled(&self, domain: ClockDomain) -> bool {
        match domain {
            ClockDomain::Monotonic => true,
            ClockDomain::WallClock => self.scale_wallclock,
        }
    }

    /// Translate a real reading taken by the caller into virtual time
    pub fn read_virtual(&self, domain: ClockDomain, real_now_ns: i64) -> i64 {
        self.state.lock().read_virtual(domain, real_now_ns)
    }

    /// Current multiplier (a snapshot; may change immediately after)
    pub fn speed(&self) -> Speed {
        self.state.lock().speed()
    }

    /// Consistent copy of anchors and speed
    pub fn snapshot(&self) -> ClockState {
        *self.state.lock()
    }

    /// Change speed using readings the caller took immediately before the call
    pub fn set_speed_at(&self, new_speed: Speed, now: RealNow) {
        self.state.lock().rebase(new_speed, now);
    }

    /// Change speed, sampling the real clock inside the critical section so
    /// no reader can be ordered between the sample and the swap
    pub fn set_speed<C: RealClock + ?Sized>(&self, new_speed: Speed, clock: &C) {
        let mut state = self.state.lock();
        let now = RealNow::sample(clock);
        state.rebase(new_speed, now);
    }
}
