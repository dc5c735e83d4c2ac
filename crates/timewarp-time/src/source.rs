//! Real clock sources

use std::sync::atomic::{AtomicI64, Ordering};

use timewarp_core::ClockDomain;

/// Reads the underlying (unscaled) clock for a domain, in nanoseconds
pub trait RealClock {
    fn now_ns(&self, domain: ClockDomain) -> i64;
}

impl<C: RealClock + ?Sized> RealClock for &C {
    fn now_ns(&self, domain: ClockDomain) -> i64 {
        (**self).now_ns(domain)
    }
}

/// One reading of every domain, taken back to back
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RealNow {
    pub monotonic: i64,
    pub wallclock: i64,
}

impl RealNow {
    pub fn sample<C: RealClock + ?Sized>(clock: &C) -> Self {
        RealNow {
            monotonic: clock.now_ns(ClockDomain::Monotonic),
            wallclock: clock.now_ns(ClockDomain::WallClock),
        }
    }

    #[inline]
    pub fn get(&self, domain: ClockDomain) -> i64 {
        match domain {
            ClockDomain::Monotonic => self.monotonic,
            ClockDomain::WallClock => self.wallclock,
        }
    }
}

/// Hand-driven clock for tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock {
    monotonic: AtomicI64,
    wallclock: AtomicI64,
}

impl ManualClock {
    pub fn new(monotonic: i64, wallclock: i64) -> Self {
        ManualClock {
            monotonic: AtomicI64::new(monotonic),
            wallclock: AtomicI64::new(wallclock),
        }
    }

    /// Advance both domains by the same real duration
    pub fn advance(&self, ns: i64) {
        self.monotonic.fetch_add(ns, Ordering::SeqCst);
        self.wallclock.fetch_add(ns, Ordering::SeqCst);
    }

    /// Step one domain to an absolute reading
    pub fn set(&self, domain: ClockDomain, ns: i64) {
        match domain {
            ClockDomain::Monotonic => self.monotonic.store(ns, Ordering::SeqCst),
            ClockDomain::WallClock => self.wallclock.store(ns, Ordering::SeqCst),
        }
    }
}

impl RealClock for ManualClock {
    fn now_ns(&self, domain: ClockDomain) -> i64 {
        match domain {
            ClockDomain::Monotonic => self.monotonic.load(Ordering::SeqCst),
            ClockDomain::WallClock => self.wallclock.load(Ordering::SeqCst),
        }
    }
}
