//! Interposition dispatch: real results in, virtual results out
//!
//! Every method mirrors the libc function it replaces, including return
//! codes and out-parameter handling. On failure of the underlying call the
//! output buffer is left exactly as the real primitive left it.

use std::ffi::{c_int, c_uint, c_void};
use std::ptr;

use libc::{clockid_t, time_t, timespec, timeval, useconds_t};

use timewarp_control::SpeedSink;
use timewarp_core::{
    ns_to_secs_micros, ns_to_secs_nanos, secs_micros_to_ns, secs_nanos_to_ns, ClockDomain, Speed,
    MICROS_PER_SEC, NANOS_PER_MICRO, NANOS_PER_SEC,
};
use timewarp_time::{SleepPlan, TimeAuthority};

use crate::real::{errno, PrimitiveClock, RealPrimitives};

/// Clock domain of a clock id, `None` for clocks that are never scaled
pub fn clock_domain(clock: clockid_t) -> Option<ClockDomain> {
    match clock {
        libc::CLOCK_MONOTONIC
        | libc::CLOCK_MONOTONIC_RAW
        | libc::CLOCK_MONOTONIC_COARSE
        | libc::CLOCK_BOOTTIME => Some(ClockDomain::Monotonic),
        libc::CLOCK_REALTIME | libc::CLOCK_REALTIME_COARSE => Some(ClockDomain::WallClock),
        _ => None,
    }
}

#[inline]
pub fn timespec_ns(ts: &timespec) -> i64 {
    secs_nanos_to_ns(ts.tv_sec as i64, ts.tv_nsec as i64)
}

#[inline]
pub fn ns_timespec(ns: i64) -> timespec {
    let (secs, nanos) = ns_to_secs_nanos(ns);
    timespec {
        tv_sec: secs as time_t,
        tv_nsec: nanos as _,
    }
}

/// A request the kernel would reject with EINVAL; such requests are not rewritten
#[inline]
fn is_valid_request(ts: &timespec) -> bool {
    ts.tv_sec >= 0 && (0..NANOS_PER_SEC).contains(&(ts.tv_nsec as i64))
}

/// The virtualizing layer between the host process and the real primitives
pub struct Dispatcher<P> {
    real: P,
    authority: TimeAuthority,
}

impl<P: RealPrimitives> Dispatcher<P> {
    /// Anchor both domains at the real clocks' current readings, speed 1.0
    pub fn new(real: P, scale_wallclock: bool) -> Self {
        let authority = TimeAuthority::new(&PrimitiveClock(&real), scale_wallclock);
        Dispatcher { real, authority }
    }

    pub fn real(&self) -> &P {
        &self.real
    }

    pub fn authority(&self) -> &TimeAuthority {
        &self.authority
    }

    pub fn speed(&self) -> Speed {
        self.authority.speed()
    }

    /// Re-anchor at fresh real readings and switch speed
    pub fn set_speed(&self, speed: Speed) {
        self.authority.set_speed(speed, &PrimitiveClock(&self.real));
    }

    /// Current virtual reading of a domain, or `None` if the real clock failed
    pub fn now_virtual(&self, domain: ClockDomain) -> Option<i64> {
        let clock = match domain {
            ClockDomain::Monotonic => libc::CLOCK_MONOTONIC,
            ClockDomain::WallClock => libc::CLOCK_REALTIME,
        };
        let mut ts = ns_timespec(0);
        if unsafe { self.real.clock_gettime(clock, &mut ts) } != 0 {
            return None;
        }
        Some(self.authority.read_virtual(domain, timespec_ns(&ts)))
    }

    pub unsafe fn clock_gettime(&self, clock: clockid_t, tp: *mut timespec) -> c_int {
        let rc = self.real.clock_gettime(clock, tp);
        if rc != 0 || tp.is_null() {
            return rc;
        }
        let Some(domain) = clock_domain(clock).filter(|d| self.authority.is_scaled(*d)) else {
            return rc;
        };

        let ts = &mut *tp;
        let virtual_ns = self.authority.read_virtual(domain, timespec_ns(ts));
        *ts = ns_timespec(virtual_ns);
        rc
    }

    pub unsafe fn gettimeofday(&self, tv: *mut timeval, tz: *mut c_void) -> c_int {
        let rc = self.real.gettimeofday(tv, tz);
        if rc != 0 || tv.is_null() || !self.authority.is_scaled(ClockDomain::WallClock) {
            return rc;
        }

        let tv = &mut *tv;
        let real_ns = secs_micros_to_ns(tv.tv_sec as i64, tv.tv_usec as i64);
        let (secs, micros) = ns_to_secs_micros(
            self.authority.read_virtual(ClockDomain::WallClock, real_ns),
        );
        debug_assert!(micros < MICROS_PER_SEC);
        tv.tv_sec = secs as time_t;
        tv.tv_usec = micros as _;
        rc
    }

    pub unsafe fn time(&self, tloc: *mut time_t) -> time_t {
        if !self.authority.is_scaled(ClockDomain::WallClock) {
            return self.real.time(tloc);
        }
        let Some(virtual_ns) = self.now_virtual(ClockDomain::WallClock) else {
            return self.real.time(tloc);
        };

        let secs = ns_to_secs_nanos(virtual_ns).0 as time_t;
        if !tloc.is_null() {
            *tloc = secs;
        }
        secs
    }

    pub unsafe fn nanosleep(&self, req: *const timespec, rem: *mut timespec) -> c_int {
        if req.is_null() || !is_valid_request(&*req) {
            return self.real.nanosleep(req, rem);
        }
        let plan = SleepPlan::new(timespec_ns(&*req), self.authority.speed());
        if plan.is_passthrough() {
            return self.real.nanosleep(req, rem);
        }

        let adjusted = ns_timespec(plan.real_ns());
        let mut real_rem = ns_timespec(0);
        let rem_arg = if rem.is_null() {
            ptr::null_mut()
        } else {
            &mut real_rem as *mut timespec
        };

        let rc = self.real.nanosleep(&adjusted, rem_arg);
        if rc != 0 && !rem.is_null() && errno() == libc::EINTR {
            *rem = ns_timespec(plan.virtual_remaining(timespec_ns(&real_rem)));
        }
        rc
    }

    pub unsafe fn clock_nanosleep(
        &self,
        clock: clockid_t,
        flags: c_int,
        req: *const timespec,
        rem: *mut timespec,
    ) -> c_int {
        // absolute deadlines are already in the (scaled) clock's own units
        if req.is_null() || flags & libc::TIMER_ABSTIME != 0 || !is_valid_request(&*req) {
            return self.real.clock_nanosleep(clock, flags, req, rem);
        }
        let plan = SleepPlan::new(timespec_ns(&*req), self.authority.speed());
        if plan.is_passthrough() {
            return self.real.clock_nanosleep(clock, flags, req, rem);
        }

        let adjusted = ns_timespec(plan.real_ns());
        let mut real_rem = ns_timespec(0);
        let rem_arg = if rem.is_null() {
            ptr::null_mut()
        } else {
            &mut real_rem as *mut timespec
        };

        let rc = self.real.clock_nanosleep(clock, flags, &adjusted, rem_arg);
        if rc == libc::EINTR && !rem.is_null() {
            *rem = ns_timespec(plan.virtual_remaining(timespec_ns(&real_rem)));
        }
        rc
    }

    pub unsafe fn usleep(&self, usec: useconds_t) -> c_int {
        let ns = usec as i64 * NANOS_PER_MICRO;
        let req = ns_timespec(ns);
        self.nanosleep(&req, ptr::null_mut())
    }

    pub unsafe fn sleep(&self, seconds: c_uint) -> c_uint {
        let req = timespec {
            tv_sec: seconds as time_t,
            tv_nsec: 0,
        };
        let mut rem = ns_timespec(0);
        if self.nanosleep(&req, &mut rem) == 0 {
            return 0;
        }
        if errno() != libc::EINTR {
            return seconds;
        }
        // glibc rounds the unslept time to the nearest second
        let round_up = rem.tv_nsec as i64 >= NANOS_PER_SEC / 2;
        (rem.tv_sec as i64 + round_up as i64).clamp(0, c_uint::MAX as i64) as c_uint
    }
}

/// Control frames land directly on the dispatcher's authority
impl<P: RealPrimitives> SpeedSink for Dispatcher<P> {
    fn apply_speed(&self, speed: Speed) {
        self.set_speed(speed);
    }
}
