//! The underlying libc primitives, resolved with `dlsym(RTLD_NEXT, ..)`

use std::ffi::{c_char, c_int, c_uint, c_void};

use libc::{clockid_t, time_t, timespec, timeval, useconds_t};

use timewarp_core::ClockDomain;
use timewarp_time::RealClock;

type ClockGettimeFn = unsafe extern "C" fn(clockid_t, *mut timespec) -> c_int;
type GettimeofdayFn = unsafe extern "C" fn(*mut timeval, *mut c_void) -> c_int;
type TimeFn = unsafe extern "C" fn(*mut time_t) -> time_t;
type NanosleepFn = unsafe extern "C" fn(*const timespec, *mut timespec) -> c_int;
type ClockNanosleepFn =
    unsafe extern "C" fn(clockid_t, c_int, *const timespec, *mut timespec) -> c_int;
type UsleepFn = unsafe extern "C" fn(useconds_t) -> c_int;
type SleepFn = unsafe extern "C" fn(c_uint) -> c_uint;

/// The primitives a dispatcher wraps. Signatures and error conventions are
/// exactly those of the libc functions of the same name.
pub trait RealPrimitives: Send + Sync {
    unsafe fn clock_gettime(&self, clock: clockid_t, tp: *mut timespec) -> c_int;
    unsafe fn gettimeofday(&self, tv: *mut timeval, tz: *mut c_void) -> c_int;
    unsafe fn time(&self, tloc: *mut time_t) -> time_t;
    unsafe fn nanosleep(&self, req: *const timespec, rem: *mut timespec) -> c_int;
    unsafe fn clock_nanosleep(
        &self,
        clock: clockid_t,
        flags: c_int,
        req: *const timespec,
        rem: *mut timespec,
    ) -> c_int;
    unsafe fn usleep(&self, usec: useconds_t) -> c_int;
    unsafe fn sleep(&self, seconds: c_uint) -> c_uint;
}

/// Next definitions of the hooked symbols in lookup order.
/// A symbol that failed to resolve makes only its own dispatcher fail.
#[derive(Clone, Copy, Debug, Default)]
pub struct RealSymbols {
    clock_gettime: Option<ClockGettimeFn>,
    gettimeofday: Option<GettimeofdayFn>,
    time: Option<TimeFn>,
    nanosleep: Option<NanosleepFn>,
    clock_nanosleep: Option<ClockNanosleepFn>,
    usleep: Option<UsleepFn>,
    sleep: Option<SleepFn>,
}

unsafe fn lookup<F: Copy>(name: &'static [u8]) -> Option<F> {
    debug_assert_eq!(name.last(), Some(&0));
    debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<*mut c_void>());
    let sym = libc::dlsym(libc::RTLD_NEXT, name.as_ptr() as *const c_char);
    if sym.is_null() {
        None
    } else {
        Some(std::mem::transmute_copy::<*mut c_void, F>(&sym))
    }
}

impl RealSymbols {
    pub fn resolve() -> Self {
        unsafe {
            RealSymbols {
                clock_gettime: lookup(b"clock_gettime\0"),
                gettimeofday: lookup(b"gettimeofday\0"),
                time: lookup(b"time\0"),
                nanosleep: lookup(b"nanosleep\0"),
                clock_nanosleep: lookup(b"clock_nanosleep\0"),
                usleep: lookup(b"usleep\0"),
                sleep: lookup(b"sleep\0"),
            }
        }
    }

    /// Names of the symbols that could not be resolved
    pub fn missing(&self) -> Vec<&'static str> {
        let table = [
            ("clock_gettime", self.clock_gettime.is_none()),
            ("gettimeofday", self.gettimeofday.is_none()),
            ("time", self.time.is_none()),
            ("nanosleep", self.nanosleep.is_none()),
            ("clock_nanosleep", self.clock_nanosleep.is_none()),
            ("usleep", self.usleep.is_none()),
            ("sleep", self.sleep.is_none()),
        ];
        table
            .into_iter()
            .filter_map(|(name, missing)| missing.then_some(name))
            .collect()
    }
}

impl RealPrimitives for RealSymbols {
    unsafe fn clock_gettime(&self, clock: clockid_t, tp: *mut timespec) -> c_int {
        match self.clock_gettime {
            Some(f) => f(clock, tp),
            None => fail_enosys(),
        }
    }

    unsafe fn gettimeofday(&self, tv: *mut timeval, tz: *mut c_void) -> c_int {
        match self.gettimeofday {
            Some(f) => f(tv, tz),
            None => fail_enosys(),
        }
    }

    unsafe fn time(&self, tloc: *mut time_t) -> time_t {
        match self.time {
            Some(f) => f(tloc),
            None => {
                set_errno(libc::ENOSYS);
                -1
            }
        }
    }

    unsafe fn nanosleep(&self, req: *const timespec, rem: *mut timespec) -> c_int {
        match self.nanosleep {
            Some(f) => f(req, rem),
            None => fail_enosys(),
        }
    }

    unsafe fn clock_nanosleep(
        &self,
        clock: clockid_t,
        flags: c_int,
        req: *const timespec,
        rem: *mut timespec,
    ) -> c_int {
        match self.clock_nanosleep {
            Some(f) => f(clock, flags, req, rem),
            // reports the error number directly instead of through errno
            None => libc::ENOSYS,
        }
    }

    unsafe fn usleep(&self, usec: useconds_t) -> c_int {
        match self.usleep {
            Some(f) => f(usec),
            None => fail_enosys(),
        }
    }

    unsafe fn sleep(&self, seconds: c_uint) -> c_uint {
        match self.sleep {
            Some(f) => f(seconds),
            None => seconds,
        }
    }
}

/// `-1` with `errno = ENOSYS`
pub fn fail_enosys() -> c_int {
    set_errno(libc::ENOSYS);
    -1
}

pub fn errno() -> c_int {
    unsafe { *libc::__errno_location() }
}

pub fn set_errno(value: c_int) {
    unsafe { *libc::__errno_location() = value }
}

/// Reads a primitive set's underlying clocks. A failed read yields 0.
pub struct PrimitiveClock<'a, P: ?Sized>(pub &'a P);

impl<P: RealPrimitives + ?Sized> RealClock for PrimitiveClock<'_, P> {
    fn now_ns(&self, domain: ClockDomain) -> i64 {
        let clock = match domain {
            ClockDomain::Monotonic => libc::CLOCK_MONOTONIC,
            ClockDomain::WallClock => libc::CLOCK_REALTIME,
        };
        let mut ts = timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        if unsafe { self.0.clock_gettime(clock, &mut ts) } != 0 {
            return 0;
        }
        crate::timespec_ns(&ts)
    }
}

