//! Exported replacements for the libc clock and sleep functions
//!
//! | symbol | dispatcher |
//! |---|---|
//! | `clock_gettime` | [`crate::Dispatcher::clock_gettime`] |
//! | `gettimeofday` | [`crate::Dispatcher::gettimeofday`] |
//! | `time` | [`crate::Dispatcher::time`] |
//! | `nanosleep` | [`crate::Dispatcher::nanosleep`] |
//! | `clock_nanosleep` | [`crate::Dispatcher::clock_nanosleep`] |
//! | `usleep` | [`crate::Dispatcher::usleep`] |
//! | `sleep` | [`crate::Dispatcher::sleep`] |
//!
//! Not compiled into unit-test builds, so the test harness never interposes itself.

use std::ffi::{c_int, c_uint, c_void};

use libc::{clockid_t, time_t, timespec, timeval, useconds_t};

use crate::real::{fail_enosys, set_errno, RealPrimitives};
use crate::runtime::{enter, Entry};

/// Runs the start gate as soon as the library is loaded so the control
/// socket exists before the host first reads the clock
#[used]
#[link_section = ".init_array"]
static TIMEWARP_CONSTRUCTOR: extern "C" fn() = timewarp_constructor;

extern "C" fn timewarp_constructor() {
    let _ = enter();
}

#[no_mangle]
pub unsafe extern "C" fn clock_gettime(clock: clockid_t, tp: *mut timespec) -> c_int {
    match enter() {
        Entry::Hooked(rt, _guard) => rt.dispatcher().clock_gettime(clock, tp),
        Entry::Bypass(rt) => rt.real().clock_gettime(clock, tp),
        Entry::Unavailable => fail_enosys(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn gettimeofday(tv: *mut timeval, tz: *mut c_void) -> c_int {
    match enter() {
        Entry::Hooked(rt, _guard) => rt.dispatcher().gettimeofday(tv, tz),
        Entry::Bypass(rt) => rt.real().gettimeofday(tv, tz),
        Entry::Unavailable => fail_enosys(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn time(tloc: *mut time_t) -> time_t {
    match enter() {
        Entry::Hooked(rt, _guard) => rt.dispatcher().time(tloc),
        Entry::Bypass(rt) => rt.real().time(tloc),
        Entry::Unavailable => {
            set_errno(libc::ENOSYS);
            -1
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn nanosleep(req: *const timespec, rem: *mut timespec) -> c_int {
    match enter() {
        Entry::Hooked(rt, _guard) => rt.dispatcher().nanosleep(req, rem),
        Entry::Bypass(rt) => rt.real().nanosleep(req, rem),
        Entry::Unavailable => fail_enosys(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn clock_nanosleep(
    clock: clockid_t,
    flags: c_int,
    req: *const timespec,
    rem: *mut timespec,
) -> c_int {
    match enter() {
        Entry::Hooked(rt, _guard) => rt.dispatcher().clock_nanosleep(clock, flags, req, rem),
        Entry::Bypass(rt) => rt.real().clock_nanosleep(clock, flags, req, rem),
        Entry::Unavailable => libc::ENOSYS,
    }
}

#[no_mangle]
pub unsafe extern "C" fn usleep(usec: useconds_t) -> c_int {
    match enter() {
        Entry::Hooked(rt, _guard) => rt.dispatcher().usleep(usec),
        Entry::Bypass(rt) => rt.real().usleep(usec),
        Entry::Unavailable => fail_enosys(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn sleep(seconds: c_uint) -> c_uint {
    match enter() {
        Entry::Hooked(rt, _guard) => rt.dispatcher().sleep(seconds),
        Entry::Bypass(rt) => rt.real().sleep(seconds),
        Entry::Unavailable => seconds,
    }
}
