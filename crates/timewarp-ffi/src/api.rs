//! In-process control API
//!
//! Lets code running inside the host process change the speed without going
//! through the control socket. A speed applied here behaves exactly like one
//! received as a control frame.

use std::ffi::{c_char, c_int};

use timewarp_control::SpeedSink;
use timewarp_core::Speed;

use crate::error::{report, TimewarpErrorCode};
use crate::runtime::ensure_started;

/// Library version
#[no_mangle]
pub extern "C" fn timewarp_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

/// Set the speed multiplier
/// Returns 0 on success, negative on error
#[no_mangle]
pub extern "C" fn timewarp_set_speed(speed: f64) -> c_int {
    apply_raw_speed(ensure_started(), speed).into()
}

/// Get the current speed multiplier
#[no_mangle]
pub extern "C" fn timewarp_get_speed() -> f64 {
    ensure_started().dispatcher().speed().get()
}

fn apply_raw_speed<S: SpeedSink + ?Sized>(sink: &S, raw: f64) -> TimewarpErrorCode {
    match Speed::new(raw) {
        Ok(speed) => {
            sink.apply_speed(speed);
            TimewarpErrorCode::Ok
        }
        Err(e) => report(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    use parking_lot::Mutex;

    use crate::error::{timewarp_clear_error, timewarp_last_error};

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<f64>>);

    impl SpeedSink for RecordingSink {
        fn apply_speed(&self, speed: Speed) {
            self.0.lock().push(speed.get());
        }
    }

    #[test]
    fn test_version() {
        let version = unsafe { CStr::from_ptr(timewarp_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_apply_valid_speeds() {
        let sink = RecordingSink::default();
        assert_eq!(apply_raw_speed(&sink, 2.5), TimewarpErrorCode::Ok);
        assert_eq!(apply_raw_speed(&sink, 0.0), TimewarpErrorCode::Ok);
        assert_eq!(*sink.0.lock(), vec![2.5, 0.0]);
    }

    #[test]
    fn test_negative_speed_rejected() {
        timewarp_clear_error();
        let sink = RecordingSink::default();
        assert_eq!(apply_raw_speed(&sink, -1.0), TimewarpErrorCode::InvalidArgument);
        assert_eq!(apply_raw_speed(&sink, f64::NAN), TimewarpErrorCode::InvalidArgument);
        assert_eq!(apply_raw_speed(&sink, f64::INFINITY), TimewarpErrorCode::InvalidArgument);
        assert!(sink.0.lock().is_empty());

        let msg = unsafe { CStr::from_ptr(timewarp_last_error()) };
        assert!(msg.to_str().unwrap().contains("Invalid speed"));
    }
}
