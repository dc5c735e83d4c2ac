//! Status codes and the per-thread error message of the control API

use std::cell::RefCell;
use std::ffi::{c_char, c_int, CString};

use timewarp_core::TimewarpError;

/// Status returned by the control API
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimewarpErrorCode {
    Ok = 0,
    /// The argument was rejected; see `timewarp_last_error`
    InvalidArgument = -1,
}

impl From<TimewarpErrorCode> for c_int {
    fn from(code: TimewarpErrorCode) -> Self {
        code as c_int
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Remember `err` for `timewarp_last_error`. Only argument errors reach the control API.
pub fn report(err: &TimewarpError) -> TimewarpErrorCode {
    set_last_error(&err.to_string());
    TimewarpErrorCode::InvalidArgument
}

pub fn set_last_error(msg: &str) {
    // interior NULs would truncate the message on the C side
    let msg = CString::new(msg.replace('\0', " ")).ok();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = msg);
}

/// Message for the most recent failed call on this thread, or NULL.
/// Valid until the next control API call on the same thread.
#[no_mangle]
pub extern "C" fn timewarp_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(std::ptr::null(), |msg| msg.as_ptr())
    })
}

#[no_mangle]
pub extern "C" fn timewarp_clear_error() {
    LAST_ERROR.with(|slot| slot.borrow_mut().take());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    fn last_error() -> Option<String> {
        let ptr = timewarp_last_error();
        (!ptr.is_null()).then(|| unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }

    #[test]
    fn test_report_sets_message() {
        timewarp_clear_error();
        assert_eq!(last_error(), None);

        let code = report(&TimewarpError::InvalidSpeed(-2.0));
        assert_eq!(code, TimewarpErrorCode::InvalidArgument);
        assert_eq!(c_int::from(code), -1);
        assert!(last_error().unwrap().contains("-2"));

        timewarp_clear_error();
        assert_eq!(last_error(), None);
    }

    #[test]
    fn test_message_with_nul_survives() {
        set_last_error("bad\0speed");
        assert_eq!(last_error().as_deref(), Some("bad speed"));
        timewarp_clear_error();
    }

    #[test]
    fn test_errors_are_per_thread() {
        set_last_error("main");
        std::thread::spawn(|| assert_eq!(last_error(), None))
            .join()
            .unwrap();
        assert_eq!(last_error().as_deref(), Some("main"));
        timewarp_clear_error();
    }
}
