#![allow(clippy::missing_safety_doc)]
//! timewarp FFI - the LD_PRELOAD interposition library
//!
//! Built as `libtimewarp.so`. Loaded into a process (via `LD_PRELOAD` or
//! `dlopen`), it replaces the libc clock and sleep entry points with
//! versions that report and wait in scaled virtual time, and starts a
//! control listener that changes the speed at runtime.

pub mod api;
pub mod dispatch;
pub mod error;
#[cfg(not(test))]
pub mod exports;
pub mod logging;
pub mod real;
pub mod runtime;

pub use api::*;
pub use dispatch::*;
pub use error::*;
pub use real::{RealPrimitives, RealSymbols};
pub use runtime::{ensure_started, HookGuard, Runtime};
