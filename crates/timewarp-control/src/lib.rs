//! timewarp Control Channel
//!
//! This crate provides:
//! - The listener that runs inside the host process and applies speed frames
//! - An async client for controllers
//! - Launch (LD_PRELOAD) and attach (gdb + dlopen) helpers

pub mod client;
pub mod launch;
pub mod listener;

pub use client::*;
pub use launch::*;
pub use listener::*;
