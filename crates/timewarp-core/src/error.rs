//! Error types for timewarp

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Core timewarp errors
#[derive(Error, Debug)]
pub enum TimewarpError {
    // Speed errors
    #[error("Invalid speed {0}: must be a finite non-negative number")]
    InvalidSpeed(f64),

    // Endpoint errors
    #[error("Socket path too long: {len} bytes, limit is {max}")]
    SocketPathTooLong { len: usize, max: usize },

    #[error("Failed to bind control socket {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to connect to control socket {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Timed out after {waited:?} waiting for control socket {path}")]
    ConnectTimeout { path: PathBuf, waited: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // Loader errors
    #[error("Shared library not found: {0}")]
    LibraryNotFound(PathBuf),

    #[error("No running process named {0:?}")]
    ProcessNotFound(String),

    #[error("Injection failed: {0}")]
    Injection(String),

    #[error("Real symbol not resolved: {0}")]
    SymbolNotResolved(&'static str),
}

/// Result type for timewarp operations
pub type TimewarpResult<T> = Result<T, TimewarpError>;
