//! Environment-driven configuration

use std::path::PathBuf;

use crate::{TimewarpError, TimewarpResult};

/// Overrides the control socket location
pub const ENV_SOCKET_PATH: &str = "TIMEWARP_SOCKET_PATH";
/// `"1"` enables WallClock scaling
pub const ENV_SCALE_REALTIME: &str = "TIMEWARP_SCALE_REALTIME";
/// `tracing` filter for the injected library
pub const ENV_LOG: &str = "TIMEWARP_LOG";
/// Location of `libtimewarp.so` for controllers
pub const ENV_LIBRARY: &str = "TIMEWARP_LIBRARY";

/// Capacity of `sockaddr_un.sun_path`, including the trailing NUL
pub const SOCKET_PATH_MAX: usize = 108;

pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Default control endpoint for a process
pub fn default_socket_path(pid: u32) -> PathBuf {
    PathBuf::from(format!("/tmp/timewarp_{pid}.sock"))
}

/// Check that a path fits in `sun_path` with its NUL terminator
pub fn validate_socket_path(path: &str) -> TimewarpResult<()> {
    if path.len() >= SOCKET_PATH_MAX {
        return Err(TimewarpError::SocketPathTooLong {
            len: path.len(),
            max: SOCKET_PATH_MAX - 1,
        });
    }
    Ok(())
}

/// timewarp configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Raw `TIMEWARP_SOCKET_PATH`, if set and non-empty
    pub socket_path_override: Option<String>,
    /// Scale calendar-time reads as well as monotonic ones
    pub scale_wallclock: bool,
    /// Diagnostic filter directive
    pub log_filter: String,
    /// Process id the default socket path is derived from
    pub pid: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            socket_path_override: None,
            scale_wallclock: false,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            pid: std::process::id(),
        }
    }
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let socket_path_override = lookup(ENV_SOCKET_PATH).filter(|p| !p.is_empty());
        let scale_wallclock = lookup(ENV_SCALE_REALTIME).as_deref() == Some("1");
        let log_filter = lookup(ENV_LOG)
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Config {
            socket_path_override,
            scale_wallclock,
            log_filter,
            ..Config::default()
        }
    }

    /// Resolve the control endpoint.
    /// An override that does not fit `sun_path` is dropped in favour of the default.
    pub fn socket_path(&self) -> PathBuf {
        if let Some(path) = &self.socket_path_override {
            match validate_socket_path(path) {
                Ok(()) => return PathBuf::from(path),
                Err(e) => {
                    tracing::warn!("{} rejected, falling back to default: {}", ENV_SOCKET_PATH, e);
                }
            }
        }
        default_socket_path(self.pid)
    }
}
