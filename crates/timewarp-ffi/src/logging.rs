//! Diagnostic stream for the injected library

use tracing_subscriber::EnvFilter;

use timewarp_core::DEFAULT_LOG_FILTER;

/// Install a stderr subscriber for this library's `tracing` events.
///
/// Timestamps are disabled: formatting them would read the very clock
/// being intercepted. An already-installed subscriber is left alone.
pub fn init(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .try_init();
}
