//! In-process control listener
//!
//! Runs on one dedicated thread inside the host process, accepts a single
//! peer at a time and applies every finite, non-negative speed frame it receives.
//! Nothing is ever written back to the peer.

use std::io::{self, Read};
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use timewarp_core::{Speed, TimewarpError, TimewarpResult};
use timewarp_wire::{FrameAccumulator, SpeedCommand};

/// Name of the listener thread
pub const CONTROL_THREAD_NAME: &str = "timewarp-control";

/// Receiver of validated speed changes
pub trait SpeedSink: Send + Sync {
    fn apply_speed(&self, speed: Speed);
}

impl<S: SpeedSink + ?Sized> SpeedSink for &S {
    fn apply_speed(&self, speed: Speed) {
        (**self).apply_speed(speed)
    }
}

impl<S: SpeedSink + ?Sized> SpeedSink for Arc<S> {
    fn apply_speed(&self, speed: Speed) {
        (**self).apply_speed(speed)
    }
}

/// Per-connection counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub frames: u64,
    pub applied: u64,
    pub ignored: u64,
}

/// Read frames until the peer disconnects or the stream fails.
/// Short and interrupted reads are accumulated; a trailing partial frame is dropped.
pub fn serve_connection<R: Read, S: SpeedSink + ?Sized>(mut stream: R, sink: &S) -> ConnectionStats {
    let mut acc = FrameAccumulator::new();
    let mut stats = ConnectionStats::default();

    loop {
        let n = match stream.read(acc.spare()) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!("control connection read error: {}", e);
                break;
            }
        };

        let Some(cmd) = acc.commit(n) else {
            continue;
        };
        stats.frames += 1;
        match cmd {
            SpeedCommand::Apply(speed) => {
                sink.apply_speed(speed);
                stats.applied += 1;
                tracing::info!(%speed, "speed applied");
            }
            SpeedCommand::Ignore(raw) => {
                stats.ignored += 1;
                tracing::debug!(raw, "invalid speed ignored");
            }
        }
    }

    if acc.pending() > 0 {
        tracing::debug!(pending = acc.pending(), "peer closed mid-frame");
    }
    stats
}

/// Bound control endpoint. The socket file is removed on drop.
#[derive(Debug)]
pub struct ControlListener {
    listener: UnixListener,
    path: PathBuf,
}

impl ControlListener {
    /// Bind `path`, clearing whatever stale file occupies it
    pub fn bind(path: impl Into<PathBuf>) -> TimewarpResult<Self> {
        let path = path.into();
        let _ = std::fs::remove_file(&path);

        let listener = UnixListener::bind(&path).map_err(|source| TimewarpError::Bind {
            path: path.clone(),
            source,
        })?;

        Ok(ControlListener { listener, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept one peer and serve it until it disconnects
    pub fn accept_one<S: SpeedSink + ?Sized>(&self, sink: &S) -> io::Result<ConnectionStats> {
        let stream = loop {
            match self.listener.accept() {
                Ok((stream, _)) => break stream,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        Ok(serve_connection(&stream, sink))
    }

    /// Serve peers one after another. Returns only when accept fails.
    pub fn serve<S: SpeedSink + ?Sized>(&self, sink: &S) -> io::Error {
        loop {
            match self.accept_one(sink) {
                Ok(stats) => {
                    tracing::debug!(
                        frames = stats.frames,
                        applied = stats.applied,
                        ignored = stats.ignored,
                        "control peer disconnected"
                    );
                }
                Err(e) => return e,
            }
        }
    }

    /// Move the listener onto its own thread
    pub fn spawn<S: SpeedSink + 'static>(self, sink: S) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(CONTROL_THREAD_NAME.to_string())
            .spawn(move || {
                let err = self.serve(&sink);
                tracing::error!(
                    path = %self.path.display(),
                    "control accept failed, listener exiting: {}",
                    err
                );
            })
    }
}

impl Drop for ControlListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
