//! Controller-side client for a running control listener

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::time::Instant;

use timewarp_core::{Speed, TimewarpError, TimewarpResult};
use timewarp_wire::encode_speed;

/// Pause between connection attempts while waiting for the socket
pub const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Fire-and-forget speed controller
#[derive(Debug)]
pub struct SpeedClient {
    stream: UnixStream,
    path: PathBuf,
}

impl SpeedClient {
    /// Connect to `path`, retrying while the socket does not exist yet or
    /// refuses connections, for at most `wait`
    pub async fn connect(path: impl Into<PathBuf>, wait: Duration) -> TimewarpResult<Self> {
        let path = path.into();
        let deadline = Instant::now() + wait;

        loop {
            match UnixStream::connect(&path).await {
                Ok(stream) => return Ok(SpeedClient { stream, path }),
                Err(e) if is_not_ready(&e) => {
                    if Instant::now() >= deadline {
                        tracing::debug!(path = %path.display(), "last connect error: {}", e);
                        return Err(TimewarpError::ConnectTimeout { path, waited: wait });
                    }
                    tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
                }
                Err(source) => return Err(TimewarpError::Connect { path, source }),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Send a new speed. Negative values are rejected here; the listener
    /// would silently drop them anyway.
    pub async fn set_speed(&mut self, speed: f32) -> TimewarpResult<()> {
        Speed::try_from(speed)?;
        self.stream.write_all(&encode_speed(speed)).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Shut down the write half and drop the connection
    pub async fn close(mut self) -> TimewarpResult<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

fn is_not_ready(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
    )
}
