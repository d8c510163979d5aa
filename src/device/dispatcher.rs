//! Actuator command dispatcher with transparent reconnect

use crate::config::DeviceConfig;
use crate::domain::DeviceCommand;
use async_trait::async_trait;
use std::io;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Dispatch failures, surfaced per command. The caller keeps attempting
/// the rest of its ordered batch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A fresh connection could not be opened, or two consecutive writes
    /// failed for one command
    #[error("actuator at {address} unreachable: {source}")]
    DeviceUnreachable {
        address: String,
        #[source]
        source: io::Error,
    },
}

/// Sink for ordered device commands
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Send one command, returning it stamped with the dispatch time
    async fn send(&self, command: DeviceCommand) -> Result<DeviceCommand, DispatchError>;
}

/// Maintains the single persistent connection to the actuator device.
///
/// The connection is a shared mutable resource: the mutex serializes
/// in-flight sends so concurrent sessions cannot interleave bytes on the
/// wire. A failed write closes the connection and retries exactly once on
/// a fresh one; a second consecutive failure is returned to the caller.
pub struct CommandDispatcher {
    config: DeviceConfig,
    conn: Mutex<Option<TcpStream>>,
}

impl CommandDispatcher {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
        }
    }

    /// Eagerly establish the device connection
    pub async fn connect(&self) -> Result<(), DispatchError> {
        let mut conn = self.conn.lock().await;
        if conn.is_none() {
            *conn = Some(self.open().await?);
        }
        Ok(())
    }

    /// Close the outbound connection if one is open
    pub async fn close(&self) {
        if let Some(mut stream) = self.conn.lock().await.take() {
            let _ = stream.shutdown().await;
        }
    }

    async fn open(&self) -> Result<TcpStream, DispatchError> {
        match timeout(
            self.config.connect_timeout,
            TcpStream::connect(&self.config.address),
        )
        .await
        {
            Ok(Ok(stream)) => {
                debug!("connected to actuator at {}", self.config.address);
                Ok(stream)
            }
            Ok(Err(e)) => Err(self.unreachable(e)),
            Err(_) => Err(self.unreachable(io::Error::new(
                io::ErrorKind::TimedOut,
                "connect timed out",
            ))),
        }
    }

    fn unreachable(&self, source: io::Error) -> DispatchError {
        DispatchError::DeviceUnreachable {
            address: self.config.address.clone(),
            source,
        }
    }

    async fn write_line(stream: &mut TcpStream, line: &str) -> io::Result<()> {
        stream.write_all(line.as_bytes()).await?;
        stream.flush().await
    }
}

#[async_trait]
impl CommandSink for CommandDispatcher {
    async fn send(&self, mut command: DeviceCommand) -> Result<DeviceCommand, DispatchError> {
        command.issued_at = Some(OffsetDateTime::now_utc());
        let line = command.wire_line();

        let mut conn = self.conn.lock().await;
        let mut stream = match conn.take() {
            Some(stream) => stream,
            None => self.open().await?,
        };

        match Self::write_line(&mut stream, &line).await {
            Ok(()) => {
                *conn = Some(stream);
                Ok(command)
            }
            Err(first) => {
                // Stale connection: drop it, reconnect, retry the write once
                warn!(
                    "device write failed ({first}), reconnecting to {}",
                    self.config.address
                );
                drop(stream);
                let mut fresh = self.open().await?;
                match Self::write_line(&mut fresh, &line).await {
                    Ok(()) => {
                        *conn = Some(fresh);
                        Ok(command)
                    }
                    Err(second) => Err(self.unreachable(second)),
                }
            }
        }
    }
}
