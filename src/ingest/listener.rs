//! Inbound TCP listener for sensor devices

use crate::ingest::{ReadingPipeline, Session};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Accepts sensor connections and spawns one session task per device.
///
/// A session's failure is confined to its own task; the accept loop and
/// sibling connections are never affected.
pub struct IngestServer {
    listen_addr: String,
    read_timeout: Duration,
    owner: String,
    pipeline: Arc<ReadingPipeline>,
}

impl IngestServer {
    pub fn new(
        listen_addr: String,
        read_timeout: Duration,
        owner: String,
        pipeline: Arc<ReadingPipeline>,
    ) -> Self {
        Self {
            listen_addr,
            read_timeout,
            owner,
            pipeline,
        }
    }

    /// Bind and serve until the task is cancelled
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.listen_addr)
            .await
            .with_context(|| format!("failed to bind sensor listener on {}", self.listen_addr))?;
        info!("sensor listener on {}", self.listen_addr);
        self.serve(listener).await
    }

    /// Accept loop over an already-bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let session = Session::new(
                        stream,
                        peer,
                        self.owner.clone(),
                        self.read_timeout,
                        self.pipeline.clone(),
                    );
                    tokio::spawn(session.run());
                }
                Err(e) => warn!("accept failed: {e}"),
            }
        }
    }
}
