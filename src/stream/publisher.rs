//! JetStream publisher with guarded bootstrap and lazy reconnect

use crate::config::BrokerConfig;
use crate::domain::SensorReading;
use async_nats::jetstream::{self, stream::StorageType};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Publish-path failures, surfaced to the immediate caller. The caller
/// decides whether to drop or surface them; they never close ingestion.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Broker unreachable after the full retry budget
    #[error("stream broker unreachable after {attempts} attempts: {source}")]
    BrokerUnavailable {
        attempts: u32,
        #[source]
        source: async_nats::ConnectError,
    },

    /// Stream declaration failed (declaring an existing stream is fine)
    #[error("stream provisioning failed: {0}")]
    Provision(#[from] async_nats::jetstream::context::CreateStreamError),

    /// Transport failure for a single publish; no automatic retry here
    #[error("publish failed: {0}")]
    Transport(#[from] async_nats::jetstream::context::PublishError),

    #[error("failed to encode reading: {0}")]
    Encode(#[from] serde_json::Error),

    /// Publish raced a close; the broker handle is being drained
    #[error("broker connection is draining")]
    Draining,
}

/// Publishes canonical readings to the durable stream
#[async_trait]
pub trait ReadingPublisher: Send + Sync {
    async fn publish(&self, reading: &SensorReading, owner: &str) -> Result<(), PublishError>;
}

/// Record published to the stream: the reading plus its owner tag
#[derive(Serialize)]
struct ReadingRecord<'a> {
    #[serde(flatten)]
    reading: &'a SensorReading,
    owner: &'a str,
}

struct BrokerHandle {
    client: async_nats::Client,
    jetstream: jetstream::Context,
}

/// Broker connection lifecycle. The whole state lives behind one mutex:
/// concurrent publishes during a pending bootstrap wait on the lock
/// instead of racing a second connect.
enum BrokerState {
    Disconnected,
    Connecting,
    Connected(BrokerHandle),
    Draining,
}

/// Owns the JetStream connection: bootstrap with retry, idempotent stream
/// provisioning, publish, drain.
pub struct StreamPublisher {
    config: BrokerConfig,
    state: Mutex<BrokerState>,
}

impl StreamPublisher {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BrokerState::Disconnected),
        }
    }

    /// Eagerly run the bootstrap protocol. Lazy connects at publish time
    /// go through the same path.
    pub async fn connect(&self) -> Result<(), PublishError> {
        let mut state = self.state.lock().await;
        self.ensure_connected(&mut state).await
    }

    /// Drain the broker connection and return to the disconnected state
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let BrokerState::Connected(handle) =
            std::mem::replace(&mut *state, BrokerState::Draining)
        {
            if let Err(e) = handle.client.drain().await {
                warn!("broker drain failed: {e}");
            } else {
                info!("broker connection drained");
            }
        }
        *state = BrokerState::Disconnected;
    }

    async fn ensure_connected(&self, state: &mut BrokerState) -> Result<(), PublishError> {
        match state {
            BrokerState::Connected(_) => return Ok(()),
            BrokerState::Draining => return Err(PublishError::Draining),
            BrokerState::Disconnected | BrokerState::Connecting => {}
        }

        *state = BrokerState::Connecting;
        match self.bootstrap().await {
            Ok(handle) => {
                *state = BrokerState::Connected(handle);
                Ok(())
            }
            Err(e) => {
                *state = BrokerState::Disconnected;
                Err(e)
            }
        }
    }

    /// Connect with the retry policy, then declare the stream
    async fn bootstrap(&self) -> Result<BrokerHandle, PublishError> {
        let client = self.connect_with_retry().await?;
        info!("connected to broker at {}", self.config.url);

        let jetstream = jetstream::new(client.clone());
        jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: self.config.stream.clone(),
                subjects: vec![self.config.subject.clone()],
                max_age: self.config.max_age,
                storage: StorageType::File,
                ..Default::default()
            })
            .await?;
        debug!("stream {} ready", self.config.stream);

        Ok(BrokerHandle { client, jetstream })
    }

    async fn connect_with_retry(&self) -> Result<async_nats::Client, PublishError> {
        let policy = self.config.retry;
        let mut attempt = 1;

        loop {
            let connect = async_nats::ConnectOptions::new()
                .connection_timeout(self.config.connect_timeout)
                .connect(self.config.url.as_str());

            match connect.await {
                Ok(client) => return Ok(client),
                Err(source) if attempt >= policy.max_attempts => {
                    return Err(PublishError::BrokerUnavailable {
                        attempts: attempt,
                        source,
                    });
                }
                Err(e) => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        "broker connect failed (attempt {attempt}/{}): {e}, retrying in {delay:?}",
                        policy.max_attempts
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl ReadingPublisher for StreamPublisher {
    async fn publish(&self, reading: &SensorReading, owner: &str) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(&ReadingRecord { reading, owner })?;

        // The state lock covers connection management only. The context is
        // cloned out and the network round trip runs without the lock, so a
        // slow broker stalls the calling session alone, not every session
        // sharing this publisher.
        let jetstream = {
            let mut state = self.state.lock().await;
            self.ensure_connected(&mut state).await?;
            match &*state {
                BrokerState::Connected(handle) => handle.jetstream.clone(),
                _ => return Err(PublishError::Draining),
            }
        };

        let ack = jetstream
            .publish(self.config.subject.clone(), Bytes::from(payload))
            .await?;
        ack.await?;

        debug!(owner, subject = %self.config.subject, "reading published");
        Ok(())
    }
}
