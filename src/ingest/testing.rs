//! In-memory collaborators for pipeline and session tests

use crate::device::{CommandSink, DispatchError};
use crate::domain::{DeviceCommand, GreenhouseSettings, SensorReading};
use crate::settings::{SettingsError, SettingsStore};
use crate::stream::{PublishError, ReadingPublisher};
use async_trait::async_trait;
use std::io;
use tokio::sync::Mutex;

/// Records published readings; optionally fails every publish
#[derive(Default)]
pub struct StubPublisher {
    pub published: Mutex<Vec<(SensorReading, String)>>,
    fail: bool,
}

impl StubPublisher {
    pub fn failing() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

#[async_trait]
impl ReadingPublisher for StubPublisher {
    async fn publish(&self, reading: &SensorReading, owner: &str) -> Result<(), PublishError> {
        if self.fail {
            return Err(PublishError::Draining);
        }
        self.published
            .lock()
            .await
            .push((reading.clone(), owner.to_string()));
        Ok(())
    }
}

/// Serves one fixed settings snapshot, or nothing at all
pub struct StaticSettings {
    settings: Option<GreenhouseSettings>,
}

impl StaticSettings {
    /// The threshold configuration used across the pipeline tests
    pub fn example() -> Self {
        Self {
            settings: Some(GreenhouseSettings {
                owner: "alice".into(),
                name: "main greenhouse".into(),
                temp_min: 15.0,
                temp_max: 28.0,
                light_min: 300.0,
                light_max: 900.0,
                hum_min: 40.0,
                hum_max: 70.0,
                soil_min: 500,
            }),
        }
    }

    pub fn empty() -> Self {
        Self { settings: None }
    }
}

#[async_trait]
impl SettingsStore for StaticSettings {
    async fn get(&self, _owner: &str) -> Result<Option<GreenhouseSettings>, SettingsError> {
        Ok(self.settings.clone())
    }
}

/// Records dispatched commands; optionally fails every other send while
/// still counting the attempt
#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<DeviceCommand>>,
    pub attempts: Mutex<usize>,
    fail_every_other: bool,
}

impl RecordingSink {
    pub fn failing_every_other() -> Self {
        Self {
            fail_every_other: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl CommandSink for RecordingSink {
    async fn send(&self, command: DeviceCommand) -> Result<DeviceCommand, DispatchError> {
        let mut attempts = self.attempts.lock().await;
        *attempts += 1;

        if self.fail_every_other && *attempts % 2 == 0 {
            return Err(DispatchError::DeviceUnreachable {
                address: "test".into(),
                source: io::Error::new(io::ErrorKind::BrokenPipe, "stub failure"),
            });
        }

        self.sent.lock().await.push(command.clone());
        Ok(command)
    }
}
