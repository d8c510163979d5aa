//! Per-frame processing: publish, evaluate thresholds, dispatch commands

use crate::device::CommandSink;
use crate::domain::SensorReading;
use crate::ingest::{parser, ParseError};
use crate::rules;
use crate::settings::SettingsStore;
use crate::stream::ReadingPublisher;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Orchestrates the downstream pipeline for each accepted frame.
///
/// Broker and device faults are contained here: they are logged and never
/// surfaced to the session, so a failed publish or an unreachable actuator
/// cannot close an inbound connection.
pub struct ReadingPipeline {
    publisher: Arc<dyn ReadingPublisher>,
    settings: Arc<dyn SettingsStore>,
    commands: Arc<dyn CommandSink>,
}

impl ReadingPipeline {
    pub fn new(
        publisher: Arc<dyn ReadingPublisher>,
        settings: Arc<dyn SettingsStore>,
        commands: Arc<dyn CommandSink>,
    ) -> Self {
        Self {
            publisher,
            settings,
            commands,
        }
    }

    /// Process one raw frame for the given owner. Only parse failures are
    /// returned; everything downstream is handled locally.
    pub async fn process_frame(
        &self,
        line: &str,
        owner: &str,
    ) -> Result<SensorReading, ParseError> {
        let reading = parser::parse_reading(line)?;

        if let Err(e) = self.publisher.publish(&reading, owner).await {
            error!(owner, "publish failed, reading dropped from stream: {e}");
        }

        self.apply_thresholds(&reading, owner).await;
        Ok(reading)
    }

    /// Resolve the owner's settings and run the ordered command batch.
    /// Absent settings suppress evaluation entirely; there is no partial
    /// evaluation with defaults.
    async fn apply_thresholds(&self, reading: &SensorReading, owner: &str) {
        let settings = match self.settings.get(owner).await {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                debug!(owner, "no settings configured, skipping threshold evaluation");
                return;
            }
            Err(e) => {
                warn!(owner, "settings lookup failed, skipping threshold evaluation: {e}");
                return;
            }
        };

        for command in rules::evaluate(reading, &settings) {
            match self.commands.send(command).await {
                Ok(sent) => {
                    debug!(device = %sent.device, action = %sent.action, "command dispatched");
                }
                // One undelivered command must not cancel the rest of the batch
                Err(e) => error!("command dropped: {e}"),
            }
        }
    }
}
