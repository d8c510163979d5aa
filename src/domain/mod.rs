//! Core value objects shared across the gateway

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// One canonical sensor sample
///
/// Constructed once per accepted frame and immutable afterwards; consumed
/// by the stream publisher and the rule engine, never retained by the
/// gateway after dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    /// Capture timestamp; set to ingestion time for inbound frames
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub temp: f64,
    pub hum: f64,
    pub soil: i64,
    pub light: i64,
    pub dist: i64,
    pub motion: bool,
    pub acc_x: i64,
    pub acc_y: i64,
    pub acc_z: i64,
}

/// Per-owner threshold configuration
///
/// Owned by the external settings service; the gateway only ever holds a
/// read-only, possibly-stale snapshot per evaluation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GreenhouseSettings {
    pub owner: String,
    pub name: String,
    pub temp_min: f64,
    pub temp_max: f64,
    pub light_min: f64,
    pub light_max: f64,
    pub hum_min: f64,
    pub hum_max: f64,
    pub soil_min: i64,
}

/// Actuator targets understood by the device-side firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Led,
    Buzzer,
    Servo,
    Display,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Led => write!(f, "LED"),
            Device::Buzzer => write!(f, "BUZZER"),
            Device::Servo => write!(f, "SERVO"),
            Device::Display => write!(f, "DISPLAY"),
        }
    }
}

/// A corrective command for the actuator device
///
/// `issued_at` is stamped by the dispatcher at send time. Commands are
/// ephemeral; they are never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCommand {
    pub device: Device,
    pub action: String,
    pub issued_at: Option<OffsetDateTime>,
}

impl DeviceCommand {
    pub fn new(device: Device, action: impl Into<String>) -> Self {
        Self {
            device,
            action: action.into(),
            issued_at: None,
        }
    }

    /// Wire form sent to the device: `"<DEVICE> <ACTION>\n"`
    pub fn wire_line(&self) -> String {
        format!("{} {}\n", self.device, self.action)
    }
}
