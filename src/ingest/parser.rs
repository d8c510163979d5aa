//! Strict frame parsing into canonical readings
//!
//! One inbound line is expected to be a JSON object with required numeric
//! keys and optional `motion`/`acc`. Anything else is rejected with a
//! typed error; a rejected frame never ends the session.

use crate::domain::SensorReading;
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;

/// Why an inbound frame was rejected
#[derive(Debug, Error)]
pub enum ParseError {
    /// Frame is not syntactically valid JSON
    #[error("frame is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    /// Frame is valid JSON but violates the reading schema
    /// (missing or ill-typed field, wrong acceleration arity)
    #[error("frame violates reading schema: {0}")]
    Schema(#[source] serde_json::Error),
}

/// Raw inbound frame shape. Required keys reject the frame when missing;
/// `motion` and `acc` default.
#[derive(Debug, Deserialize)]
struct RawFrame {
    temp: f64,
    hum: f64,
    soil: i64,
    light: i64,
    dist: i64,
    #[serde(default)]
    motion: bool,
    #[serde(default = "default_acc")]
    acc: [i64; 3],
}

fn default_acc() -> [i64; 3] {
    [0, 0, 0]
}

/// Parse one newline-delimited frame, stamping the reading with the
/// current ingestion time
pub fn parse_reading(line: &str) -> Result<SensorReading, ParseError> {
    let frame: RawFrame = serde_json::from_str(line).map_err(classify)?;

    Ok(SensorReading {
        timestamp: OffsetDateTime::now_utc(),
        temp: frame.temp,
        hum: frame.hum,
        soil: frame.soil,
        light: frame.light,
        dist: frame.dist,
        motion: frame.motion,
        acc_x: frame.acc[0],
        acc_y: frame.acc[1],
        acc_z: frame.acc[2],
    })
}

fn classify(err: serde_json::Error) -> ParseError {
    match err.classify() {
        serde_json::error::Category::Data => ParseError::Schema(err),
        _ => ParseError::Json(err),
    }
}
