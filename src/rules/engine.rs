//! Threshold evaluation over a single reading

use crate::domain::{Device, DeviceCommand, GreenhouseSettings, SensorReading};

/// Dead band above `soil_min` inside which the valve is left alone,
/// preventing oscillation around the threshold
const SOIL_HYSTERESIS: i64 = 100;

/// Evaluate one reading against the owner's thresholds.
///
/// Command order is significant and preserved end-to-end: temperature,
/// humidity, soil, light, motion, then a trailing display update.
/// Branches within a category are mutually exclusive; categories are
/// independent and always evaluated in this fixed order. An inverted band
/// (min > max) yields no violation for that category.
pub fn evaluate(reading: &SensorReading, settings: &GreenhouseSettings) -> Vec<DeviceCommand> {
    let mut batch = Vec::new();

    // Overheat / freezing
    if settings.temp_min <= settings.temp_max {
        if reading.temp > settings.temp_max {
            batch.push(DeviceCommand::new(Device::Led, "1 TOGGLE"));
            batch.push(DeviceCommand::new(Device::Led, "1 TOGGLE"));
            batch.push(DeviceCommand::new(Device::Buzzer, "BEEP"));
        } else if reading.temp < settings.temp_min {
            batch.push(DeviceCommand::new(Device::Buzzer, "BEEP"));
        }
    }

    // Humidity out of band
    if settings.hum_min <= settings.hum_max {
        if reading.hum < settings.hum_min {
            batch.push(DeviceCommand::new(Device::Buzzer, "BEEP"));
            batch.push(DeviceCommand::new(Device::Led, "1 ON"));
        } else if reading.hum > settings.hum_max {
            batch.push(DeviceCommand::new(Device::Led, "1 TOGGLE"));
        }
    }

    // Soil moisture: open the valve when too dry, close it only once the
    // reading clears the hysteresis band
    if reading.soil < settings.soil_min {
        batch.push(DeviceCommand::new(Device::Servo, "0"));
    } else if reading.soil > settings.soil_min + SOIL_HYSTERESIS {
        batch.push(DeviceCommand::new(Device::Servo, "90"));
    }

    // Light out of band
    if settings.light_min <= settings.light_max {
        let light = reading.light as f64;
        if light < settings.light_min {
            batch.push(DeviceCommand::new(Device::Led, "2 ON"));
        } else if light > settings.light_max {
            batch.push(DeviceCommand::new(Device::Led, "2 OFF"));
        }
    }

    // Motion alert
    if reading.motion {
        batch.push(DeviceCommand::new(Device::Buzzer, "BEEP"));
        batch.push(DeviceCommand::new(Device::Led, "3 TOGGLE"));
    }

    // Always last: show the truncated temperature on the display
    batch.push(DeviceCommand::new(
        Device::Display,
        (reading.temp as i64).to_string(),
    ));

    batch
}
