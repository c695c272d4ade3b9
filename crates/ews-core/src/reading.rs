//! Canonical telemetry samples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One canonical telemetry sample.
///
/// Built once by the ingestion adapter from a decoded device payload and
/// never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// When the device took the sample.
    pub timestamp: DateTime<Utc>,
    /// Air temperature, °C.
    pub temperature: f64,
    /// Relative humidity, %.
    pub humidity: f64,
    /// Barometric pressure, hPa.
    pub pressure: f64,
    /// Altitude, m.
    pub altitude: f64,
    /// Gas concentration (CO₂), ppm.
    pub co2: f64,
    /// Ultrasonic distance, cm.
    pub distance: f64,
    /// Wind speed, m/s.
    pub wind_speed: f64,
    /// Wind direction, degrees 0–360.
    pub wind_direction: f64,
    /// Rainfall, mm.
    pub rainfall: f64,
    /// Sensor supply voltage, V.
    pub voltage: f64,
    /// Bus voltage, V.
    pub bus_voltage: f64,
    /// Current draw, mA.
    pub current: f64,
}

/// A reading after it has been written to durable storage.
///
/// This is the payload of a `sensor:update` broadcast, so live subscribers
/// see exactly the row the history API will later return.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReading {
    /// Storage-assigned row id.
    pub id: i64,
    /// When the row was written.
    pub created_at: DateTime<Utc>,
    /// When the row was last modified. Equal to `created_at` on insert.
    pub updated_at: DateTime<Utc>,
    /// The persisted sample.
    #[serde(flatten)]
    pub reading: Reading,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn sample_reading() -> Reading {
        Reading {
            timestamp: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
            temperature: 25.5,
            humidity: 60.2,
            pressure: 1013.2,
            altitude: 114.0,
            co2: 420.0,
            distance: 80.5,
            wind_speed: 3.4,
            wind_direction: 270.0,
            rainfall: 0.0,
            voltage: 4.9,
            bus_voltage: 5.0,
            current: 120.0,
        }
    }
}
