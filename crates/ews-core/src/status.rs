//! Device status metadata carried by `sensor:status` broadcasts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse device availability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// Telemetry is flowing.
    Online,
    /// The broker link is down; readings are not arriving.
    Offline,
    /// Ingestion has given up and needs operator attention.
    Error,
}

/// Status record for one sensor station.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    /// Station identifier (the topic it publishes on).
    pub sensor_id: String,
    /// Free-form installation location.
    pub location: String,
    /// Date of the last calibration, as configured by the operator.
    pub calibration_date: String,
    /// Current availability.
    pub status: DeviceStatus,
    /// When the status was last observed.
    pub last_update: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(DeviceStatus::Online).unwrap(),
            "online"
        );
        assert_eq!(
            serde_json::to_value(DeviceStatus::Offline).unwrap(),
            "offline"
        );
        assert_eq!(serde_json::to_value(DeviceStatus::Error).unwrap(), "error");
    }

    #[test]
    fn record_uses_camel_case_keys() {
        let record = StatusRecord {
            sensor_id: "sensors/ewsbe".into(),
            location: "Yogyakarta".into(),
            calibration_date: "2024-01-15".into(),
            status: DeviceStatus::Online,
            last_update: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["sensorId"], "sensors/ewsbe");
        assert_eq!(json["calibrationDate"], "2024-01-15");
        assert_eq!(json["status"], "online");
        assert!(json["lastUpdate"].is_string());
    }
}
