//! Device payload schema.
//!
//! The weather station firmware publishes JSON using Indonesian field names
//! and an epoch-millisecond timestamp. [`DevicePayload::decode`] parses that
//! vocabulary and [`DevicePayload::into_reading`] remaps it onto the
//! canonical [`Reading`].

use chrono::DateTime;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::errors::CodecError;
use crate::reading::Reading;

/// Raw payload as published by the station.
///
/// Scalar fields the firmware omits or sends as `null` decode as `0.0`; the
/// timestamp is mandatory.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct DevicePayload {
    /// Sample time, Unix epoch milliseconds.
    pub waktu: i64,
    /// Temperature.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub suhu: f64,
    /// Humidity.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub lembap: f64,
    /// Pressure.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub tekanan: f64,
    /// Altitude.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub ketinggian: f64,
    /// CO₂ concentration.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub co2: f64,
    /// Distance.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub jarak: f64,
    /// Wind speed.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub angin: f64,
    /// Wind direction.
    #[serde(default, deserialize_with = "null_as_zero", rename = "arahAngin")]
    pub arah_angin: f64,
    /// Bus voltage.
    #[serde(default, deserialize_with = "null_as_zero", rename = "busVoltage")]
    pub bus_voltage: f64,
    /// Current draw in mA.
    #[serde(default, deserialize_with = "null_as_zero", rename = "current_mA")]
    pub current_ma: f64,
    /// Sensor voltage.
    #[serde(default, deserialize_with = "null_as_zero", rename = "voltSensor")]
    pub volt_sensor: f64,
    /// Rainfall.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub rain: f64,
}

impl DevicePayload {
    /// Parse a raw broker payload. Only a JSON object is accepted.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let value: Value = serde_json::from_slice(bytes)?;
        if !value.is_object() {
            return Err(CodecError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Remap device vocabulary onto the canonical schema.
    pub fn into_reading(self) -> Result<Reading, CodecError> {
        let timestamp = DateTime::from_timestamp_millis(self.waktu)
            .ok_or(CodecError::TimestampOutOfRange(self.waktu))?;

        Ok(Reading {
            timestamp,
            temperature: self.suhu,
            humidity: self.lembap,
            pressure: self.tekanan,
            altitude: self.ketinggian,
            co2: self.co2,
            distance: self.jarak,
            wind_speed: self.angin,
            wind_direction: self.arah_angin,
            rainfall: self.rain,
            voltage: self.volt_sensor,
            bus_voltage: self.bus_voltage,
            current: self.current_ma,
        })
    }
}

/// Firmware serialises a failed sensor (NaN) as `null`.
fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a broker payload straight into a canonical reading.
pub fn decode_reading(bytes: &[u8]) -> Result<Reading, CodecError> {
    DevicePayload::decode(bytes)?.into_reading()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "waktu": 1700000000000,
        "suhu": 25.5,
        "lembap": 60.2,
        "tekanan": 1012.8,
        "ketinggian": 201.3,
        "co2": 455.0,
        "jarak": 80.0,
        "angin": 2.5,
        "arahAngin": 135.0,
        "busVoltage": 5.02,
        "current_mA": 118.4,
        "voltSensor": 4.87,
        "rain": 1.2
    }"#;

    #[test]
    fn decodes_full_payload() {
        let reading = decode_reading(FULL.as_bytes()).unwrap();
        assert_eq!(reading.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(reading.temperature, 25.5);
        assert_eq!(reading.humidity, 60.2);
        assert_eq!(reading.pressure, 1012.8);
        assert_eq!(reading.altitude, 201.3);
        assert_eq!(reading.co2, 455.0);
        assert_eq!(reading.distance, 80.0);
        assert_eq!(reading.wind_speed, 2.5);
        assert_eq!(reading.wind_direction, 135.0);
        assert_eq!(reading.bus_voltage, 5.02);
        assert_eq!(reading.current, 118.4);
        assert_eq!(reading.voltage, 4.87);
        assert_eq!(reading.rainfall, 1.2);
    }

    #[test]
    fn missing_scalars_default_to_zero() {
        let reading = decode_reading(br#"{"waktu":1700000000000,"suhu":25.5}"#).unwrap();
        assert_eq!(reading.temperature, 25.5);
        assert_eq!(reading.humidity, 0.0);
        assert_eq!(reading.current, 0.0);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let reading =
            decode_reading(br#"{"waktu":1700000000000,"suhu":20.0,"firmware":"1.2.0"}"#).unwrap();
        assert_eq!(reading.temperature, 20.0);
    }

    #[test]
    fn missing_timestamp_is_rejected() {
        let err = decode_reading(br#"{"suhu":25.5}"#).unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }

    #[test]
    fn fractional_timestamp_is_rejected() {
        let err = decode_reading(br#"{"waktu":1700000000000.5}"#).unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(decode_reading(b"not json").is_err());
        assert!(decode_reading(b"").is_err());
        assert!(decode_reading(b"[1,2,3]").is_err());
    }

    #[test]
    fn non_object_payloads_are_rejected() {
        let payloads: [&[u8]; 5] = [b"[1700000000000,25.5,60.2]", b"42", b"\"text\"", b"null", b"true"];
        for raw in payloads {
            assert!(
                matches!(decode_reading(raw), Err(CodecError::NotAnObject)),
                "{:?} should be rejected",
                String::from_utf8_lossy(raw)
            );
        }
    }

    #[test]
    fn null_scalars_decode_as_zero() {
        let reading =
            decode_reading(br#"{"waktu":1700000000000,"suhu":25.5,"lembap":null,"arahAngin":null}"#)
                .unwrap();
        assert_eq!(reading.temperature, 25.5);
        assert_eq!(reading.humidity, 0.0);
        assert_eq!(reading.wind_direction, 0.0);
    }

    #[test]
    fn null_timestamp_is_rejected() {
        let err = decode_reading(br#"{"waktu":null,"suhu":25.5}"#).unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }

    #[test]
    fn wrong_scalar_type_is_rejected() {
        let err = decode_reading(br#"{"waktu":1700000000000,"suhu":"hot"}"#).unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }

    #[test]
    fn out_of_range_timestamp_is_rejected() {
        let payload = format!(r#"{{"waktu":{}}}"#, i64::MAX);
        let err = decode_reading(payload.as_bytes()).unwrap_err();
        assert!(matches!(err, CodecError::TimestampOutOfRange(_)));
    }

    #[test]
    fn negative_timestamp_before_epoch() {
        let reading = decode_reading(br#"{"waktu":-1000}"#).unwrap();
        assert_eq!(reading.timestamp.timestamp(), -1);
    }
}
