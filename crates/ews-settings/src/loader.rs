//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`EwsSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate ranges the type system cannot express
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::EwsSettings;

/// Base directory for backend state (`~/.ews`).
pub fn ews_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".ews")
}

/// Resolve the path to the settings file (`~/.ews/settings.json`).
pub fn settings_path() -> PathBuf {
    ews_home().join("settings.json")
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults (plus env overrides). If the
/// file contains invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<EwsSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Defaults merged with the settings file, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<EwsSettings> {
    let defaults = serde_json::to_value(EwsSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Reject values that deserialize fine but cannot work at runtime.
pub fn validate(settings: &EwsSettings) -> Result<()> {
    if settings.broker.qos > 2 {
        return Err(SettingsError::InvalidValue(format!(
            "broker.qos must be 0, 1 or 2 (got {})",
            settings.broker.qos
        )));
    }
    if settings.hub.queue_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "hub.queueCapacity must be at least 1".into(),
        ));
    }
    if settings.hub.command_buffer == 0 {
        return Err(SettingsError::InvalidValue(
            "hub.commandBuffer must be at least 1".into(),
        ));
    }
    if settings.server.pong_wait_secs == 0 {
        return Err(SettingsError::InvalidValue(
            "server.pongWaitSecs must be at least 1".into(),
        ));
    }
    Ok(())
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (falling back to file/default).
/// `MQTT_BROKER`, `MQTT_CLIENT_ID`, `MQTT_TOPIC` and `PORT` keep the names
/// the station deployment already uses.
pub fn apply_env_overrides(settings: &mut EwsSettings) {
    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("PORT").and_then(|p| parse_port(&p)) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_string("EWS_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_usize("EWS_QUEUE_CAPACITY", 1, 1_000_000) {
        settings.hub.queue_capacity = v;
    }

    // ── Broker ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("MQTT_BROKER") {
        settings.broker.url = Some(v);
    }
    if let Some(v) = read_env_string("MQTT_CLIENT_ID") {
        settings.broker.client_id = v;
    }
    if let Some(v) = read_env_string("MQTT_TOPIC") {
        settings.broker.topic = v;
    }
    if let Some(v) = read_env_u8("MQTT_QOS", 0, 2) {
        settings.broker.qos = v;
    }

    // ── Storage / logging ───────────────────────────────────────────
    if let Some(v) = read_env_string("EWS_DB_PATH") {
        settings.database.path = PathBuf::from(v);
    }
    if let Some(v) = read_env_string("EWS_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("EWS_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a listen port, tolerating a leading `:` (`":8080"`).
pub fn parse_port(val: &str) -> Option<u16> {
    let trimmed = val.strip_prefix(':').unwrap_or(val);
    let port = trimmed.parse().ok();
    if port.is_none() {
        tracing::warn!(value = %val, "invalid port, ignoring");
    }
    port
}

/// Parse a string as a `u8` within a range.
pub fn parse_u8_range(val: &str, min: u8, max: u8) -> Option<u8> {
    let n: u8 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u8(name: &str, min: u8, max: u8) -> Option<u8> {
    let val = std::env::var(name).ok()?;
    let result = parse_u8_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u8 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({
            "server": {"port": 8080, "host": "localhost"}
        });
        let source = serde_json::json!({
            "server": {"port": 9090}
        });
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4, 5]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["items"], serde_json::json!([4, 5]));
    }

    #[test]
    fn merge_new_keys_added() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 42);
    }

    // ── file layer ──────────────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_file_layer(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.broker.topic, "sensors/ewsbe");
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 9090}, "broker": {"url": "tcp://broker:1883", "qos": 1}}"#,
        )
        .unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.pong_wait_secs, 60);
        assert_eq!(settings.broker.url.as_deref(), Some("tcp://broker:1883"));
        assert_eq!(settings.broker.qos, 1);
        assert_eq!(settings.broker.client_id, "ews-backend");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_file_layer(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_wrong_type_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": "eighty"}}"#).unwrap();

        assert!(load_file_layer(&path).is_err());
    }

    // ── validate ────────────────────────────────────────────────────

    #[test]
    fn validate_accepts_defaults() {
        assert!(validate(&EwsSettings::default()).is_ok());
    }

    #[test]
    fn validate_rejects_bad_qos() {
        let mut settings = EwsSettings::default();
        settings.broker.qos = 3;
        let err = validate(&settings).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(_)));
        assert!(err.to_string().contains("qos"));
    }

    #[test]
    fn validate_rejects_zero_queue() {
        let mut settings = EwsSettings::default();
        settings.hub.queue_capacity = 0;
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn validate_rejects_zero_pong_wait() {
        let mut settings = EwsSettings::default();
        settings.server.pong_wait_secs = 0;
        assert!(validate(&settings).is_err());
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in &["true", "1", "yes", "on", "TRUE", "On"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in &["false", "0", "no", "off", "NO"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_port_accepts_colon_prefix() {
        assert_eq!(parse_port("8080"), Some(8080));
        assert_eq!(parse_port(":9000"), Some(9000));
        assert_eq!(parse_port("port"), None);
        assert_eq!(parse_port("70000"), None);
    }

    #[test]
    fn parse_u8_range_bounds() {
        assert_eq!(parse_u8_range("0", 0, 2), Some(0));
        assert_eq!(parse_u8_range("2", 0, 2), Some(2));
        assert_eq!(parse_u8_range("3", 0, 2), None);
        assert_eq!(parse_u8_range("-1", 0, 2), None);
    }

    #[test]
    fn parse_usize_range_bounds() {
        assert_eq!(parse_usize_range("256", 1, 1_000_000), Some(256));
        assert_eq!(parse_usize_range("0", 1, 1_000_000), None);
    }
}
