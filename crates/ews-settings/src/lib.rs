//! # ews-settings
//!
//! Configuration for the weather station backend.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`EwsSettings::default()`]
//! 2. **Settings file**: `~/.ews/settings.json` or an explicit path
//!    (deep-merged over defaults)
//! 3. **Environment variables**: `PORT`, `MQTT_*`, `EWS_*` overrides
//!    (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings_from_path, settings_path};
pub use types::*;
