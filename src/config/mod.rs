//! User preferences and persisted settings.
//!
//! This module provides settings management with XDG Base Directory
//! compliance for the connector and player policies.

pub mod settings;

pub use settings::{
    ConnectionConfig, SettingsError, SettingsManager, SyncConfig, UserSettings, get_config_path,
};
