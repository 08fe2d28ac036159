//! User preference management with XDG Base Directory compliance.
//!
//! This module provides the persisted settings of the crate: connection
//! retry policy and playback sync behaviour, stored as JSON under the XDG
//! config directory.

use std::{
    env::var,
    fs::{create_dir_all, read_to_string, write},
    io::Error as StdError,
    path::PathBuf,
    time::Duration,
};

use {
    parking_lot::{RwLock, RwLockReadGuard},
    serde::{Deserialize, Serialize},
    serde_json::{Error as SerdeJsonError, from_str, to_string_pretty},
    thiserror::Error,
    tracing::debug,
};

/// Error type for settings operations.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Failed to read or write settings file.
    #[error("IO error: {0}")]
    IoError(#[from] StdError),
    /// Failed to serialize or deserialize settings.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] SerdeJsonError),
    /// Invalid settings value.
    #[error("Invalid settings value: {reason}")]
    InvalidValue { reason: String },
}

/// Retry and timeout policy of the device connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Timeout for connecting a single candidate channel.
    pub connect_timeout_ms: u64,
    /// Number of full rounds over the candidate list.
    pub max_attempts: u32,
    /// Pause between rounds.
    pub retry_delay_ms: u64,
    /// Pause after cancelling discovery, before the first channel is opened.
    pub discovery_settle_ms: u64,
    /// Interval between bond state polls while pairing.
    pub bond_poll_interval_ms: u64,
    /// Maximum number of bond state polls.
    pub bond_poll_limit: u32,
    /// Port used by the raw channel fallback strategy.
    pub raw_channel_port: u8,
    /// Whether `pair_and_connect` gives up on a device that did not bond.
    pub require_bond: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 15_000,
            max_attempts: 3,
            retry_delay_ms: 2_000,
            discovery_settle_ms: 500,
            bond_poll_interval_ms: 1_000,
            bond_poll_limit: 30,
            raw_channel_port: 1,
            require_bond: false,
        }
    }
}

impl ConnectionConfig {
    /// Timeout applied to each channel connect.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Delay between retry rounds.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Delay after cancelling discovery.
    #[must_use]
    pub fn discovery_settle(&self) -> Duration {
        Duration::from_millis(self.discovery_settle_ms)
    }

    /// Interval between bond state polls.
    #[must_use]
    pub fn bond_poll_interval(&self) -> Duration {
        Duration::from_millis(self.bond_poll_interval_ms)
    }

    /// Checks that the policy can make at least one attempt.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidValue` for a zero attempt count or timeout.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_attempts == 0 {
            return Err(SettingsError::InvalidValue {
                reason: "connection.max_attempts must be at least 1".to_string(),
            });
        }
        if self.connect_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue {
                reason: "connection.connect_timeout_ms must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Polling and gesture behaviour of the player controllers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Tick period of the video sync loop.
    pub video_tick_ms: u64,
    /// Tick period of the audio sync loop.
    pub audio_tick_ms: u64,
    /// Step used by relative seeks.
    pub seek_step_ms: u64,
    /// Brightness a fresh video controller starts with.
    pub initial_brightness: f32,
    /// Volume a fresh video controller starts with.
    pub initial_volume: f32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            video_tick_ms: 100,
            audio_tick_ms: 1_000,
            seek_step_ms: 10_000,
            initial_brightness: 0.5,
            initial_volume: 1.0,
        }
    }
}

impl SyncConfig {
    /// Tick period of the video loop.
    #[must_use]
    pub fn video_tick(&self) -> Duration {
        Duration::from_millis(self.video_tick_ms)
    }

    /// Tick period of the audio loop.
    #[must_use]
    pub fn audio_tick(&self) -> Duration {
        Duration::from_millis(self.audio_tick_ms)
    }

    /// Checks tick periods and initial levels.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidValue` for a zero tick period or a level
    /// outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.video_tick_ms == 0 || self.audio_tick_ms == 0 {
            return Err(SettingsError::InvalidValue {
                reason: "sync tick periods must be positive".to_string(),
            });
        }
        for (name, level) in [
            ("initial_brightness", self.initial_brightness),
            ("initial_volume", self.initial_volume),
        ] {
            if !(0.0..=1.0).contains(&level) {
                return Err(SettingsError::InvalidValue {
                    reason: format!("sync.{name} must be within [0, 1], got {level}"),
                });
            }
        }
        Ok(())
    }
}

/// Serializable user settings structure with default values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    /// Device connector policy.
    pub connection: ConnectionConfig,
    /// Player controller behaviour.
    pub sync: SyncConfig,
}

impl UserSettings {
    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first `SettingsError::InvalidValue` found.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.connection.validate()?;
        self.sync.validate()
    }
}

/// Handles loading, saving, and validation of user preferences.
#[derive(Debug)]
pub struct SettingsManager {
    /// Thread-safe user settings storage.
    settings: RwLock<UserSettings>,
    /// Path to the configuration file on disk.
    config_path: PathBuf,
}

impl SettingsManager {
    /// Creates a new settings manager with default config path.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if settings cannot be loaded from disk.
    pub fn new() -> Result<Self, SettingsError> {
        Self::with_config_path(get_config_path())
    }

    /// Creates a new settings manager with a custom config path.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Custom path for the settings file
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the file exists but cannot be read, parsed
    /// or validated.
    pub fn with_config_path(config_path: PathBuf) -> Result<Self, SettingsError> {
        if let Some(parent) = config_path.parent() {
            create_dir_all(parent)?;
        }

        let settings: UserSettings = if config_path.exists() {
            debug!("Loading settings from existing file: {:?}", config_path);
            let contents = read_to_string(&config_path)?;
            from_str(&contents)?
        } else {
            debug!("Using default settings, no file at {:?}", config_path);
            UserSettings::default()
        };
        settings.validate()?;

        Ok(SettingsManager {
            settings: RwLock::new(settings),
            config_path,
        })
    }

    /// Gets the current settings.
    pub fn get_settings(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.settings.read()
    }

    /// Gets the configuration file path.
    pub fn get_config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Validates, applies and saves new settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the settings are invalid or cannot be saved.
    /// Invalid settings are not applied.
    pub fn update_settings(&self, new_settings: UserSettings) -> Result<(), SettingsError> {
        new_settings.validate()?;
        *self.settings.write() = new_settings;
        self.save_settings()
    }

    /// Saves the current settings to disk.
    fn save_settings(&self) -> Result<(), SettingsError> {
        debug!("Saving settings to file: {:?}", self.config_path);
        let contents = to_string_pretty(&*self.settings.read())?;
        write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Path of the settings file inside the XDG config directory.
#[must_use]
pub fn get_config_path() -> PathBuf {
    let mut config_dir = get_xdg_config_home();
    config_dir.push("mediadeck");
    config_dir.push("settings.json");
    config_dir
}

/// Gets the XDG config home directory following XDG Base Directory specification.
///
/// Uses `XDG_CONFIG_HOME` environment variable if set, otherwise defaults to $HOME/.config
fn get_xdg_config_home() -> PathBuf {
    if let Ok(config_home) = var("XDG_CONFIG_HOME")
        && !config_home.is_empty()
    {
        return PathBuf::from(config_home);
    }

    if let Ok(home) = var("HOME") {
        let mut path = PathBuf::from(home);
        path.push(".config");
        return path;
    }

    PathBuf::from(".")
}
