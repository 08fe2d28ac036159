//! Remote device descriptions supplied by the device directory.

use serde::{Deserialize, Serialize};

/// Classification of a remote device, used to pick candidate services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// Over-ear or on-ear headphones.
    Headphones,
    /// In-ear wireless earbuds.
    Earbuds,
    /// Standalone speakers.
    Speakers,
    /// Mono headset with microphone.
    Headset,
    /// Mobile phone.
    Phone,
    /// Tablet.
    Tablet,
    /// Smart watch.
    Watch,
    /// Keyboard.
    Keyboard,
    /// Mouse.
    Mouse,
    /// Anything the directory could not classify.
    #[default]
    Unknown,
}

impl DeviceType {
    /// Whether the device renders audio.
    #[must_use]
    pub fn is_audio_sink(self) -> bool {
        matches!(
            self,
            Self::Headphones | Self::Earbuds | Self::Speakers | Self::Headset
        )
    }
}

/// Platform bonding state of a remote device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BondState {
    /// Not bonded.
    None,
    /// Bonding is in progress.
    Bonding,
    /// Bonded.
    Bonded,
}

/// A reachable remote device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteDevice {
    /// Hardware address, e.g. `00:11:22:33:44:55`.
    pub address: String,
    /// Display name.
    pub name: String,
    /// Device classification.
    pub device_type: DeviceType,
}

impl RemoteDevice {
    /// Creates a new device description.
    pub fn new(address: impl Into<String>, name: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            device_type,
        }
    }
}
