//! Mediadeck - media playback core with outbound device connections
//!
//! Drives audio and video playback engines through polling sync loops that keep
//! observable player state current, and connects to remote devices over radio
//! channels with service fallback, bounded retries and per-attempt timeouts.
//! Platform radios and media engines plug in through traits; in-memory
//! loopback backends are included.

pub mod bluetooth;
pub mod config;
pub mod error;
pub mod library;
pub mod playback;

// Re-export key types for convenience
pub use {
    bluetooth::{ConnectionService, ConnectionState, DeviceConnector, DeviceType, RemoteDevice},
    config::{SettingsManager, UserSettings},
    error::{ConnectionError, LibraryError, PlaybackError},
    library::{Track, TrackRepository, VideoItem},
    playback::{
        MusicPlayerController, PlaybackEngine, PlayerState, VideoPlayerController, VideoState,
    },
};
