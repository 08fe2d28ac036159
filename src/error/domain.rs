//! Domain-specific error types using `thiserror`.
//!
//! This module defines the main error enums for the different domains
//! of the crate: device connections, playback control and the track library.

use std::io::Error as IoError;

use thiserror::Error;

use crate::bluetooth::ServiceId;

/// Device connection errors.
///
/// Per-candidate failures (`ChannelCreationFailed`, `ConnectFailed`,
/// `ChannelNotOpen`, `AttemptTimedOut`) are absorbed by the retry loop and
/// only reach callers wrapped in `AllAttemptsExhausted`.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The platform connect permission has not been granted.
    #[error("Bluetooth permission not granted")]
    PermissionDenied,
    /// The local radio is switched off or missing.
    #[error("Bluetooth is not enabled")]
    RadioUnavailable,
    /// Another connection attempt is still running.
    #[error("Already connecting")]
    AlreadyInProgress,
    /// The radio could not resolve the remote address.
    #[error("Could not get remote device {address}")]
    DeviceNotFound { address: String },
    /// Every channel creation strategy failed for one service.
    #[error("Failed to create channel for {service}: {source}")]
    ChannelCreationFailed {
        service: ServiceId,
        #[source]
        source: IoError,
    },
    /// The channel was created but refused to connect.
    #[error("Connection failed with service {service}: {source}")]
    ConnectFailed {
        service: ServiceId,
        #[source]
        source: IoError,
    },
    /// The channel connected but does not report itself open.
    #[error("Channel for {service} did not open")]
    ChannelNotOpen { service: ServiceId },
    /// Connecting a single candidate exceeded the configured timeout.
    #[error("Connection timeout for service {service} after {timeout_ms} ms")]
    AttemptTimedOut { service: ServiceId, timeout_ms: u64 },
    /// All retry rounds were used up.
    #[error("Failed to connect after {rounds} attempts")]
    AllAttemptsExhausted {
        rounds: u32,
        #[source]
        last: Option<Box<ConnectionError>>,
    },
    /// The attempt was cancelled by a disconnect or release.
    #[error("Connection attempt cancelled")]
    Cancelled,
    /// The connector has been released and cannot be reused.
    #[error("Connector has been released")]
    Released,
    /// No open channel is available.
    #[error("Device not connected")]
    NotConnected,
    /// Bonding could not be initiated or was rejected.
    #[error("Pairing failed: {reason}")]
    PairingFailed { reason: String },
    /// The device was still bonding when the poll budget ran out.
    #[error("Pairing with {address} timed out after {polls} polls")]
    PairingTimedOut { address: String, polls: u32 },
    /// I/O error on an established channel.
    #[error("Channel I/O error: {0}")]
    Io(#[from] IoError),
}

impl ConnectionError {
    /// Returns the underlying cause of an exhausted attempt, if one was recorded.
    #[must_use]
    pub fn last_failure(&self) -> Option<&ConnectionError> {
        match self {
            Self::AllAttemptsExhausted { last, .. } => last.as_deref(),
            _ => None,
        }
    }

    /// Whether the failure is a precondition failure rather than a failed attempt.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::PermissionDenied | Self::RadioUnavailable)
    }
}

/// Playback controller errors.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// No engine is attached to the controller.
    #[error("No playback engine attached")]
    NoEngine,
    /// The playlist has no entries.
    #[error("Playlist is empty")]
    EmptyPlaylist,
    /// Loading the playlist from the library failed.
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),
}

/// Track library errors.
#[derive(Error, Debug)]
pub enum LibraryError {
    /// The track source failed to produce tracks.
    #[error("Track source failed: {reason}")]
    SourceFailed { reason: String },
    /// Record not found.
    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: i64 },
}
