//! Media playback controllers.
//!
//! Provides the engine abstraction, the cancellable sync loop shared by the
//! players, the video and music controllers built on it, and an in-memory
//! engine.

pub mod audio;
pub mod engine;
pub mod format;
pub mod loopback;
pub mod sync;
pub mod video;

#[cfg(test)]
mod controller_tests;

pub use {
    audio::{MusicPlayerController, PlayerState},
    engine::{EngineEvent, MediaItem, PlaybackEngine},
    format::{format_time, strip_extension},
    sync::{SyncLoop, SyncTarget},
    video::{VideoPlayerController, VideoState},
};
