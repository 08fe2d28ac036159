//! Local media library.
//!
//! This module provides the media models handed to the players and a cached
//! track repository over an abstract track source.

pub mod models;
pub mod repository;

pub use {
    models::{Track, VideoItem},
    repository::{MemoryTrackSource, TrackRepository, TrackSource},
};
