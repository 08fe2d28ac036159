//! Playback engine abstraction.
//!
//! Controllers drive any media player through `PlaybackEngine`. Engines are
//! shared between a controller and its sync loop, so every method takes
//! `&self` and implementations synchronize internally.

use {
    async_channel::Receiver,
    serde::{Deserialize, Serialize},
};

/// Item loaded into an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Identifier reported back by the engine.
    pub media_id: String,
    /// Content URI to play.
    pub uri: String,
}

impl MediaItem {
    /// Creates a media item.
    pub fn new(media_id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            uri: uri.into(),
        }
    }
}

/// Notification emitted by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// The current item is prepared and its duration is known.
    Ready {
        /// Duration of the current item in milliseconds.
        duration_ms: u64,
    },
    /// Playback moved to another item of the loaded list.
    ItemTransitioned {
        /// Index of the new current item.
        index: usize,
    },
    /// Playback started or stopped.
    IsPlayingChanged(bool),
    /// The current item played to its end.
    Ended,
}

/// A media player.
pub trait PlaybackEngine: Send + Sync + 'static {
    /// Replaces the loaded list.
    fn set_media_items(&self, items: Vec<MediaItem>);

    /// Replaces the loaded list with a single item.
    fn set_media_item(&self, item: MediaItem);

    /// Prepares the current item for playback.
    fn prepare(&self);

    fn play(&self);

    fn pause(&self);

    fn stop(&self);

    /// Seeks within the current item.
    fn seek_to(&self, position_ms: u64);

    /// Jumps to the start of the item at `index`.
    fn seek_to_item(&self, index: usize);

    fn seek_to_next(&self);

    fn seek_to_previous(&self);

    fn has_next_item(&self) -> bool;

    fn has_previous_item(&self) -> bool;

    /// Sets the output volume in `[0, 1]`.
    fn set_volume(&self, volume: f32);

    /// Sets the playback speed multiplier.
    fn set_speed(&self, speed: f32);

    /// Current position in the current item.
    fn position_ms(&self) -> u64;

    /// Duration of the current item, `None` while unknown.
    fn duration_ms(&self) -> Option<u64>;

    fn is_playing(&self) -> bool;

    /// Index of the current item in the loaded list.
    fn current_item_index(&self) -> usize;

    /// Subscribes to engine events.
    ///
    /// # Returns
    ///
    /// An `async_channel::Receiver` that receives every event emitted after
    /// the call.
    fn subscribe(&self) -> Receiver<EngineEvent>;

    /// Releases the underlying player; the engine is unusable afterwards.
    fn release(&self);
}
