//! Music player controller.
//!
//! The `MusicPlayerController` loads the whole track list into its engine and
//! follows the engine's current item. A 1000 ms sync loop republishes the
//! position and playing flag.

use std::sync::Arc;

use {
    serde::{Deserialize, Serialize},
    tokio::sync::watch,
    tracing::{debug, info, warn},
};

use crate::{
    config::SyncConfig,
    error::PlaybackError,
    library::{Track, TrackRepository},
    playback::{
        engine::{EngineEvent, MediaItem, PlaybackEngine},
        sync::{SyncLoop, SyncTarget},
    },
};

/// Observable music player state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub is_playing: bool,
    pub current_track: Option<Track>,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub playlist: Vec<Track>,
    pub current_index: usize,
    pub has_next: bool,
    pub has_previous: bool,
    /// Title of the current track, empty when none is selected.
    pub title: String,
}

/// Engine and published state, shared with the sync loop.
struct MusicCore<E> {
    engine: Arc<E>,
    state_tx: watch::Sender<PlayerState>,
}

impl<E: PlaybackEngine> MusicCore<E> {
    /// Derives the current track from the engine's item index.
    ///
    /// Indices outside the playlist leave the state untouched.
    fn update_current_track(&self) {
        let index = self.engine.current_item_index();
        self.state_tx.send_if_modified(|state| {
            let Some(track) = state.playlist.get(index).cloned() else {
                return false;
            };
            state.title.clone_from(&track.title);
            state.current_track = Some(track);
            state.current_index = index;
            state.has_next = index + 1 < state.playlist.len();
            state.has_previous = index > 0;
            true
        });
    }
}

impl<E: PlaybackEngine> SyncTarget for MusicCore<E> {
    fn on_tick(&self) {
        let position_ms = self.engine.position_ms();
        let is_playing = self.engine.is_playing();
        self.state_tx.send_modify(|state| {
            state.position_ms = position_ms;
            state.is_playing = is_playing;
        });
    }

    fn on_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::IsPlayingChanged(is_playing) => {
                self.state_tx
                    .send_modify(|state| state.is_playing = is_playing);
            }
            EngineEvent::ItemTransitioned { .. } => self.update_current_track(),
            EngineEvent::Ready { duration_ms } => {
                self.state_tx
                    .send_modify(|state| state.duration_ms = duration_ms);
            }
            EngineEvent::Ended => debug!("Reached the end of the playlist"),
        }
    }
}

/// Music player controller bound to one engine for its lifetime.
pub struct MusicPlayerController<E: PlaybackEngine> {
    core: Arc<MusicCore<E>>,
    seek_step_ms: u64,
    sync: Option<SyncLoop>,
}

impl<E: PlaybackEngine> MusicPlayerController<E> {
    /// Creates a controller and starts its sync loop.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `engine` - Engine the controller drives until shutdown
    /// * `config` - Tick period and seek step
    pub fn new(engine: Arc<E>, config: &SyncConfig) -> Self {
        let (state_tx, _) = watch::channel(PlayerState::default());
        let events = engine.subscribe();
        let core = Arc::new(MusicCore { engine, state_tx });
        let sync = SyncLoop::spawn("music", config.audio_tick(), Arc::clone(&core), events);

        Self {
            core,
            seek_step_ms: config.seek_step_ms,
            sync: Some(sync),
        }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> PlayerState {
        self.core.state_tx.borrow().clone()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<PlayerState> {
        self.core.state_tx.subscribe()
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<E> {
        &self.core.engine
    }

    /// Publishes `tracks` as the playlist and loads them into the engine.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::EmptyPlaylist` for an empty list; the empty
    /// playlist is still published and the engine is left untouched.
    pub fn load_tracks(&self, tracks: Vec<Track>) -> Result<(), PlaybackError> {
        let items: Vec<MediaItem> = tracks.iter().map(Track::media_item).collect();
        self.core.state_tx.send_modify(|state| {
            state.playlist = tracks;
            if state.playlist.is_empty() {
                state.current_track = None;
                state.current_index = 0;
                state.has_next = false;
                state.has_previous = false;
                state.title.clear();
            }
        });

        if items.is_empty() {
            warn!("No tracks to load");
            return Err(PlaybackError::EmptyPlaylist);
        }

        info!("Loading {} tracks", items.len());
        let engine = &self.core.engine;
        engine.set_media_items(items);
        engine.prepare();
        self.core.update_current_track();
        Ok(())
    }

    /// Loads every track of `repository`.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::Library` if the repository cannot scan, or
    /// `PlaybackError::EmptyPlaylist` if it has no tracks.
    pub async fn load_from(&self, repository: &TrackRepository) -> Result<(), PlaybackError> {
        let tracks = repository.get_all_tracks().await?;
        self.load_tracks(tracks)
    }

    /// Pauses when playing, plays otherwise.
    pub fn play_pause(&self) {
        let engine = &self.core.engine;
        let was_playing = engine.is_playing();
        if was_playing {
            engine.pause();
        } else {
            engine.play();
        }
        self.core
            .state_tx
            .send_modify(|state| state.is_playing = !was_playing);
    }

    /// Seeks to an absolute position in the current track.
    pub fn seek_to(&self, position_ms: u64) {
        self.core.engine.seek_to(position_ms);
        self.core
            .state_tx
            .send_modify(|state| state.position_ms = position_ms);
    }

    /// Seeks one step forward, never past the duration once it is known.
    pub fn seek_forward(&self) {
        let engine = &self.core.engine;
        let target = engine.position_ms().saturating_add(self.seek_step_ms);
        let target = engine
            .duration_ms()
            .map_or(target, |duration_ms| target.min(duration_ms));
        self.seek_to(target);
    }

    /// Seeks one step backward, never before the start.
    pub fn seek_backward(&self) {
        let target = self
            .core
            .engine
            .position_ms()
            .saturating_sub(self.seek_step_ms);
        self.seek_to(target);
    }

    /// Skips to the next track; a no-op on the last one.
    ///
    /// # Returns
    ///
    /// Whether playback moved.
    pub fn skip_to_next(&self) -> bool {
        let engine = &self.core.engine;
        if !engine.has_next_item() {
            debug!("Already at the last track");
            return false;
        }
        engine.seek_to_next();
        self.core.update_current_track();
        true
    }

    /// Skips to the previous track; a no-op on the first one.
    ///
    /// # Returns
    ///
    /// Whether playback moved.
    pub fn skip_to_previous(&self) -> bool {
        let engine = &self.core.engine;
        if !engine.has_previous_item() {
            debug!("Already at the first track");
            return false;
        }
        engine.seek_to_previous();
        self.core.update_current_track();
        true
    }

    /// Starts the track at `index`; out of range is a no-op.
    ///
    /// # Returns
    ///
    /// Whether `index` was valid.
    pub fn play_track(&self, index: usize) -> bool {
        if index >= self.core.state_tx.borrow().playlist.len() {
            debug!("No track at index {index}");
            return false;
        }
        let engine = &self.core.engine;
        engine.seek_to_item(index);
        engine.play();
        self.core.update_current_track();
        true
    }

    pub fn stop(&self) {
        self.core.engine.stop();
        self.core.state_tx.send_modify(|state| {
            state.is_playing = false;
            state.position_ms = 0;
        });
    }

    /// Sets the playback speed multiplier.
    pub fn set_playback_speed(&self, speed: f32) {
        self.core.engine.set_speed(speed);
    }

    /// Stops the sync loop and releases the engine.
    ///
    /// Later calls do nothing.
    pub async fn shutdown(&mut self) {
        if let Some(sync) = self.sync.take() {
            sync.cancel().await;
            self.core.engine.release();
            debug!("Music engine released");
        }
    }
}
