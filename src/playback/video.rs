//! Video player controller.
//!
//! The `VideoPlayerController` publishes a `VideoState` that a 100 ms sync
//! loop keeps in step with the attached engine. The playlist is held locally
//! and the engine is loaded with one video at a time, so navigation is
//! tracked by the controller rather than the engine.

use std::sync::Arc;

use {
    parking_lot::RwLock,
    serde::{Deserialize, Serialize},
    tokio::sync::watch,
    tracing::{debug, info},
};

use crate::{
    config::SyncConfig,
    error::PlaybackError,
    library::VideoItem,
    playback::{
        engine::{EngineEvent, PlaybackEngine},
        format::strip_extension,
        sync::{SyncLoop, SyncTarget},
    },
};

/// Scale applied to brightness and volume gesture deltas.
const GESTURE_SCALE: f32 = 0.01;

/// Observable video player state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoState {
    pub is_playing: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
    /// Screen brightness in `[0, 1]`.
    pub brightness: f32,
    /// Output volume in `[0, 1]`.
    pub volume: f32,
    pub is_landscape: bool,
    /// Index of the current video in the playlist.
    pub current_index: usize,
    pub has_next: bool,
    pub has_previous: bool,
    /// Name of the current video without its extension.
    pub title: String,
}

impl Default for VideoState {
    fn default() -> Self {
        Self {
            is_playing: false,
            position_ms: 0,
            duration_ms: 0,
            brightness: 0.5,
            volume: 1.0,
            is_landscape: false,
            current_index: 0,
            has_next: false,
            has_previous: false,
            title: String::new(),
        }
    }
}

/// Playlist and published state, shared with the sync loop.
struct VideoSession {
    state_tx: watch::Sender<VideoState>,
    playlist: RwLock<Vec<VideoItem>>,
}

impl VideoSession {
    fn current_index(&self) -> usize {
        self.state_tx.borrow().current_index
    }

    /// Recomputes the fields derived from the playlist and current index.
    fn refresh_info(&self) {
        let playlist = self.playlist.read();
        self.state_tx.send_modify(|state| {
            state.has_next = state.current_index + 1 < playlist.len();
            state.has_previous = state.current_index > 0;
            state.title = playlist
                .get(state.current_index)
                .map(|video| strip_extension(&video.name).to_string())
                .unwrap_or_default();
        });
    }

    fn play_at<E: PlaybackEngine>(&self, engine: Option<&E>, index: usize) -> bool {
        let Some(item) = self.playlist.read().get(index).map(VideoItem::media_item) else {
            debug!("No video at index {index}");
            return false;
        };

        debug!("Playing video at index {index}");
        self.state_tx.send_modify(|state| state.current_index = index);
        if let Some(engine) = engine {
            engine.set_media_item(item);
            engine.prepare();
            engine.play();
        }
        self.refresh_info();
        true
    }

    fn play_next<E: PlaybackEngine>(&self, engine: Option<&E>) -> bool {
        let next = self.current_index() + 1;
        if next >= self.playlist.read().len() {
            debug!("Already at the last video");
            return false;
        }
        self.play_at(engine, next)
    }

    fn play_previous<E: PlaybackEngine>(&self, engine: Option<&E>) -> bool {
        let Some(previous) = self.current_index().checked_sub(1) else {
            debug!("Already at the first video");
            return false;
        };
        self.play_at(engine, previous)
    }
}

/// Sync loop target binding one engine to the session.
struct VideoSync<E> {
    engine: Arc<E>,
    session: Arc<VideoSession>,
}

impl<E: PlaybackEngine> SyncTarget for VideoSync<E> {
    fn on_tick(&self) {
        let position_ms = self.engine.position_ms();
        let is_playing = self.engine.is_playing();
        self.session.state_tx.send_modify(|state| {
            state.position_ms = position_ms;
            state.is_playing = is_playing;
        });
    }

    fn on_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::Ready { duration_ms } => {
                self.session
                    .state_tx
                    .send_modify(|state| state.duration_ms = duration_ms);
            }
            EngineEvent::ItemTransitioned { .. } => self.session.refresh_info(),
            EngineEvent::IsPlayingChanged(is_playing) => {
                self.session
                    .state_tx
                    .send_modify(|state| state.is_playing = is_playing);
            }
            EngineEvent::Ended => {
                self.session.play_next(Some(self.engine.as_ref()));
            }
        }
    }
}

/// Video player controller.
///
/// Engines can be swapped at runtime; the sync loop of the previous engine is
/// always stopped before the next one starts.
pub struct VideoPlayerController<E: PlaybackEngine> {
    config: SyncConfig,
    session: Arc<VideoSession>,
    engine: Option<Arc<E>>,
    sync: Option<SyncLoop>,
}

impl<E: PlaybackEngine> VideoPlayerController<E> {
    /// Creates a controller without an engine.
    ///
    /// # Arguments
    ///
    /// * `config` - Tick period, seek step and initial levels
    pub fn new(config: SyncConfig) -> Self {
        let (state_tx, _) = watch::channel(VideoState {
            brightness: config.initial_brightness,
            volume: config.initial_volume,
            ..VideoState::default()
        });

        Self {
            config,
            session: Arc::new(VideoSession {
                state_tx,
                playlist: RwLock::new(Vec::new()),
            }),
            engine: None,
            sync: None,
        }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> VideoState {
        self.session.state_tx.borrow().clone()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<VideoState> {
        self.session.state_tx.subscribe()
    }

    /// The attached engine.
    #[must_use]
    pub fn engine(&self) -> Option<&Arc<E>> {
        self.engine.as_ref()
    }

    /// Whether a sync loop is running.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.sync.as_ref().is_some_and(SyncLoop::is_running)
    }

    /// Attaches `engine` and starts its sync loop.
    ///
    /// # Returns
    ///
    /// The previously attached engine, whose loop has already stopped. The
    /// caller decides whether to release it.
    pub async fn set_engine(&mut self, engine: Arc<E>) -> Option<Arc<E>> {
        let previous = self.detach().await;

        let events = engine.subscribe();
        let target = Arc::new(VideoSync {
            engine: Arc::clone(&engine),
            session: Arc::clone(&self.session),
        });
        self.sync = Some(SyncLoop::spawn(
            "video",
            self.config.video_tick(),
            target,
            events,
        ));
        self.engine = Some(engine);

        previous
    }

    /// Stops the sync loop and detaches the engine without releasing it.
    pub async fn take_engine(&mut self) -> Option<Arc<E>> {
        self.detach().await
    }

    /// Replaces the playlist and selects `start_index`, clamped to its bounds.
    ///
    /// Nothing is loaded into the engine until a video is played.
    pub fn set_playlist(&self, videos: Vec<VideoItem>, start_index: usize) {
        let index = start_index.min(videos.len().saturating_sub(1));
        info!("Video playlist set with {} entries", videos.len());
        *self.session.playlist.write() = videos;
        self.session
            .state_tx
            .send_modify(|state| state.current_index = index);
        self.session.refresh_info();
    }

    /// Current playlist.
    #[must_use]
    pub fn playlist(&self) -> Vec<VideoItem> {
        self.session.playlist.read().clone()
    }

    /// Pauses when playing, plays otherwise.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NoEngine` without an attached engine.
    pub fn toggle_play_pause(&self) -> Result<(), PlaybackError> {
        let engine = self.require_engine()?;
        let was_playing = engine.is_playing();
        if was_playing {
            engine.pause();
        } else {
            engine.play();
        }
        self.session
            .state_tx
            .send_modify(|state| state.is_playing = !was_playing);
        Ok(())
    }

    /// Seeks to an absolute position.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NoEngine` without an attached engine.
    pub fn seek_to(&self, position_ms: u64) -> Result<(), PlaybackError> {
        let engine = self.require_engine()?;
        engine.seek_to(position_ms);
        self.session
            .state_tx
            .send_modify(|state| state.position_ms = position_ms);
        Ok(())
    }

    /// Seeks one step forward, never past the duration once it is known.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NoEngine` without an attached engine.
    pub fn seek_forward(&self) -> Result<(), PlaybackError> {
        let engine = self.require_engine()?;
        let target = engine.position_ms().saturating_add(self.config.seek_step_ms);
        let target = engine
            .duration_ms()
            .map_or(target, |duration_ms| target.min(duration_ms));
        self.seek_to(target)
    }

    /// Seeks one step backward, never before the start.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NoEngine` without an attached engine.
    pub fn seek_backward(&self) -> Result<(), PlaybackError> {
        let engine = self.require_engine()?;
        let target = engine.position_ms().saturating_sub(self.config.seek_step_ms);
        self.seek_to(target)
    }

    /// Sets the playback speed multiplier.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NoEngine` without an attached engine.
    pub fn set_playback_speed(&self, speed: f32) -> Result<(), PlaybackError> {
        self.require_engine()?.set_speed(speed);
        Ok(())
    }

    /// Applies a brightness gesture delta.
    pub fn update_brightness(&self, delta: f32) {
        self.session.state_tx.send_modify(|state| {
            state.brightness = (state.brightness + delta * GESTURE_SCALE).clamp(0.0, 1.0);
        });
    }

    /// Applies a volume gesture delta and forwards the result to the engine.
    pub fn update_volume(&self, delta: f32) {
        let mut volume = 0.0;
        self.session.state_tx.send_modify(|state| {
            state.volume = (state.volume + delta * GESTURE_SCALE).clamp(0.0, 1.0);
            volume = state.volume;
        });
        if let Some(engine) = &self.engine {
            engine.set_volume(volume);
        }
    }

    pub fn toggle_orientation(&self) {
        self.session
            .state_tx
            .send_modify(|state| state.is_landscape = !state.is_landscape);
    }

    pub fn set_orientation(&self, is_landscape: bool) {
        self.session
            .state_tx
            .send_modify(|state| state.is_landscape = is_landscape);
    }

    /// Plays the next video; a no-op on the last one.
    ///
    /// # Returns
    ///
    /// Whether playback moved.
    pub fn play_next_video(&self) -> bool {
        self.session.play_next(self.engine.as_deref())
    }

    /// Plays the previous video; a no-op on the first one.
    ///
    /// # Returns
    ///
    /// Whether playback moved.
    pub fn play_previous_video(&self) -> bool {
        self.session.play_previous(self.engine.as_deref())
    }

    /// Loads and plays the video at `index`; out of range is a no-op.
    ///
    /// # Returns
    ///
    /// Whether `index` was valid.
    pub fn play_video_at_index(&self, index: usize) -> bool {
        self.session.play_at(self.engine.as_deref(), index)
    }

    /// Advances to the next video when the current one finished.
    pub fn handle_video_end(&self) -> bool {
        self.play_next_video()
    }

    /// Stops the sync loop and releases the engine.
    pub async fn shutdown(&mut self) {
        if let Some(engine) = self.detach().await {
            engine.release();
            debug!("Video engine released");
        }
    }

    fn require_engine(&self) -> Result<&Arc<E>, PlaybackError> {
        self.engine.as_ref().ok_or(PlaybackError::NoEngine)
    }

    async fn detach(&mut self) -> Option<Arc<E>> {
        if let Some(sync) = self.sync.take() {
            sync.cancel().await;
        }
        self.engine.take()
    }
}
