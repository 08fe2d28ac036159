//! In-memory playback engine.
//!
//! `LoopbackEngine` behaves like a media player whose clock only moves when
//! told to, which keeps the demo and the controller tests deterministic. Every
//! command it receives is recorded.

use {
    async_channel::{Receiver, Sender, unbounded},
    parking_lot::Mutex,
    tracing::debug,
};

use crate::playback::engine::{EngineEvent, MediaItem, PlaybackEngine};

/// Default duration reported for prepared items.
const DEFAULT_ITEM_DURATION_MS: u64 = 60_000;

/// A command received by the loopback engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SetMediaItems(Vec<String>),
    SetMediaItem(String),
    Prepare,
    Play,
    Pause,
    Stop,
    SeekTo(u64),
    SeekToItem(usize),
    SeekToNext,
    SeekToPrevious,
    SetVolume(f32),
    SetSpeed(f32),
    Release,
}

#[derive(Debug)]
struct Transport {
    items: Vec<MediaItem>,
    index: usize,
    playing: bool,
    position_ms: u64,
    duration_ms: Option<u64>,
    item_duration_ms: Option<u64>,
    volume: f32,
    speed: f32,
    released: bool,
}

impl Transport {
    fn load(&mut self, items: Vec<MediaItem>) {
        self.items = items;
        self.index = 0;
        self.position_ms = 0;
        self.duration_ms = None;
    }

    fn has_next(&self) -> bool {
        self.index + 1 < self.items.len()
    }
}

/// Scriptable in-memory engine.
#[derive(Debug)]
pub struct LoopbackEngine {
    transport: Mutex<Transport>,
    subscribers: Mutex<Vec<Sender<EngineEvent>>>,
    calls: Mutex<Vec<EngineCall>>,
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackEngine {
    /// Creates an idle engine with nothing loaded.
    #[must_use]
    pub fn new() -> Self {
        Self {
            transport: Mutex::new(Transport {
                items: Vec::new(),
                index: 0,
                playing: false,
                position_ms: 0,
                duration_ms: None,
                item_duration_ms: Some(DEFAULT_ITEM_DURATION_MS),
                volume: 1.0,
                speed: 1.0,
                released: false,
            }),
            subscribers: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sets the duration reported when an item is prepared.
    ///
    /// `None` makes prepared items report an unknown duration.
    #[must_use]
    pub fn with_item_duration(self, duration_ms: Option<u64>) -> Self {
        self.transport.lock().item_duration_ms = duration_ms;
        self
    }

    /// Every command received so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    /// Forgets the recorded commands.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Media IDs of the loaded items.
    #[must_use]
    pub fn loaded_ids(&self) -> Vec<String> {
        self.transport
            .lock()
            .items
            .iter()
            .map(|item| item.media_id.clone())
            .collect()
    }

    #[must_use]
    pub fn volume(&self) -> f32 {
        self.transport.lock().volume
    }

    #[must_use]
    pub fn speed(&self) -> f32 {
        self.transport.lock().speed
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.transport.lock().released
    }

    /// Overrides the position without emitting anything.
    pub fn set_position_ms(&self, position_ms: u64) {
        self.transport.lock().position_ms = position_ms;
    }

    /// Overrides the playing flag without emitting anything.
    pub fn set_playing(&self, playing: bool) {
        self.transport.lock().playing = playing;
    }

    /// Sets the current duration and emits `Ready`.
    pub fn make_ready(&self, duration_ms: u64) {
        self.transport.lock().duration_ms = Some(duration_ms);
        self.emit(EngineEvent::Ready { duration_ms });
    }

    /// Emits an arbitrary event to all subscribers.
    pub fn emit(&self, event: EngineEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.try_send(event).is_ok());
    }

    /// Advances the playback clock by `elapsed_ms` scaled by the speed.
    ///
    /// Reaching the end of an item moves to the next one, or stops playback
    /// and emits `Ended` after the last.
    pub fn advance(&self, elapsed_ms: u64) {
        let mut events = Vec::new();
        {
            let mut transport = self.transport.lock();
            if !transport.playing {
                return;
            }

            let step = (elapsed_ms as f64 * f64::from(transport.speed)) as u64;
            transport.position_ms = transport.position_ms.saturating_add(step);

            if let Some(duration_ms) = transport.duration_ms
                && transport.position_ms >= duration_ms
            {
                if transport.has_next() {
                    transport.index += 1;
                    transport.position_ms = 0;
                    events.push(EngineEvent::ItemTransitioned {
                        index: transport.index,
                    });
                } else {
                    transport.position_ms = duration_ms;
                    transport.playing = false;
                    events.push(EngineEvent::IsPlayingChanged(false));
                    events.push(EngineEvent::Ended);
                }
            }
        }

        for event in events {
            self.emit(event);
        }
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }

    fn set_playing_and_notify(&self, playing: bool) {
        let changed = {
            let mut transport = self.transport.lock();
            let changed = transport.playing != playing;
            transport.playing = playing;
            changed
        };
        if changed {
            self.emit(EngineEvent::IsPlayingChanged(playing));
        }
    }

    fn jump_to(&self, index: usize) {
        {
            let mut transport = self.transport.lock();
            if index >= transport.items.len() {
                debug!("Loopback engine ignoring jump to {index}");
                return;
            }
            transport.index = index;
            transport.position_ms = 0;
        }
        self.emit(EngineEvent::ItemTransitioned { index });
    }
}

impl PlaybackEngine for LoopbackEngine {
    fn set_media_items(&self, items: Vec<MediaItem>) {
        self.record(EngineCall::SetMediaItems(
            items.iter().map(|item| item.media_id.clone()).collect(),
        ));
        self.transport.lock().load(items);
    }

    fn set_media_item(&self, item: MediaItem) {
        self.record(EngineCall::SetMediaItem(item.media_id.clone()));
        self.transport.lock().load(vec![item]);
    }

    fn prepare(&self) {
        self.record(EngineCall::Prepare);
        let duration_ms = {
            let mut transport = self.transport.lock();
            if transport.items.is_empty() {
                return;
            }
            transport.duration_ms = transport.item_duration_ms;
            transport.duration_ms
        };
        if let Some(duration_ms) = duration_ms {
            self.emit(EngineEvent::Ready { duration_ms });
        }
    }

    fn play(&self) {
        self.record(EngineCall::Play);
        self.set_playing_and_notify(true);
    }

    fn pause(&self) {
        self.record(EngineCall::Pause);
        self.set_playing_and_notify(false);
    }

    fn stop(&self) {
        self.record(EngineCall::Stop);
        self.transport.lock().position_ms = 0;
        self.set_playing_and_notify(false);
    }

    fn seek_to(&self, position_ms: u64) {
        self.record(EngineCall::SeekTo(position_ms));
        let mut transport = self.transport.lock();
        transport.position_ms = transport
            .duration_ms
            .map_or(position_ms, |duration_ms| position_ms.min(duration_ms));
    }

    fn seek_to_item(&self, index: usize) {
        self.record(EngineCall::SeekToItem(index));
        self.jump_to(index);
    }

    fn seek_to_next(&self) {
        self.record(EngineCall::SeekToNext);
        let next = self.transport.lock().index + 1;
        self.jump_to(next);
    }

    fn seek_to_previous(&self) {
        self.record(EngineCall::SeekToPrevious);
        let current = self.transport.lock().index;
        if let Some(previous) = current.checked_sub(1) {
            self.jump_to(previous);
        }
    }

    fn has_next_item(&self) -> bool {
        self.transport.lock().has_next()
    }

    fn has_previous_item(&self) -> bool {
        self.transport.lock().index > 0
    }

    fn set_volume(&self, volume: f32) {
        self.record(EngineCall::SetVolume(volume));
        self.transport.lock().volume = volume;
    }

    fn set_speed(&self, speed: f32) {
        self.record(EngineCall::SetSpeed(speed));
        self.transport.lock().speed = speed;
    }

    fn position_ms(&self) -> u64 {
        self.transport.lock().position_ms
    }

    fn duration_ms(&self) -> Option<u64> {
        self.transport.lock().duration_ms
    }

    fn is_playing(&self) -> bool {
        self.transport.lock().playing
    }

    fn current_item_index(&self) -> usize {
        self.transport.lock().index
    }

    fn subscribe(&self) -> Receiver<EngineEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    fn release(&self) {
        self.record(EngineCall::Release);
        {
            let mut transport = self.transport.lock();
            transport.playing = false;
            transport.released = true;
        }
        // Closes every subscriber stream.
        self.subscribers.lock().clear();
    }
}
