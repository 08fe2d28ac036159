//! Track repository with a scan cache.
//!
//! The `TrackRepository` asks a `TrackSource` for the device's tracks once and
//! serves every later request from memory. Failed scans are not cached, so the
//! next request scans again.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering::SeqCst},
};

use {
    async_trait::async_trait,
    parking_lot::RwLock,
    tokio::sync::OnceCell,
    tracing::{debug, info},
};

use crate::{error::LibraryError, library::models::Track};

/// Producer of the tracks stored on the device.
#[async_trait]
pub trait TrackSource: Send + Sync {
    /// Scans storage for music tracks.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::SourceFailed` if the scan cannot complete.
    async fn scan_tracks(&self) -> Result<Vec<Track>, LibraryError>;
}

/// Cached view over a `TrackSource`.
pub struct TrackRepository {
    source: Arc<dyn TrackSource>,
    cache: OnceCell<Vec<Track>>,
}

impl TrackRepository {
    /// Creates a repository with an empty cache.
    ///
    /// # Arguments
    ///
    /// * `source` - Where tracks are scanned from
    pub fn new(source: Arc<dyn TrackSource>) -> Self {
        Self {
            source,
            cache: OnceCell::new(),
        }
    }

    /// Gets all tracks, scanning the source on first use.
    ///
    /// # Returns
    ///
    /// A `Result` containing the cached tracks or a `LibraryError`.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if the first successful scan has not happened
    /// yet and the source fails.
    pub async fn get_all_tracks(&self) -> Result<Vec<Track>, LibraryError> {
        let tracks = self
            .cache
            .get_or_try_init(|| async {
                let tracks = self.source.scan_tracks().await?;
                info!("Scanned {} tracks", tracks.len());
                Ok::<_, LibraryError>(tracks)
            })
            .await?;
        Ok(tracks.clone())
    }

    /// Looks a track up by ID in the cache.
    ///
    /// Only tracks returned by a previous `get_all_tracks` are known.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::NotFound` if the track is not cached.
    pub fn get_track_by_id(&self, id: i64) -> Result<Track, LibraryError> {
        self.cache
            .get()
            .and_then(|tracks| tracks.iter().find(|track| track.id == id))
            .cloned()
            .ok_or_else(|| {
                debug!("Track {id} not in cache");
                LibraryError::NotFound {
                    entity: "track".to_string(),
                    id,
                }
            })
    }

    /// Whether a scan has been cached.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.cache.initialized()
    }
}

/// Track source backed by a fixed list.
#[derive(Debug, Default)]
pub struct MemoryTrackSource {
    tracks: RwLock<Vec<Track>>,
    failing: AtomicBool,
    scans: AtomicUsize,
}

impl MemoryTrackSource {
    /// Creates a source that returns `tracks`.
    #[must_use]
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks: RwLock::new(tracks),
            ..Self::default()
        }
    }

    /// Makes subsequent scans fail or succeed.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, SeqCst);
    }

    /// Number of scans served so far, failed ones included.
    #[must_use]
    pub fn scan_count(&self) -> usize {
        self.scans.load(SeqCst)
    }
}

#[async_trait]
impl TrackSource for MemoryTrackSource {
    async fn scan_tracks(&self) -> Result<Vec<Track>, LibraryError> {
        self.scans.fetch_add(1, SeqCst);
        if self.failing.load(SeqCst) {
            return Err(LibraryError::SourceFailed {
                reason: "storage unavailable".to_string(),
            });
        }
        Ok(self.tracks.read().clone())
    }
}
