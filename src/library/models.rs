//! Data models for locally stored media.
//!
//! This module defines the audio `Track` and `VideoItem` records handed to
//! the player controllers, with serde serialization for persistence.

use serde::{Deserialize, Serialize};

use crate::playback::engine::MediaItem;

/// Represents an audio track in the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Unique media store ID.
    pub id: i64,
    /// Track title.
    pub title: String,
    /// Artist name.
    pub artist: String,
    /// Album title.
    pub album: String,
    /// Duration in milliseconds.
    pub duration_ms: u64,
    /// Content URI used for playback.
    pub uri: String,
    /// Album art URI (if available).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_art_uri: Option<String>,
}

impl Track {
    /// Engine item for this track, keyed by its ID.
    #[must_use]
    pub fn media_item(&self) -> MediaItem {
        MediaItem::new(self.id.to_string(), self.uri.clone())
    }
}

/// Represents a video file in the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoItem {
    /// Unique media store ID.
    pub id: i64,
    /// Display name including the file extension.
    pub name: String,
    /// Content URI used for playback.
    pub uri: String,
    /// Duration in milliseconds.
    pub duration_ms: u64,
    /// File size in bytes.
    pub size_bytes: u64,
}

impl VideoItem {
    /// Engine item for this video.
    #[must_use]
    pub fn media_item(&self) -> MediaItem {
        MediaItem::new(self.id.to_string(), self.uri.clone())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{from_str, to_string};

    use crate::library::models::{Track, VideoItem};

    #[test]
    fn test_track_without_album_art() {
        let json = r#"{
            "id": 4,
            "title": "Intro",
            "artist": "Unknown Artist",
            "album": "Unknown Album",
            "duration_ms": 61000,
            "uri": "content://media/external/audio/media/4"
        }"#;

        let track: Track = from_str(json).unwrap();
        assert_eq!(track.album_art_uri, None);
        assert!(!to_string(&track).unwrap().contains("album_art_uri"));

        let item = track.media_item();
        assert_eq!(item.media_id, "4");
        assert_eq!(item.uri, "content://media/external/audio/media/4");
    }

    #[test]
    fn test_video_media_item() {
        let video = VideoItem {
            id: 12,
            name: "clip.mp4".to_string(),
            uri: "file:///videos/clip.mp4".to_string(),
            duration_ms: 5_000,
            size_bytes: 1_024,
        };

        let item = video.media_item();
        assert_eq!(item.media_id, "12");
        assert_eq!(item.uri, video.uri);
    }
}
