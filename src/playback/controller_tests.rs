//! Tests for the video and music player controllers.
//!
//! Controllers run against the loopback engine on a paused clock so each sync
//! tick lands at a known instant.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::time::{Duration, sleep};

    use crate::{
        config::SyncConfig,
        error::PlaybackError,
        library::{MemoryTrackSource, Track, TrackRepository, VideoItem},
        playback::{
            MusicPlayerController, PlaybackEngine, VideoPlayerController,
            loopback::{EngineCall, LoopbackEngine},
        },
    };

    fn video(id: i64, name: &str) -> VideoItem {
        VideoItem {
            id,
            name: name.to_string(),
            uri: format!("file:///videos/{name}"),
            duration_ms: 60_000,
            size_bytes: 4_096,
        }
    }

    fn videos(count: i64) -> Vec<VideoItem> {
        (0..count).map(|i| video(i, &format!("clip{i}.mp4"))).collect()
    }

    fn track(id: i64) -> Track {
        Track {
            id,
            title: format!("Track {id}"),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            duration_ms: 60_000,
            uri: format!("content://media/external/audio/media/{id}"),
            album_art_uri: None,
        }
    }

    fn tracks(count: i64) -> Vec<Track> {
        (0..count).map(track).collect()
    }

    async fn video_controller(
        engine: &Arc<LoopbackEngine>,
    ) -> VideoPlayerController<LoopbackEngine> {
        let mut controller = VideoPlayerController::new(SyncConfig::default());
        controller.set_engine(Arc::clone(engine)).await;
        controller
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-5,
            "expected {expected}, got {actual}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_tick_republishes_engine_state() {
        let engine = Arc::new(LoopbackEngine::new());
        let mut controller = video_controller(&engine).await;

        engine.set_position_ms(5_000);
        engine.set_playing(true);
        sleep(Duration::from_millis(50)).await;

        let state = controller.state();
        assert_eq!(state.position_ms, 5_000);
        assert!(state.is_playing);

        engine.set_position_ms(6_000);
        engine.set_playing(false);
        sleep(Duration::from_millis(100)).await;

        let state = controller.state();
        assert_eq!(state.position_ms, 6_000);
        assert!(!state.is_playing);

        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_seek_forward_clamps_to_duration() {
        let engine = Arc::new(LoopbackEngine::new().with_item_duration(Some(60_000)));
        let controller = video_controller(&engine).await;
        controller.set_playlist(videos(1), 0);
        controller.play_video_at_index(0);

        engine.set_position_ms(55_000);
        controller.seek_forward().unwrap();

        assert_eq!(engine.position_ms(), 60_000);
        assert_eq!(engine.calls().last(), Some(&EngineCall::SeekTo(60_000)));
        assert_eq!(controller.state().position_ms, 60_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_seek_backward_clamps_to_zero() {
        let engine = Arc::new(LoopbackEngine::new());
        let controller = video_controller(&engine).await;
        controller.set_playlist(videos(1), 0);
        controller.play_video_at_index(0);

        engine.set_position_ms(3_000);
        controller.seek_backward().unwrap();

        assert_eq!(engine.calls().last(), Some(&EngineCall::SeekTo(0)));
        assert_eq!(controller.state().position_ms, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_seek_forward_with_unknown_duration() {
        let engine = Arc::new(LoopbackEngine::new().with_item_duration(None));
        let controller = video_controller(&engine).await;
        controller.set_playlist(videos(1), 0);
        controller.play_video_at_index(0);

        engine.set_position_ms(5_000);
        controller.seek_forward().unwrap();

        assert_eq!(engine.calls().last(), Some(&EngineCall::SeekTo(15_000)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_boundaries_are_no_ops() {
        let engine = Arc::new(LoopbackEngine::new());
        let controller = video_controller(&engine).await;
        controller.set_playlist(videos(3), 0);

        controller.play_video_at_index(2);
        engine.clear_calls();
        assert!(!controller.play_next_video());
        assert!(!controller.handle_video_end());
        assert_eq!(controller.state().current_index, 2);
        assert!(engine.calls().is_empty());

        controller.play_video_at_index(0);
        engine.clear_calls();
        assert!(!controller.play_previous_video());
        assert_eq!(controller.state().current_index, 0);
        assert!(engine.calls().is_empty());

        assert!(!controller.play_video_at_index(3));
        assert!(engine.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_navigation_loads_single_item() {
        let engine = Arc::new(LoopbackEngine::new());
        let controller = video_controller(&engine).await;
        controller.set_playlist(
            vec![video(10, "intro.mp4"), video(11, "main.feature.mkv")],
            0,
        );

        assert!(controller.play_next_video());

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::SetMediaItem("11".to_string()),
                EngineCall::Prepare,
                EngineCall::Play,
            ]
        );
        let state = controller.state();
        assert_eq!(state.current_index, 1);
        assert_eq!(state.title, "main.feature");
        assert!(!state.has_next);
        assert!(state.has_previous);

        assert!(controller.play_previous_video());
        assert_eq!(controller.state().title, "intro");
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_playlist_start_index_is_clamped() {
        let controller: VideoPlayerController<LoopbackEngine> =
            VideoPlayerController::new(SyncConfig::default());

        controller.set_playlist(videos(2), 5);
        let state = controller.state();
        assert_eq!(state.current_index, 1);
        assert_eq!(state.title, "clip1");
        assert!(state.has_previous);

        controller.set_playlist(Vec::new(), 3);
        let state = controller.state();
        assert_eq!(state.current_index, 0);
        assert!(state.title.is_empty());
        assert!(!state.has_next);
        assert!(!state.has_previous);
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_end_advances_to_next() {
        let engine = Arc::new(LoopbackEngine::new().with_item_duration(Some(1_000)));
        let mut controller = video_controller(&engine).await;
        controller.set_playlist(videos(2), 0);
        controller.play_video_at_index(0);

        engine.advance(1_000);
        sleep(Duration::from_millis(1)).await;

        assert_eq!(controller.state().current_index, 1);
        assert_eq!(engine.loaded_ids(), vec!["1".to_string()]);
        assert!(engine.is_playing());

        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_ready_sets_duration() {
        let engine = Arc::new(LoopbackEngine::new());
        let controller = video_controller(&engine).await;

        engine.make_ready(90_000);
        sleep(Duration::from_millis(1)).await;

        assert_eq!(controller.state().duration_ms, 90_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_gestures_are_clamped() {
        let engine = Arc::new(LoopbackEngine::new());
        let controller = video_controller(&engine).await;

        controller.update_brightness(20.0);
        assert_close(controller.state().brightness, 0.7);
        controller.update_brightness(100.0);
        assert_close(controller.state().brightness, 1.0);
        controller.update_brightness(-500.0);
        assert_close(controller.state().brightness, 0.0);

        controller.update_volume(-30.0);
        assert_close(controller.state().volume, 0.7);
        assert_close(engine.volume(), 0.7);
        controller.update_volume(50.0);
        assert_close(controller.state().volume, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_orientation() {
        let controller: VideoPlayerController<LoopbackEngine> =
            VideoPlayerController::new(SyncConfig::default());

        controller.toggle_orientation();
        assert!(controller.state().is_landscape);
        controller.toggle_orientation();
        assert!(!controller.state().is_landscape);
        controller.set_orientation(true);
        assert!(controller.state().is_landscape);
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_without_engine() {
        let controller: VideoPlayerController<LoopbackEngine> =
            VideoPlayerController::new(SyncConfig::default());
        controller.set_playlist(videos(2), 0);

        assert!(matches!(
            controller.toggle_play_pause(),
            Err(PlaybackError::NoEngine)
        ));
        assert!(matches!(
            controller.seek_forward(),
            Err(PlaybackError::NoEngine)
        ));
        assert!(controller.play_next_video());
        assert_eq!(controller.state().current_index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_toggle_play_pause() {
        let engine = Arc::new(LoopbackEngine::new());
        let controller = video_controller(&engine).await;

        controller.toggle_play_pause().unwrap();
        assert!(controller.state().is_playing);
        controller.toggle_play_pause().unwrap();
        assert!(!controller.state().is_playing);
        controller.set_playback_speed(1.5).unwrap();

        assert_eq!(
            engine.calls(),
            vec![EngineCall::Play, EngineCall::Pause, EngineCall::SetSpeed(1.5)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_engine_swap_stops_previous_loop() {
        let first = Arc::new(LoopbackEngine::new());
        let second = Arc::new(LoopbackEngine::new());
        let mut controller = video_controller(&first).await;

        let previous = controller.set_engine(Arc::clone(&second)).await;

        assert!(previous.is_some_and(|previous| Arc::ptr_eq(&previous, &first)));
        assert_eq!(Arc::strong_count(&first), 1);
        assert!(!first.is_released());

        first.set_position_ms(9_999);
        second.set_position_ms(1_234);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(controller.state().position_ms, 1_234);

        let taken = controller.take_engine().await;
        assert!(taken.is_some());
        assert!(!controller.is_syncing());
        assert!(!second.is_released());
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_shutdown_releases_engine() {
        let engine = Arc::new(LoopbackEngine::new());
        let mut controller = video_controller(&engine).await;
        assert!(controller.is_syncing());

        controller.shutdown().await;

        assert!(engine.is_released());
        assert!(!controller.is_syncing());
        assert!(controller.engine().is_none());
        assert_eq!(Arc::strong_count(&engine), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_music_load_tracks() {
        let engine = Arc::new(LoopbackEngine::new());
        let mut controller = MusicPlayerController::new(Arc::clone(&engine), &SyncConfig::default());

        controller.load_tracks(tracks(3)).unwrap();

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::SetMediaItems(vec!["0".into(), "1".into(), "2".into()]),
                EngineCall::Prepare,
            ]
        );
        let state = controller.state();
        assert_eq!(state.playlist.len(), 3);
        assert_eq!(state.current_track, Some(track(0)));
        assert_eq!(state.title, "Track 0");
        assert!(state.has_next);
        assert!(!state.has_previous);

        sleep(Duration::from_millis(1)).await;
        assert_eq!(controller.state().duration_ms, 60_000);

        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_music_empty_playlist() {
        let engine = Arc::new(LoopbackEngine::new());
        let controller = MusicPlayerController::new(Arc::clone(&engine), &SyncConfig::default());

        let result = controller.load_tracks(Vec::new());

        assert!(matches!(result, Err(PlaybackError::EmptyPlaylist)));
        assert!(engine.calls().is_empty());
        assert!(controller.state().playlist.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_music_tick_republishes_engine_state() {
        let engine = Arc::new(LoopbackEngine::new());
        let controller = MusicPlayerController::new(Arc::clone(&engine), &SyncConfig::default());

        engine.set_position_ms(5_000);
        engine.set_playing(true);
        sleep(Duration::from_millis(500)).await;
        assert_eq!(controller.state().position_ms, 5_000);
        assert!(controller.state().is_playing);

        engine.set_position_ms(6_000);
        engine.set_playing(false);
        sleep(Duration::from_millis(400)).await;
        assert_eq!(controller.state().position_ms, 5_000);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(controller.state().position_ms, 6_000);
        assert!(!controller.state().is_playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_music_skip_boundaries() {
        let engine = Arc::new(LoopbackEngine::new());
        let controller = MusicPlayerController::new(Arc::clone(&engine), &SyncConfig::default());
        controller.load_tracks(tracks(2)).unwrap();
        engine.clear_calls();

        assert!(!controller.skip_to_previous());
        assert!(engine.calls().is_empty());

        assert!(controller.skip_to_next());
        assert_eq!(controller.state().current_track, Some(track(1)));
        assert_eq!(engine.calls(), vec![EngineCall::SeekToNext]);

        engine.clear_calls();
        assert!(!controller.skip_to_next());
        assert!(engine.calls().is_empty());
        assert_eq!(controller.state().current_index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_music_play_track() {
        let engine = Arc::new(LoopbackEngine::new());
        let controller = MusicPlayerController::new(Arc::clone(&engine), &SyncConfig::default());
        controller.load_tracks(tracks(3)).unwrap();
        engine.clear_calls();

        assert!(!controller.play_track(3));
        assert!(engine.calls().is_empty());

        assert!(controller.play_track(2));
        assert_eq!(
            engine.calls(),
            vec![EngineCall::SeekToItem(2), EngineCall::Play]
        );
        let state = controller.state();
        assert_eq!(state.current_index, 2);
        assert!(engine.is_playing());
        assert!(!state.has_next);
    }

    #[tokio::test(start_paused = true)]
    async fn test_music_seek_clamps() {
        let engine = Arc::new(LoopbackEngine::new());
        let controller = MusicPlayerController::new(Arc::clone(&engine), &SyncConfig::default());
        controller.load_tracks(tracks(1)).unwrap();

        engine.set_position_ms(55_000);
        controller.seek_forward();
        assert_eq!(engine.calls().last(), Some(&EngineCall::SeekTo(60_000)));

        engine.set_position_ms(3_000);
        controller.seek_backward();
        assert_eq!(engine.calls().last(), Some(&EngineCall::SeekTo(0)));
        assert_eq!(controller.state().position_ms, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_music_follows_engine_transitions() {
        let engine = Arc::new(LoopbackEngine::new().with_item_duration(Some(1_000)));
        let controller = MusicPlayerController::new(Arc::clone(&engine), &SyncConfig::default());
        controller.load_tracks(tracks(2)).unwrap();
        controller.play_pause();

        engine.advance(1_000);
        sleep(Duration::from_millis(1)).await;

        assert_eq!(controller.state().current_track, Some(track(1)));
        assert_eq!(controller.state().current_index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_music_stop_and_shutdown() {
        let engine = Arc::new(LoopbackEngine::new());
        let mut controller =
            MusicPlayerController::new(Arc::clone(&engine), &SyncConfig::default());
        controller.load_tracks(tracks(1)).unwrap();
        controller.play_pause();
        engine.set_position_ms(12_000);

        controller.stop();
        let state = controller.state();
        assert!(!state.is_playing);
        assert_eq!(state.position_ms, 0);

        controller.shutdown().await;
        controller.shutdown().await;
        let releases = engine
            .calls()
            .into_iter()
            .filter(|call| *call == EngineCall::Release)
            .count();
        assert_eq!(releases, 1);
        assert!(engine.is_released());
    }

    #[tokio::test(start_paused = true)]
    async fn test_music_load_from_repository() {
        let source = Arc::new(MemoryTrackSource::new(tracks(2)));
        let repository = TrackRepository::new(Arc::clone(&source) as _);
        let engine = Arc::new(LoopbackEngine::new());
        let controller = MusicPlayerController::new(Arc::clone(&engine), &SyncConfig::default());

        source.set_failing(true);
        let result = controller.load_from(&repository).await;
        assert!(matches!(result, Err(PlaybackError::Library(_))));
        assert!(engine.calls().is_empty());

        source.set_failing(false);
        controller.load_from(&repository).await.unwrap();
        assert_eq!(engine.loaded_ids(), vec!["0".to_string(), "1".to_string()]);
    }
}
