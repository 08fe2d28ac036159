//! Mediadeck demo
//!
//! Runs the connection and playback subsystems end to end against the
//! in-memory loopback backends: pairs and connects to a scripted headphone,
//! plays through a short video playlist, then loads and skips through a track
//! library.

use std::{error::Error, sync::Arc};

use {
    tokio::time::sleep,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use mediadeck::{
    bluetooth::{
        BondState, ConnectionService, DeviceConnector, DeviceType, Radio, RemoteDevice, ServiceId,
        loopback::{BondScript, ConnectBehavior, LoopbackEndpoint, LoopbackRadio},
    },
    config::{SettingsManager, UserSettings},
    error::ResultExt,
    library::{MemoryTrackSource, Track, TrackRepository, VideoItem},
    playback::{
        MusicPlayerController, VideoPlayerController, format_time, loopback::LoopbackEngine,
    },
};

/// Simulated playback time per video tick.
const DEMO_ADVANCE_MS: u64 = 3_000;

/// Main entry point for the demo.
///
/// Logging defaults to `info`; set `RUST_LOG` to override.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .try_init()?;

    let settings = SettingsManager::new()
        .add_context("Failed to load settings")?
        .get_settings()
        .clone();

    run_connection_demo(&settings).await?;
    run_video_demo(&settings).await;
    run_music_demo(&settings).await?;

    Ok(())
}

async fn run_connection_demo(settings: &UserSettings) -> anyhow::Result<()> {
    let headphones = RemoteDevice::new(
        "00:1A:7D:DA:71:13",
        "Studio Headphones",
        DeviceType::Headphones,
    );

    let radio = Arc::new(LoopbackRadio::new());
    radio.add_device(Arc::new(
        LoopbackEndpoint::new(&headphones.address)
            .with_bonding(BondState::None, BondScript::BondAfterReads(2))
            .with_behavior(ServiceId::AUDIO_ADVANCED, ConnectBehavior::Refuse),
    ));

    let connector = DeviceConnector::new(radio as Arc<dyn Radio>, settings.connection.clone());
    let service = ConnectionService::new(connector);

    service
        .pair_and_connect(&headphones)
        .await
        .add_contextf(format!("Failed to connect to {}", headphones.name))?;
    if let Some((service_id, strategy)) = service.connector().active_channel().await {
        info!("Connected over {service_id} ({strategy})");
    }
    if headphones.device_type.is_audio_sink() {
        info!("{} can take over audio output", headphones.name);
    }

    service
        .send_data(b"PLAY")
        .await
        .add_context("Failed to send command")?;

    service.disconnect().await;
    service.release().await;
    info!("Connection state: {:?}", *service.connection_state().borrow());
    Ok(())
}

async fn run_video_demo(settings: &UserSettings) {
    let videos = ["Opening.mp4", "Behind the scenes.mkv", "Credits.webm"]
        .iter()
        .zip(1..)
        .map(|(name, id)| VideoItem {
            id,
            name: (*name).to_string(),
            uri: format!("file:///videos/{name}"),
            duration_ms: 12_000,
            size_bytes: 0,
        })
        .collect();

    let engine = Arc::new(LoopbackEngine::new().with_item_duration(Some(12_000)));
    let mut controller = VideoPlayerController::new(settings.sync.clone());
    controller.set_engine(Arc::clone(&engine)).await;
    controller.set_playlist(videos, 0);
    controller.play_video_at_index(0);
    controller.update_volume(-20.0);

    for _ in 0..10 {
        engine.advance(DEMO_ADVANCE_MS);
        sleep(settings.sync.video_tick()).await;

        let state = controller.state();
        info!(
            "{} [{}] {} / {}",
            state.title,
            if state.is_playing { "playing" } else { "paused" },
            format_time(state.position_ms),
            format_time(state.duration_ms),
        );
    }

    controller.shutdown().await;
}

async fn run_music_demo(settings: &UserSettings) -> anyhow::Result<()> {
    let tracks = ["Blue in Green", "So What", "Freddie Freeloader"]
        .iter()
        .zip(1..)
        .map(|(title, id)| Track {
            id,
            title: (*title).to_string(),
            artist: "Miles Davis".to_string(),
            album: "Kind of Blue".to_string(),
            duration_ms: 330_000,
            uri: format!("content://media/external/audio/media/{id}"),
            album_art_uri: None,
        })
        .collect();
    let repository = TrackRepository::new(Arc::new(MemoryTrackSource::new(tracks)));

    let engine = Arc::new(LoopbackEngine::new().with_item_duration(Some(330_000)));
    let mut controller = MusicPlayerController::new(engine, &settings.sync);
    controller
        .load_from(&repository)
        .await
        .add_context("Failed to load tracks")?;

    controller.play_pause();
    controller.skip_to_next();
    controller.seek_forward();

    let state = controller.state();
    info!(
        "Now playing {} ({}/{}) at {}",
        state.title,
        state.current_index + 1,
        state.playlist.len(),
        format_time(state.position_ms),
    );

    controller.shutdown().await;
    Ok(())
}
