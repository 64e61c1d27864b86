//! Process entry point: loads configuration, wires the recording pipeline
//! together, and serves the HTTP control surface (spec §6).

use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use twitch_recorder::api::routes::router;
use twitch_recorder::api::AppState;
use twitch_recorder::config::Config;
use twitch_recorder::database::repositories::{SqliteStreamerRepository, StreamerRepository};
use twitch_recorder::database::{init_pool, run_migrations};
use twitch_recorder::housekeeping::{self, HousekeepingConfig};
use twitch_recorder::logging::init_logging;
use twitch_recorder::platform::{PlatformProvider, TwitchProvider};
use twitch_recorder::recorder::{Concatenator, RecordingJobConfig};
use twitch_recorder::recovery::recover;
use twitch_recorder::scheduler::Scheduler;
use twitch_recorder::state::State;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    let _log_guard = init_logging("logs", &config.logger_level)?;

    info!(port = config.port, "starting twitch-recorder");

    let pool = init_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let media_path = PathBuf::from(&config.media_path);
    let temp_path = PathBuf::from(&config.temp_path);
    tokio::fs::create_dir_all(&media_path).await?;
    tokio::fs::create_dir_all(&temp_path).await?;

    let concatenator = Concatenator::new(&config.ffmpeg_path, &config.video_codec, &config.audio_codec, &config.file_format);
    recover(&temp_path, &media_path, &concatenator).await?;

    let repository: Arc<dyn StreamerRepository> = Arc::new(SqliteStreamerRepository::new(pool));
    let provider: Arc<dyn PlatformProvider> = Arc::new(TwitchProvider::new()?);
    let recording_state = Arc::new(State::new());

    let job_config = RecordingJobConfig {
        media_path: media_path.clone(),
        temp_path: temp_path.clone(),
        ffmpeg_path: config.ffmpeg_path.clone(),
        video_codec: config.video_codec.clone(),
        audio_codec: config.audio_codec.clone(),
        file_format: config.file_format.clone(),
        buffer_size_bytes: config.buffer_size_bytes(),
    };

    let scheduler = Arc::new(Scheduler::new(
        repository.clone(),
        provider.clone(),
        recording_state.clone(),
        job_config,
        config.time_check,
    ));
    tokio::spawn(scheduler.run());

    if config.auto_clean_media_path {
        let housekeeping_cfg = HousekeepingConfig {
            media_path: media_path.clone(),
            max_age: std::time::Duration::from_secs(config.time_auto_clean_media_path * 86_400),
            interval: std::time::Duration::from_secs(3_600),
        };
        tokio::spawn(housekeeping::run(housekeeping_cfg));
    }

    let app_state = AppState::new(repository, recording_state);

    let app = router()
        .with_state(app_state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
