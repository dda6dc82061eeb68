use podcast_voicing_backend::controllers::podcast::PodcastController;
use podcast_voicing_backend::domain::voicing::VoicingService;
use podcast_voicing_backend::infrastructure::config::{Config, LogFormat};
use podcast_voicing_backend::infrastructure::db::{check_connection, create_pool, run_migrations};
use podcast_voicing_backend::infrastructure::http::start_http_server;
use podcast_voicing_backend::infrastructure::repositories::{
    AsyncJobTtsRepository, AudioStorageRepository, EpisodeRepository, GeminiTtsRepository,
    PgEpisodeRepository, PgSegmentRepository, RunPodTtsRepository,
    SegmentRepository, SupabaseStorageRepository, SyncTtsRepository, TtsProviders,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config);

    tracing::info!(
        "Starting Podcast Voicing Backend on {}:{}",
        config.host,
        config.port
    );

    // Create database connection pool
    let pool = create_pool(&config.database_url).await?;
    tracing::info!("Database connection pool created");

    // Verify database connection
    check_connection(&pool).await?;
    tracing::info!("Database connection verified");

    run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    let provider_timeout = Duration::from_secs(config.provider_timeout_secs);

    // Only backends with credentials get a client
    let runpod: Option<Arc<dyn AsyncJobTtsRepository>> = match &config.runpod_api_key {
        Some(api_key) => {
            tracing::info!(endpoint_id = %config.runpod_endpoint_id, "RunPod TTS client initialized");
            Some(Arc::new(RunPodTtsRepository::new(
                config.runpod_base_url.clone(),
                config.runpod_endpoint_id.clone(),
                api_key.clone(),
                provider_timeout,
            )?))
        }
        None => {
            tracing::warn!("RUNPOD_API_KEY not set, RunPod backend disabled");
            None
        }
    };

    let gemini: Option<Arc<dyn SyncTtsRepository>> = match &config.gemini_api_key {
        Some(api_key) => {
            tracing::info!(model = %config.gemini_tts_model, "Gemini TTS client initialized");
            Some(Arc::new(GeminiTtsRepository::new(
                config.gemini_base_url.clone(),
                config.gemini_tts_model.clone(),
                api_key.clone(),
                config.sync_retry_policy(),
                provider_timeout,
            )?))
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set, Gemini backend disabled");
            None
        }
    };

    if runpod.is_none() && gemini.is_none() {
        tracing::warn!("No TTS backend configured, generation requests will fail");
    }

    let providers = TtsProviders::new(runpod, gemini);

    let storage: Arc<dyn AudioStorageRepository> = Arc::new(SupabaseStorageRepository::new(
        config.storage_url.clone(),
        config.storage_service_key.clone(),
        provider_timeout,
    )?);

    let pool = Arc::new(pool);
    let config = Arc::new(config);

    // === DEPENDENCY INJECTION SETUP ===
    // 1. Instantiate repositories (inject db pool)
    tracing::info!("Instantiating repositories...");
    let episode_repo: Arc<dyn EpisodeRepository> = Arc::new(PgEpisodeRepository::new(pool.clone()));
    let segment_repo: Arc<dyn SegmentRepository> = Arc::new(PgSegmentRepository::new(pool.clone()));

    // 2. Instantiate services (inject repositories and clients)
    tracing::info!("Instantiating services...");
    let voicing_service = Arc::new(VoicingService::new(
        episode_repo,
        segment_repo,
        storage,
        providers,
        config.tts_backend,
        config.orchestrator_settings(),
    ));

    // 3. Instantiate controllers (inject services)
    tracing::info!("Instantiating controllers...");
    let podcast_controller = Arc::new(PodcastController::new(voicing_service));

    // Start HTTP server with all routes
    start_http_server(pool, config, podcast_controller).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| config.default_log_filter().into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| config.default_log_filter().into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
