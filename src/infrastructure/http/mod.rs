use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::infrastructure::config::Config;
use crate::infrastructure::db::DbPool;
use crate::{
    controllers::{
        health::{self, HealthState},
        podcast::PodcastController,
    },
    infrastructure::auth::{auth_middleware, request_id_middleware},
};

/// Assemble every route with its middleware
pub fn build_router(
    pool: Arc<DbPool>,
    config: Arc<Config>,
    podcast_controller: Arc<PodcastController>,
) -> Router {
    // Podcast routes (require authentication)
    let podcast_routes = Router::new()
        .route(
            "/api/podcasts/generate-audio",
            axum::routing::post(PodcastController::generate_audio),
        )
        .route("/api/podcasts/:episodeId", get(PodcastController::get_episode))
        .route(
            "/api/podcasts/:episodeId/segments",
            axum::routing::post(PodcastController::append_segments),
        )
        .with_state(podcast_controller)
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware));

    let health_state = Arc::new(HealthState::new(pool, &config));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::health_ready))
        .with_state(health_state)
        .merge(podcast_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server with all routes configured
pub async fn start_http_server(
    pool: Arc<DbPool>,
    config: Arc<Config>,
    podcast_controller: Arc<PodcastController>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(pool, config.clone(), podcast_controller);

    // Start server
    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
