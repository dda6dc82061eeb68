use crate::domain::episode::TtsBackend;
use crate::infrastructure::config::Config;
use crate::infrastructure::db::{check_connection, DbPool};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

/// What the readiness probe needs to know
pub struct HealthState {
    pool: Arc<DbPool>,
    default_backend: TtsBackend,
    runpod_configured: bool,
    gemini_configured: bool,
}

impl HealthState {
    pub fn new(pool: Arc<DbPool>, config: &Config) -> Self {
        Self {
            pool,
            default_backend: config.tts_backend,
            runpod_configured: config.runpod_api_key.is_some(),
            gemini_configured: config.gemini_api_key.is_some(),
        }
    }

    fn backend_configured(&self, backend: TtsBackend) -> bool {
        match backend {
            TtsBackend::RunPod => self.runpod_configured,
            TtsBackend::Gemini => self.gemini_configured,
        }
    }
}

fn configured_label(configured: bool) -> &'static str {
    if configured {
        "configured"
    } else {
        "not_configured"
    }
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Ready when the database answers and the default backend has credentials
pub async fn health_ready(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let database_ok = match check_connection(&state.pool).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check: database unreachable");
            false
        }
    };
    let default_ok = state.backend_configured(state.default_backend);

    let (status, label) = if database_ok && default_ok {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };
    let database = if database_ok { "connected" } else { "disconnected" };

    (
        status,
        Json(json!({
            "status": label,
            "database": database,
            "tts": {
                "default_backend": state.default_backend.as_str(),
                "runpod": configured_label(state.runpod_configured),
                "gemini": configured_label(state.gemini_configured),
            }
        })),
    )
}
