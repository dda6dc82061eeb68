use crate::domain::episode::TtsBackend;
use crate::domain::voicing::OrchestratorSettings;
use crate::infrastructure::repositories::RetryPolicy;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub internal_service_token: Option<String>,
    pub environment: Environment,
    pub log_format: LogFormat,
    // TTS providers
    pub tts_backend: TtsBackend,
    pub runpod_api_key: Option<String>,
    pub runpod_endpoint_id: String,
    pub runpod_base_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_tts_model: String,
    pub gemini_base_url: String,
    pub provider_timeout_secs: u64,
    // Blob storage
    pub storage_url: String,
    pub storage_service_key: String,
    pub audio_bucket: String,
    // Orchestrator limits
    pub check_batch_size: i64,
    pub async_submit_batch_size: i64,
    pub sync_submit_batch_size: i64,
    pub sync_concurrency: usize,
    pub sync_max_attempts: u32,
    pub sync_base_delay_ms: u64,
    pub sync_max_delay_ms: u64,
    pub max_segment_attempts: i32,
    pub invocation_budget_secs: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let config = Config {
            database_url: env::var("DATABASE_URL")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or("PORT", 8080)?,
            jwt_secret: env::var("JWT_SECRET")?,
            internal_service_token: optional("INTERNAL_SERVICE_TOKEN"),
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .parse::<String>()
                .map(|s| match s.as_str() {
                    "production" => Environment::Production,
                    _ => Environment::Development,
                })?,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .parse::<String>()
                .map(|s| match s.as_str() {
                    "json" => LogFormat::Json,
                    _ => LogFormat::Pretty,
                })?,
            tts_backend: env::var("TTS_BACKEND")
                .unwrap_or_else(|_| "runpod".to_string())
                .parse::<TtsBackend>()?,
            runpod_api_key: optional("RUNPOD_API_KEY"),
            runpod_endpoint_id: env::var("RUNPOD_ENDPOINT_ID").unwrap_or_default(),
            runpod_base_url: env::var("RUNPOD_BASE_URL")
                .unwrap_or_else(|_| "https://api.runpod.ai/v2".to_string()),
            gemini_api_key: optional("GEMINI_API_KEY"),
            gemini_tts_model: env::var("GEMINI_TTS_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash-preview-tts".to_string()),
            gemini_base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta".to_string()
            }),
            provider_timeout_secs: parse_or("PROVIDER_TIMEOUT_SECS", 30)?,
            storage_url: env::var("STORAGE_URL")?,
            storage_service_key: env::var("STORAGE_SERVICE_KEY")?,
            audio_bucket: env::var("AUDIO_BUCKET").unwrap_or_else(|_| "tts_audio".to_string()),
            check_batch_size: batch_size("CHECK_BATCH_SIZE", 10)?,
            async_submit_batch_size: batch_size("ASYNC_SUBMIT_BATCH_SIZE", 10)?,
            sync_submit_batch_size: batch_size("SYNC_SUBMIT_BATCH_SIZE", 6)?,
            sync_concurrency: parse_or("SYNC_CONCURRENCY", 2)?,
            sync_max_attempts: parse_or("SYNC_MAX_ATTEMPTS", 3)?,
            sync_base_delay_ms: parse_or("SYNC_BASE_DELAY_MS", 1000)?,
            sync_max_delay_ms: parse_or("SYNC_MAX_DELAY_MS", 8000)?,
            max_segment_attempts: parse_or("MAX_SEGMENT_ATTEMPTS", 3)?,
            invocation_budget_secs: parse_or("INVOCATION_BUDGET_SECS", 50)?,
        };

        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    /// Log filter used when `RUST_LOG` is unset
    pub fn default_log_filter(&self) -> &'static str {
        if self.is_development() {
            "podcast_voicing_backend=debug,tower_http=debug"
        } else {
            "podcast_voicing_backend=info,tower_http=info"
        }
    }

    /// Backoff for the sync provider's per-segment retries
    pub fn sync_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.sync_max_attempts,
            Duration::from_millis(self.sync_base_delay_ms),
            Duration::from_millis(self.sync_max_delay_ms),
        )
    }

    /// Per-invocation work caps handed to the orchestrator
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            check_batch_size: self.check_batch_size,
            async_submit_batch_size: self.async_submit_batch_size,
            sync_submit_batch_size: self.sync_submit_batch_size,
            sync_concurrency: self.sync_concurrency,
            max_segment_attempts: self.max_segment_attempts,
            invocation_budget: Duration::from_secs(self.invocation_budget_secs),
            audio_bucket: self.audio_bucket.clone(),
        }
    }
}

/// Unset and blank values are both treated as absent
fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::error::Error + 'static,
{
    match env::var(key) {
        Ok(raw) => Ok(raw.trim().parse::<T>()?),
        Err(_) => Ok(default),
    }
}

/// Batch caps feed straight into `LIMIT`, so they must be at least one
fn batch_size(key: &str, default: i64) -> Result<i64, Box<dyn std::error::Error>> {
    let value = parse_or(key, default)?;
    if value < 1 {
        return Err(format!("{} must be at least 1, got {}", key, value).into());
    }
    Ok(value)
}
