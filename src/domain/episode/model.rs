use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Episode {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: EpisodeStatus,
    pub language: String,
    pub total_segments: i32,
    /// Backend pinned on the first generation pass; never changes afterwards
    pub tts_backend: Option<TtsBackend>,
    /// Fingerprint of the finalized script, see `SourceHasher::hash_script`
    pub script_hash: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EpisodeStatus {
    Drafting,
    Voicing,
    Ready,
    Failed,
}

impl EpisodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodeStatus::Drafting => "drafting",
            EpisodeStatus::Voicing => "voicing",
            EpisodeStatus::Ready => "ready",
            EpisodeStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for EpisodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-segment text-to-speech lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TtsStatus {
    Queued,
    Generating,
    Ready,
    Failed,
}

impl TtsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtsStatus::Queued => "queued",
            TtsStatus::Generating => "generating",
            TtsStatus::Ready => "ready",
            TtsStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TtsStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which provider voices an episode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TtsBackend {
    /// Asynchronous job queue: submit, then poll on later invocations
    RunPod,
    /// Synchronous, quota-limited: one call returns the audio
    Gemini,
}

impl TtsBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtsBackend::RunPod => "runpod",
            TtsBackend::Gemini => "gemini",
        }
    }
}

impl std::fmt::Display for TtsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown TTS backend: {0}")]
pub struct UnknownBackend(pub String);

impl FromStr for TtsBackend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "runpod" => Ok(TtsBackend::RunPod),
            "gemini" => Ok(TtsBackend::Gemini),
            other => Err(UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Segment {
    pub id: Uuid,
    pub episode_id: Uuid,
    pub user_id: Uuid,
    pub seq: i32,
    pub speaker: String,
    pub text: String,
    pub tts_status: TtsStatus,
    pub job_id: Option<String>,
    pub audio_bucket: Option<String>,
    pub audio_path: Option<String>,
    pub duration_ms: Option<i32>,
    pub attempts: i32,
    pub error: Option<String>,
}

impl Segment {
    pub fn job_handle(&self) -> Option<JobHandle> {
        self.job_id.clone().map(JobHandle)
    }

    pub fn audio_location(&self) -> Option<AudioLocation> {
        match (&self.audio_bucket, &self.audio_path) {
            (Some(bucket), Some(path)) => Some(AudioLocation {
                bucket: bucket.clone(),
                path: path.clone(),
            }),
            _ => None,
        }
    }
}

/// Segment content supplied by a script producer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSegment {
    pub speaker: String,
    pub text: String,
}

/// Opaque correlation id issued by the asynchronous provider.
/// The orchestrator stores and hands it back; it never looks inside.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(pub String);

impl JobHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioLocation {
    pub bucket: String,
    pub path: String,
}

impl AudioLocation {
    /// Deterministic object key for a segment's audio, so a retried upload
    /// overwrites instead of leaking a second object.
    ///
    /// The speaker is stored text, so anything outside `[A-Za-z0-9_-]` is
    /// replaced to keep the key inside the owner's prefix.
    pub fn for_segment(bucket: &str, segment: &Segment, extension: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            path: format!(
                "podcasts/{}/{}/seg_{}_{}.{}",
                segment.user_id,
                segment.episode_id,
                segment.seq,
                key_component(&segment.speaker),
                extension
            ),
        }
    }
}

fn key_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
