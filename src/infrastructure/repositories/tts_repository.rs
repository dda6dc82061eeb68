use crate::domain::episode::{JobHandle, Segment, TtsBackend};
use crate::domain::voicing::VoiceParams;
use async_trait::async_trait;
use std::sync::Arc;

/// Encoded audio ready to be written to blob storage
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub extension: &'static str,
    /// Playback length when the provider (or the framing step) knows it
    pub duration_ms: Option<i32>,
}

impl AudioClip {
    /// Build a clip from a provider mime type, defaulting to MP3
    pub fn from_mime(bytes: Vec<u8>, mime: Option<&str>, duration_ms: Option<i32>) -> Self {
        let content_type = mime.unwrap_or("audio/mpeg").to_string();
        let extension = match content_type.as_str() {
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/ogg" => "ogg",
            "audio/flac" => "flac",
            _ => "mp3",
        };
        Self {
            bytes,
            content_type,
            extension,
            duration_ms,
        }
    }
}

/// Result of a single, non-blocking status check on an async job
#[derive(Debug, Clone, PartialEq)]
pub enum JobPoll {
    /// Still queued or running, or the check itself hit a transient error
    Pending,
    Completed(AudioClip),
    Failed(String),
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum TtsProviderError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl TtsProviderError {
    /// Explicit rate-limit and transient-unavailable signals may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TtsProviderError::RateLimited(_) | TtsProviderError::Unavailable(_)
        )
    }
}

/// Job-queue provider: submission is fire-and-forget, completion is
/// observed by polling on later invocations.
#[async_trait]
pub trait AsyncJobTtsRepository: Send + Sync {
    /// Enqueue a synthesis job and return its handle without waiting
    async fn submit(&self, text: &str, voice: &VoiceParams) -> Result<JobHandle, TtsProviderError>;

    /// One status check. Never loops, never sleeps.
    async fn poll_once(&self, handle: &JobHandle) -> JobPoll;
}

/// Single-call provider with a request quota.
///
/// Implementations retry retryable failures internally up to a fixed
/// ceiling; concurrency across segments is bounded by the caller.
#[async_trait]
pub trait SyncTtsRepository: Send + Sync {
    async fn generate(&self, text: &str, voice: &VoiceParams) -> Result<AudioClip, TtsProviderError>;
}

/// What a provider hands back for one segment
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Job(JobHandle),
    Audio(AudioClip),
}

/// The provider selected for one episode. Exactly one variant is used for
/// the whole life of an episode.
#[derive(Clone)]
pub enum TtsProvider {
    AsyncJob(Arc<dyn AsyncJobTtsRepository>),
    SyncQuota(Arc<dyn SyncTtsRepository>),
}

impl TtsProvider {
    pub fn name(&self) -> &'static str {
        match self {
            TtsProvider::AsyncJob(_) => "async_job",
            TtsProvider::SyncQuota(_) => "sync_quota",
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self, TtsProvider::AsyncJob(_))
    }

    /// Submit (async provider) or synthesize (sync provider) one segment
    pub async fn submit_or_generate(
        &self,
        segment: &Segment,
        text: &str,
        voice: &VoiceParams,
    ) -> Result<Submission, TtsProviderError> {
        tracing::debug!(
            provider = self.name(),
            seq = segment.seq,
            speaker = %segment.speaker,
            text_length = text.len(),
            "Handing segment to TTS provider"
        );

        match self {
            TtsProvider::AsyncJob(client) => client.submit(text, voice).await.map(Submission::Job),
            TtsProvider::SyncQuota(client) => {
                client.generate(text, voice).await.map(Submission::Audio)
            }
        }
    }
}

/// Provider clients available to this process, keyed by backend
#[derive(Clone, Default)]
pub struct TtsProviders {
    runpod: Option<Arc<dyn AsyncJobTtsRepository>>,
    gemini: Option<Arc<dyn SyncTtsRepository>>,
}

impl TtsProviders {
    pub fn new(
        runpod: Option<Arc<dyn AsyncJobTtsRepository>>,
        gemini: Option<Arc<dyn SyncTtsRepository>>,
    ) -> Self {
        Self { runpod, gemini }
    }

    /// Returns `None` when the backend has no credentials configured
    pub fn resolve(&self, backend: TtsBackend) -> Option<TtsProvider> {
        match backend {
            TtsBackend::RunPod => self.runpod.clone().map(TtsProvider::AsyncJob),
            TtsBackend::Gemini => self.gemini.clone().map(TtsProvider::SyncQuota),
        }
    }

    pub fn is_configured(&self, backend: TtsBackend) -> bool {
        match backend {
            TtsBackend::RunPod => self.runpod.is_some(),
            TtsBackend::Gemini => self.gemini.is_some(),
        }
    }
}
