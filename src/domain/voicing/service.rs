use super::dto::{AppendSegmentsResponse, EpisodeDetailResponse, VoicingSummary};
use super::error::VoicingServiceError;
use super::orchestrator::{OrchestratorSettings, SegmentOrchestrator};
use super::source_hash::SourceHasher;
use super::voice::{COHOST_SPEAKER, HOST_SPEAKER};
use crate::domain::auth::Caller;
use crate::domain::episode::{Episode, EpisodeStatus, NewSegment, TtsBackend};
use crate::infrastructure::repositories::{
    AudioStorageRepository, EpisodeRepository, SegmentRepository, TtsProvider, TtsProviders,
};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Appended segments start this far past the current last sequence number
const JOIN_IN_SEQ_OFFSET: i32 = 1000;

pub struct VoicingService {
    episode_repo: Arc<dyn EpisodeRepository>,
    segment_repo: Arc<dyn SegmentRepository>,
    providers: TtsProviders,
    default_backend: TtsBackend,
    orchestrator: SegmentOrchestrator,
}

impl VoicingService {
    pub fn new(
        episode_repo: Arc<dyn EpisodeRepository>,
        segment_repo: Arc<dyn SegmentRepository>,
        storage: Arc<dyn AudioStorageRepository>,
        providers: TtsProviders,
        default_backend: TtsBackend,
        settings: OrchestratorSettings,
    ) -> Self {
        let orchestrator = SegmentOrchestrator::new(
            segment_repo.clone(),
            episode_repo.clone(),
            storage,
            settings,
        );

        Self {
            episode_repo,
            segment_repo,
            providers,
            default_backend,
            orchestrator,
        }
    }
}

#[async_trait]
pub trait VoicingServiceApi: Send + Sync {
    /// Run one bounded generation pass over an episode
    ///
    /// This operation:
    /// - Checks the caller may voice the episode in its current state
    /// - Resolves (and pins) the episode's TTS backend
    /// - Refuses to spend provider quota if the script changed since it was finalized
    /// - Polls in-flight jobs, submits queued segments and rolls up the episode status
    async fn generate(
        &self,
        caller: &Caller,
        episode_id: Uuid,
    ) -> Result<VoicingSummary, VoicingServiceError>;

    async fn get_episode(
        &self,
        caller: &Caller,
        episode_id: Uuid,
    ) -> Result<EpisodeDetailResponse, VoicingServiceError>;

    /// Append queued segments after the existing script (join-in)
    async fn append_segments(
        &self,
        caller: &Caller,
        episode_id: Uuid,
        segments: Vec<NewSegment>,
    ) -> Result<AppendSegmentsResponse, VoicingServiceError>;
}

#[async_trait]
impl VoicingServiceApi for VoicingService {
    async fn generate(
        &self,
        caller: &Caller,
        episode_id: Uuid,
    ) -> Result<VoicingSummary, VoicingServiceError> {
        let episode = self.find_accessible(caller, episode_id).await?;

        match episode.status {
            EpisodeStatus::Voicing => {}
            EpisodeStatus::Ready if caller.is_internal() => {}
            status => {
                return Err(VoicingServiceError::InvalidState(format!(
                    "Episode is {}, expected voicing",
                    status
                )))
            }
        }

        let (backend, provider) = self.resolve_provider(&episode).await?;

        self.guard_script(&episode).await?;

        self.orchestrator
            .invoke(&episode, backend, &provider)
            .await
            .map_err(|e| VoicingServiceError::Dependency(e.to_string()))
    }

    async fn get_episode(
        &self,
        caller: &Caller,
        episode_id: Uuid,
    ) -> Result<EpisodeDetailResponse, VoicingServiceError> {
        let episode = self.find_accessible(caller, episode_id).await?;
        let segments = self
            .segment_repo
            .list_by_episode(episode.id)
            .await
            .map_err(|e| VoicingServiceError::Dependency(e.to_string()))?;

        Ok(EpisodeDetailResponse::new(episode, segments))
    }

    async fn append_segments(
        &self,
        caller: &Caller,
        episode_id: Uuid,
        segments: Vec<NewSegment>,
    ) -> Result<AppendSegmentsResponse, VoicingServiceError> {
        validate_new_segments(&segments)?;

        let episode = self.find_accessible(caller, episode_id).await?;
        if !matches!(
            episode.status,
            EpisodeStatus::Voicing | EpisodeStatus::Ready
        ) {
            return Err(VoicingServiceError::InvalidState(format!(
                "Cannot append segments to a {} episode",
                episode.status
            )));
        }

        let last_seq = self
            .segment_repo
            .last_seq(episode.id)
            .await
            .map_err(|e| VoicingServiceError::Dependency(e.to_string()))?;
        let first_seq = last_seq
            .unwrap_or(0)
            .checked_add(JOIN_IN_SEQ_OFFSET)
            .ok_or_else(|| {
                VoicingServiceError::InvalidState("Segment sequence space exhausted".to_string())
            })?;

        let inserted = self
            .segment_repo
            .insert_batch(episode.id, episode.user_id, first_seq, &segments)
            .await
            .map_err(|e| VoicingServiceError::Dependency(e.to_string()))?;

        let all_segments = self
            .segment_repo
            .list_by_episode(episode.id)
            .await
            .map_err(|e| VoicingServiceError::Dependency(e.to_string()))?;
        let total_segments = i32::try_from(all_segments.len()).unwrap_or(i32::MAX);
        let script_hash = SourceHasher::hash_script(&all_segments);

        self.episode_repo
            .record_script(episode.id, total_segments, &script_hash)
            .await
            .map_err(|e| VoicingServiceError::Dependency(e.to_string()))?;

        if episode.status == EpisodeStatus::Ready {
            self.episode_repo
                .update_status(episode.id, EpisodeStatus::Voicing, None)
                .await
                .map_err(|e| VoicingServiceError::Dependency(e.to_string()))?;
        }

        tracing::info!(
            episode_id = %episode.id,
            appended = inserted.len(),
            first_seq,
            total_segments,
            "Segments appended"
        );

        Ok(AppendSegmentsResponse {
            episode_id: episode.id,
            appended: inserted.len(),
            first_seq,
            total_segments,
        })
    }
}

impl VoicingService {
    /// Missing episodes and episodes owned by someone else look the same
    async fn find_accessible(
        &self,
        caller: &Caller,
        episode_id: Uuid,
    ) -> Result<Episode, VoicingServiceError> {
        let episode = self
            .episode_repo
            .find_by_id(episode_id)
            .await
            .map_err(|e| VoicingServiceError::Dependency(e.to_string()))?
            .ok_or(VoicingServiceError::NotFound)?;

        if !caller.can_access(episode.user_id) {
            tracing::warn!(
                episode_id = %episode_id,
                caller = ?caller,
                "Episode access denied"
            );
            return Err(VoicingServiceError::NotFound);
        }

        Ok(episode)
    }

    /// Resolve before pinning so a misconfigured backend never touches the row
    async fn resolve_provider(
        &self,
        episode: &Episode,
    ) -> Result<(TtsBackend, TtsProvider), VoicingServiceError> {
        let requested = episode.tts_backend.unwrap_or(self.default_backend);
        if !self.providers.is_configured(requested) {
            return Err(not_configured(requested));
        }

        let backend = match episode.tts_backend {
            Some(pinned) => pinned,
            None => self
                .episode_repo
                .pin_backend(episode.id, requested)
                .await
                .map_err(|e| VoicingServiceError::Dependency(e.to_string()))?,
        };

        if backend != requested {
            tracing::info!(
                episode_id = %episode.id,
                backend = %backend,
                "Episode already pinned to another backend"
            );
        }

        let provider = self
            .providers
            .resolve(backend)
            .ok_or_else(|| not_configured(backend))?;

        Ok((backend, provider))
    }

    async fn guard_script(&self, episode: &Episode) -> Result<(), VoicingServiceError> {
        // An "empty" fingerprint was recorded before there was a script to protect
        let Some(expected) = episode
            .script_hash
            .as_deref()
            .filter(|hash| SourceHasher::is_cacheable(hash))
        else {
            return Ok(());
        };

        let segments = self
            .segment_repo
            .list_by_episode(episode.id)
            .await
            .map_err(|e| VoicingServiceError::Dependency(e.to_string()))?;
        let actual = SourceHasher::hash_script(&segments);

        if actual != expected {
            tracing::warn!(
                episode_id = %episode.id,
                expected = %expected,
                actual = %actual,
                "Script changed since it was finalized"
            );
            return Err(VoicingServiceError::Conflict(
                "Episode script changed since it was finalized".to_string(),
            ));
        }

        Ok(())
    }
}

fn not_configured(backend: TtsBackend) -> VoicingServiceError {
    tracing::error!(backend = %backend, "TTS backend has no credentials configured");
    VoicingServiceError::Configuration(format!("{} TTS backend is not configured", backend))
}

fn validate_new_segments(segments: &[NewSegment]) -> Result<(), VoicingServiceError> {
    if segments.is_empty() {
        return Err(VoicingServiceError::InvalidState(
            "At least one segment is required".to_string(),
        ));
    }

    if let Some(position) = segments
        .iter()
        .position(|s| s.speaker.trim().is_empty() || s.text.trim().is_empty())
    {
        return Err(VoicingServiceError::InvalidState(format!(
            "Segment {} needs both a speaker and text",
            position
        )));
    }

    if let Some((position, segment)) = segments
        .iter()
        .enumerate()
        .find(|(_, s)| s.speaker != HOST_SPEAKER && s.speaker != COHOST_SPEAKER)
    {
        return Err(VoicingServiceError::InvalidState(format!(
            "Segment {} has unknown speaker '{}', expected '{}' or '{}'",
            position, segment.speaker, HOST_SPEAKER, COHOST_SPEAKER
        )));
    }

    Ok(())
}
