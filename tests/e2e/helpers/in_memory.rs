use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use podcast_voicing_backend::domain::episode::{
    AudioLocation, Episode, EpisodeStatus, JobHandle, NewSegment, Segment, TtsBackend, TtsStatus,
};
use podcast_voicing_backend::error::{AppError, AppResult};
use podcast_voicing_backend::infrastructure::repositories::{EpisodeRepository, SegmentRepository};
use std::collections::HashMap;
use uuid::Uuid;

/// Episode and segment rows held in memory, with the same compare-and-set
/// semantics as the Postgres repositories
#[derive(Default)]
pub struct InMemoryStore {
    episodes: RwLock<HashMap<Uuid, Episode>>,
    segments: RwLock<Vec<Segment>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_episode(
        &self,
        user_id: Uuid,
        status: EpisodeStatus,
        backend: Option<TtsBackend>,
    ) -> Episode {
        let now = Utc::now();
        let episode = Episode {
            id: Uuid::new_v4(),
            user_id,
            status,
            language: "en".to_string(),
            total_segments: 0,
            tts_backend: backend,
            script_hash: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.episodes.write().insert(episode.id, episode.clone());
        episode
    }

    /// Queued segments with sequence numbers 1..=n; speakers alternate a/b
    pub fn seed_segments(&self, episode_id: Uuid, texts: &[&str]) -> Vec<Segment> {
        let user_id = self
            .episode(episode_id)
            .map(|e| e.user_id)
            .unwrap_or_else(Uuid::new_v4);

        let created: Vec<Segment> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| Segment {
                id: Uuid::new_v4(),
                episode_id,
                user_id,
                seq: i as i32 + 1,
                speaker: if i % 2 == 0 { "a" } else { "b" }.to_string(),
                text: text.to_string(),
                tts_status: TtsStatus::Queued,
                job_id: None,
                audio_bucket: None,
                audio_path: None,
                duration_ms: None,
                attempts: 0,
                error: None,
            })
            .collect();

        self.segments.write().extend(created.iter().cloned());
        if let Some(episode) = self.episodes.write().get_mut(&episode_id) {
            episode.total_segments += created.len() as i32;
        }
        created
    }

    /// Force a segment into a state, for test setup
    pub fn set_segment_state(&self, episode_id: Uuid, seq: i32, status: TtsStatus, attempts: i32) {
        let mut segments = self.segments.write();
        if let Some(segment) = segments
            .iter_mut()
            .find(|s| s.episode_id == episode_id && s.seq == seq)
        {
            segment.tts_status = status;
            segment.attempts = attempts;
            if status != TtsStatus::Generating {
                segment.job_id = None;
            }
            if status == TtsStatus::Ready {
                segment.audio_bucket = Some("tts_audio".to_string());
                segment.audio_path = Some(format!("podcasts/seeded/seg_{}.mp3", seq));
            }
        }
    }

    /// Put a segment in flight with the given job handle, as a submit would
    pub fn set_in_flight(&self, episode_id: Uuid, seq: i32, job_id: &str) {
        let mut segments = self.segments.write();
        if let Some(segment) = segments
            .iter_mut()
            .find(|s| s.episode_id == episode_id && s.seq == seq)
        {
            segment.tts_status = TtsStatus::Generating;
            segment.job_id = Some(job_id.to_string());
            segment.attempts = 1;
        }
    }

    pub fn set_script_hash(&self, episode_id: Uuid, hash: &str) {
        if let Some(episode) = self.episodes.write().get_mut(&episode_id) {
            episode.script_hash = Some(hash.to_string());
        }
    }

    pub fn episode(&self, episode_id: Uuid) -> Option<Episode> {
        self.episodes.read().get(&episode_id).cloned()
    }

    pub fn segments(&self, episode_id: Uuid) -> Vec<Segment> {
        let mut segments: Vec<Segment> = self
            .segments
            .read()
            .iter()
            .filter(|s| s.episode_id == episode_id)
            .cloned()
            .collect();
        segments.sort_by_key(|s| s.seq);
        segments
    }

    pub fn segment(&self, episode_id: Uuid, seq: i32) -> Segment {
        self.segments(episode_id)
            .into_iter()
            .find(|s| s.seq == seq)
            .unwrap_or_else(|| panic!("no segment {} in episode {}", seq, episode_id))
    }

    /// Apply `update` if the segment is currently in `from`
    fn transition(&self, segment_id: Uuid, from: TtsStatus, update: impl FnOnce(&mut Segment)) -> bool {
        let mut segments = self.segments.write();
        match segments
            .iter_mut()
            .find(|s| s.id == segment_id && s.tts_status == from)
        {
            Some(segment) => {
                if from == TtsStatus::Queued {
                    segment.attempts += 1;
                }
                update(segment);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl EpisodeRepository for InMemoryStore {
    async fn find_by_id(&self, episode_id: Uuid) -> AppResult<Option<Episode>> {
        Ok(self.episode(episode_id))
    }

    async fn update_status(
        &self,
        episode_id: Uuid,
        status: EpisodeStatus,
        error: Option<&str>,
    ) -> AppResult<()> {
        if let Some(episode) = self.episodes.write().get_mut(&episode_id) {
            episode.status = status;
            episode.error = error.map(str::to_string);
            episode.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn pin_backend(&self, episode_id: Uuid, backend: TtsBackend) -> AppResult<TtsBackend> {
        let mut episodes = self.episodes.write();
        let episode = episodes
            .get_mut(&episode_id)
            .ok_or_else(|| AppError::NotFound("Episode".to_string()))?;
        Ok(*episode.tts_backend.get_or_insert(backend))
    }

    async fn record_script(
        &self,
        episode_id: Uuid,
        total_segments: i32,
        script_hash: &str,
    ) -> AppResult<()> {
        if let Some(episode) = self.episodes.write().get_mut(&episode_id) {
            episode.total_segments = total_segments;
            episode.script_hash = Some(script_hash.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl SegmentRepository for InMemoryStore {
    async fn list_by_episode(&self, episode_id: Uuid) -> AppResult<Vec<Segment>> {
        Ok(self.segments(episode_id))
    }

    async fn find_by_status(
        &self,
        episode_id: Uuid,
        status: TtsStatus,
        limit: i64,
    ) -> AppResult<Vec<Segment>> {
        Ok(self
            .segments(episode_id)
            .into_iter()
            .filter(|s| s.tts_status == status)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn list_statuses(&self, episode_id: Uuid) -> AppResult<Vec<TtsStatus>> {
        Ok(self
            .segments(episode_id)
            .into_iter()
            .map(|s| s.tts_status)
            .collect())
    }

    async fn last_seq(&self, episode_id: Uuid) -> AppResult<Option<i32>> {
        Ok(self.segments(episode_id).iter().map(|s| s.seq).max())
    }

    async fn insert_batch(
        &self,
        episode_id: Uuid,
        user_id: Uuid,
        first_seq: i32,
        segments: &[NewSegment],
    ) -> AppResult<Vec<Segment>> {
        let inserted: Vec<Segment> = segments
            .iter()
            .enumerate()
            .map(|(offset, new_segment)| Segment {
                id: Uuid::new_v4(),
                episode_id,
                user_id,
                seq: first_seq + offset as i32,
                speaker: new_segment.speaker.clone(),
                text: new_segment.text.clone(),
                tts_status: TtsStatus::Queued,
                job_id: None,
                audio_bucket: None,
                audio_path: None,
                duration_ms: None,
                attempts: 0,
                error: None,
            })
            .collect();

        self.segments.write().extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn mark_generating(&self, segment_id: Uuid, handle: &JobHandle) -> AppResult<bool> {
        Ok(self.transition(segment_id, TtsStatus::Queued, |segment| {
            segment.tts_status = TtsStatus::Generating;
            segment.job_id = Some(handle.as_str().to_string());
            segment.error = None;
        }))
    }

    async fn mark_ready(
        &self,
        segment_id: Uuid,
        from: TtsStatus,
        location: &AudioLocation,
        duration_ms: i32,
    ) -> AppResult<bool> {
        Ok(self.transition(segment_id, from, |segment| {
            segment.tts_status = TtsStatus::Ready;
            segment.job_id = None;
            segment.error = None;
            segment.audio_bucket = Some(location.bucket.clone());
            segment.audio_path = Some(location.path.clone());
            segment.duration_ms = Some(duration_ms);
        }))
    }

    async fn mark_failed(
        &self,
        segment_id: Uuid,
        from: TtsStatus,
        reason: &str,
    ) -> AppResult<bool> {
        Ok(self.transition(segment_id, from, |segment| {
            segment.tts_status = TtsStatus::Failed;
            segment.job_id = None;
            segment.error = Some(reason.to_string());
        }))
    }

    async fn requeue_failed(&self, episode_id: Uuid, max_attempts: i32) -> AppResult<u64> {
        let mut segments = self.segments.write();
        let mut requeued = 0;
        for segment in segments.iter_mut().filter(|s| {
            s.episode_id == episode_id
                && s.tts_status == TtsStatus::Failed
                && s.attempts < max_attempts
        }) {
            segment.tts_status = TtsStatus::Queued;
            segment.job_id = None;
            requeued += 1;
        }
        Ok(requeued)
    }
}
