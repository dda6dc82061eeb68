use super::completion::{EpisodeCompletionTracker, RetryOutcome, Rollup};
use super::dto::VoicingSummary;
use super::limiter::ConcurrencyLimiter;
use super::speech_text::{clean_for_speech, estimate_duration_ms};
use super::voice::voice_for_speaker;
use crate::domain::episode::{AudioLocation, Episode, EpisodeStatus, Segment, TtsBackend, TtsStatus};
use crate::error::AppResult;
use crate::infrastructure::repositories::{
    AsyncJobTtsRepository, AudioClip, AudioStorageRepository, EpisodeRepository, JobPoll,
    SegmentRepository, Submission, TtsProvider,
};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Work caps for a single invocation
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Phase 1: in-flight jobs polled per pass
    pub check_batch_size: i64,
    /// Phase 2 cap for the async job-queue provider
    pub async_submit_batch_size: i64,
    /// Phase 2 cap for the sync quota-limited provider
    pub sync_submit_batch_size: i64,
    pub sync_concurrency: usize,
    /// Failed segments at or above this many attempts are not requeued
    pub max_segment_attempts: i32,
    pub invocation_budget: Duration,
    pub audio_bucket: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            check_batch_size: 10,
            async_submit_batch_size: 10,
            sync_submit_batch_size: 6,
            sync_concurrency: 2,
            max_segment_attempts: 3,
            invocation_budget: Duration::from_secs(50),
            audio_bucket: "tts_audio".to_string(),
        }
    }
}

/// What one pass did to one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentOutcome {
    /// Pending, skipped for time, or another pass moved the row first
    Untouched,
    /// Job accepted and its handle recorded
    Submitted,
    /// Audio stored and the row committed as ready
    Ready,
}

/// A segment that must be marked failed by the caller
#[derive(Debug)]
struct SegmentFailure {
    reason: String,
    /// The provider had already returned audio for it
    generated: bool,
}

impl SegmentFailure {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            generated: false,
        }
    }

    fn after_audio(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            generated: true,
        }
    }
}

type SegmentResult = Result<SegmentOutcome, SegmentFailure>;

#[derive(Debug, Default, Clone, Copy)]
struct PassTally {
    processed: u32,
    submitted: u32,
    failed: u32,
}

/// Drives one episode's segments through a single bounded pass.
///
/// Holds no state between passes: every invocation reads the segment rows,
/// does a capped amount of work, writes the results back and recomputes
/// the episode status from scratch.
pub struct SegmentOrchestrator {
    segment_repo: Arc<dyn SegmentRepository>,
    episode_repo: Arc<dyn EpisodeRepository>,
    storage: Arc<dyn AudioStorageRepository>,
    settings: OrchestratorSettings,
}

impl SegmentOrchestrator {
    pub fn new(
        segment_repo: Arc<dyn SegmentRepository>,
        episode_repo: Arc<dyn EpisodeRepository>,
        storage: Arc<dyn AudioStorageRepository>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            segment_repo,
            episode_repo,
            storage,
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Run Phase 1 (poll), Phase 2 (submit) and the status rollup once
    pub async fn invoke(
        &self,
        episode: &Episode,
        backend: TtsBackend,
        provider: &TtsProvider,
    ) -> AppResult<VoicingSummary> {
        let deadline = Instant::now() + self.settings.invocation_budget;
        let mut tally = PassTally::default();

        tracing::info!(
            episode_id = %episode.id,
            backend = %backend,
            provider = provider.name(),
            "Starting voicing pass"
        );

        if let TtsProvider::AsyncJob(client) = provider {
            self.poll_in_flight(episode, client, deadline, &mut tally)
                .await?;
        }

        if Instant::now() < deadline {
            self.submit_queued(episode, backend, provider, deadline, &mut tally)
                .await?;
        } else {
            tracing::warn!(
                episode_id = %episode.id,
                "Invocation budget spent during polling, skipping submission"
            );
        }

        let (status, more_work) = self.roll_up(episode).await?;

        tracing::info!(
            episode_id = %episode.id,
            processed = tally.processed,
            submitted = tally.submitted,
            failed = tally.failed,
            status = %status,
            more_work,
            "Voicing pass finished"
        );

        Ok(VoicingSummary {
            episode_id: episode.id,
            processed: tally.processed,
            submitted: tally.submitted,
            failed: tally.failed,
            status,
            more_work,
        })
    }

    /// Phase 1: one non-blocking status check per in-flight job
    async fn poll_in_flight(
        &self,
        episode: &Episode,
        client: &Arc<dyn AsyncJobTtsRepository>,
        deadline: Instant,
        tally: &mut PassTally,
    ) -> AppResult<()> {
        let in_flight = self
            .segment_repo
            .find_by_status(episode.id, TtsStatus::Generating, self.settings.check_batch_size)
            .await?;

        if in_flight.is_empty() {
            return Ok(());
        }

        tracing::debug!(
            episode_id = %episode.id,
            count = in_flight.len(),
            "Polling in-flight jobs"
        );

        let results = join_all(
            in_flight
                .iter()
                .map(|segment| self.collect_job(client.as_ref(), segment, deadline)),
        )
        .await;

        for (segment, result) in in_flight.iter().zip(results) {
            match result {
                Ok(SegmentOutcome::Ready) => tally.processed += 1,
                Ok(_) => {}
                Err(failure) => {
                    if self
                        .fail_segment(segment, TtsStatus::Generating, &failure.reason)
                        .await
                    {
                        tally.failed += 1;
                    }
                }
            }
        }

        Ok(())
    }

    async fn collect_job(
        &self,
        client: &dyn AsyncJobTtsRepository,
        segment: &Segment,
        deadline: Instant,
    ) -> SegmentResult {
        if Instant::now() >= deadline {
            tracing::debug!(
                segment_id = %segment.id,
                seq = segment.seq,
                "Invocation budget spent, leaving job unpolled"
            );
            return Ok(SegmentOutcome::Untouched);
        }

        let handle = segment
            .job_handle()
            .ok_or_else(|| SegmentFailure::new("generating without a job handle"))?;

        match client.poll_once(&handle).await {
            JobPoll::Pending => Ok(SegmentOutcome::Untouched),
            JobPoll::Failed(reason) => {
                tracing::warn!(
                    segment_id = %segment.id,
                    seq = segment.seq,
                    job_id = %handle,
                    reason = %reason,
                    "TTS job failed"
                );
                Err(SegmentFailure::new(reason))
            }
            JobPoll::Completed(clip) => {
                let text = clean_for_speech(&segment.text);
                self.store_and_commit(segment, TtsStatus::Generating, clip, &text)
                    .await
            }
        }
    }

    /// Phase 2: hand queued segments to the provider
    async fn submit_queued(
        &self,
        episode: &Episode,
        backend: TtsBackend,
        provider: &TtsProvider,
        deadline: Instant,
        tally: &mut PassTally,
    ) -> AppResult<()> {
        let batch_size = if provider.is_async() {
            self.settings.async_submit_batch_size
        } else {
            self.settings.sync_submit_batch_size
        };

        let queued = self
            .segment_repo
            .find_by_status(episode.id, TtsStatus::Queued, batch_size)
            .await?;

        if queued.is_empty() {
            return Ok(());
        }

        tracing::debug!(
            episode_id = %episode.id,
            count = queued.len(),
            provider = provider.name(),
            "Submitting queued segments"
        );

        let results = match provider {
            // Submission is cheap and the provider queues, so fan out fully
            TtsProvider::AsyncJob(_) => {
                join_all(queued.iter().map(|segment| {
                    self.voice_segment(episode, backend, provider, segment, deadline)
                }))
                .await
            }
            TtsProvider::SyncQuota(_) => {
                let limiter = ConcurrencyLimiter::new(self.settings.sync_concurrency);
                limiter
                    .run(queued.clone(), |segment: Segment| async move {
                        self.voice_segment(episode, backend, provider, &segment, deadline)
                            .await
                    })
                    .await
            }
        };

        for (segment, result) in queued.iter().zip(results) {
            match result {
                Ok(SegmentOutcome::Submitted) => tally.submitted += 1,
                Ok(SegmentOutcome::Ready) => {
                    tally.submitted += 1;
                    tally.processed += 1;
                }
                Ok(SegmentOutcome::Untouched) => {}
                Err(failure) => {
                    let marked = self
                        .fail_segment(segment, TtsStatus::Queued, &failure.reason)
                        .await;
                    if marked && failure.generated {
                        tally.submitted += 1;
                    }
                    if marked {
                        tally.failed += 1;
                    }
                }
            }
        }

        Ok(())
    }

    async fn voice_segment(
        &self,
        episode: &Episode,
        backend: TtsBackend,
        provider: &TtsProvider,
        segment: &Segment,
        deadline: Instant,
    ) -> SegmentResult {
        if Instant::now() >= deadline {
            tracing::debug!(
                segment_id = %segment.id,
                seq = segment.seq,
                "Invocation budget spent, leaving segment queued"
            );
            return Ok(SegmentOutcome::Untouched);
        }

        let text = clean_for_speech(&segment.text);
        if text.is_empty() {
            return Err(SegmentFailure::new("segment has no speakable text"));
        }

        let voice = voice_for_speaker(backend, &segment.speaker, &episode.language);

        let submission = provider
            .submit_or_generate(segment, &text, &voice)
            .await
            .map_err(|e| {
                tracing::warn!(
                    segment_id = %segment.id,
                    seq = segment.seq,
                    provider = provider.name(),
                    error = %e,
                    "TTS provider rejected segment"
                );
                SegmentFailure::new(e.to_string())
            })?;

        match submission {
            Submission::Job(handle) => {
                match self.segment_repo.mark_generating(segment.id, &handle).await {
                    Ok(true) => {
                        tracing::info!(
                            segment_id = %segment.id,
                            seq = segment.seq,
                            job_id = %handle,
                            "TTS job submitted"
                        );
                        Ok(SegmentOutcome::Submitted)
                    }
                    Ok(false) => {
                        tracing::warn!(
                            segment_id = %segment.id,
                            job_id = %handle,
                            "Segment left queued before its job was recorded, dropping handle"
                        );
                        Ok(SegmentOutcome::Untouched)
                    }
                    Err(e) => Err(SegmentFailure::new(format!(
                        "failed to record job handle: {}",
                        e
                    ))),
                }
            }
            Submission::Audio(clip) => {
                self.store_and_commit(segment, TtsStatus::Queued, clip, &text)
                    .await
            }
        }
    }

    /// Upload first, then flip the row to ready
    async fn store_and_commit(
        &self,
        segment: &Segment,
        from: TtsStatus,
        clip: AudioClip,
        text: &str,
    ) -> SegmentResult {
        let location = AudioLocation::for_segment(&self.settings.audio_bucket, segment, clip.extension);
        let duration_ms = clip
            .duration_ms
            .unwrap_or_else(|| estimate_duration_ms(text));

        self.storage
            .upload(&location.bucket, &location.path, clip.bytes, &clip.content_type)
            .await
            .map_err(|e| {
                tracing::error!(
                    segment_id = %segment.id,
                    seq = segment.seq,
                    path = %location.path,
                    error = %e,
                    "Audio upload failed"
                );
                SegmentFailure::after_audio(e.to_string())
            })?;

        match self
            .segment_repo
            .mark_ready(segment.id, from, &location, duration_ms)
            .await
        {
            Ok(true) => {
                tracing::info!(
                    segment_id = %segment.id,
                    seq = segment.seq,
                    path = %location.path,
                    duration_ms,
                    "Segment ready"
                );
                Ok(SegmentOutcome::Ready)
            }
            Ok(false) => {
                tracing::warn!(
                    segment_id = %segment.id,
                    from = %from,
                    "Segment moved by another pass before it could be marked ready"
                );
                Ok(SegmentOutcome::Untouched)
            }
            Err(e) => Err(SegmentFailure::after_audio(format!(
                "failed to commit segment: {}",
                e
            ))),
        }
    }

    /// Returns whether this pass actually moved the row to failed
    async fn fail_segment(&self, segment: &Segment, from: TtsStatus, reason: &str) -> bool {
        match self.segment_repo.mark_failed(segment.id, from, reason).await {
            Ok(true) => {
                tracing::warn!(
                    segment_id = %segment.id,
                    seq = segment.seq,
                    reason,
                    "Segment failed"
                );
                true
            }
            Ok(false) => {
                tracing::warn!(
                    segment_id = %segment.id,
                    from = %from,
                    "Segment moved by another pass before it could be marked failed"
                );
                false
            }
            Err(e) => {
                tracing::error!(
                    segment_id = %segment.id,
                    error = %e,
                    "Failed to mark segment failed"
                );
                false
            }
        }
    }

    async fn roll_up(&self, episode: &Episode) -> AppResult<(EpisodeStatus, bool)> {
        let statuses = self.segment_repo.list_statuses(episode.id).await?;
        let counts = EpisodeCompletionTracker::tally(&statuses);
        let rollup = EpisodeCompletionTracker::assess(&counts);

        let retry = if rollup == Rollup::NeedsRetry {
            let requeued = self
                .segment_repo
                .requeue_failed(episode.id, self.settings.max_segment_attempts)
                .await?;
            let outcome = EpisodeCompletionTracker::after_reset(requeued);
            if let RetryOutcome::Requeued(count) = outcome {
                tracing::info!(
                    episode_id = %episode.id,
                    requeued = count,
                    "Requeued failed segments for another attempt"
                );
            }
            Some(outcome)
        } else {
            None
        };

        tracing::debug!(
            episode_id = %episode.id,
            ready = counts.ready,
            queued = counts.queued,
            generating = counts.generating,
            failed = counts.failed,
            rollup = ?rollup,
            "Segment status rollup"
        );

        let status = match EpisodeCompletionTracker::target_status(rollup, retry) {
            Some(target) if target != episode.status => {
                let error = (target == EpisodeStatus::Failed)
                    .then(|| format!("{} segments failed to generate", counts.failed));
                self.episode_repo
                    .update_status(episode.id, target, error.as_deref())
                    .await?;
                tracing::info!(
                    episode_id = %episode.id,
                    from = %episode.status,
                    to = %target,
                    "Episode status changed"
                );
                target
            }
            Some(target) => target,
            None => episode.status,
        };

        Ok((status, EpisodeCompletionTracker::more_work(rollup, retry)))
    }
}
