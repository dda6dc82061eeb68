use crate::domain::episode::{AudioLocation, JobHandle, NewSegment, Segment, TtsStatus};
use crate::error::AppResult;
use crate::infrastructure::db::DbPool;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Durable segment rows.
///
/// Transitions are compare-and-set on the current status and report whether
/// the row actually moved, so two overlapping passes over the same episode
/// cannot both commit the same transition. Leaving `generating` always
/// clears the job handle; leaving `queued` counts one attempt.
#[async_trait]
pub trait SegmentRepository: Send + Sync {
    async fn list_by_episode(&self, episode_id: Uuid) -> AppResult<Vec<Segment>>;

    /// Up to `limit` segments in `status`, lowest sequence first
    async fn find_by_status(
        &self,
        episode_id: Uuid,
        status: TtsStatus,
        limit: i64,
    ) -> AppResult<Vec<Segment>>;

    async fn list_statuses(&self, episode_id: Uuid) -> AppResult<Vec<TtsStatus>>;

    async fn last_seq(&self, episode_id: Uuid) -> AppResult<Option<i32>>;

    /// Insert queued segments with consecutive sequence numbers from `first_seq`
    async fn insert_batch(
        &self,
        episode_id: Uuid,
        user_id: Uuid,
        first_seq: i32,
        segments: &[NewSegment],
    ) -> AppResult<Vec<Segment>>;

    /// queued -> generating with the provider's handle
    async fn mark_generating(&self, segment_id: Uuid, handle: &JobHandle) -> AppResult<bool>;

    /// `from` -> ready. Call only after the audio is durably stored.
    async fn mark_ready(
        &self,
        segment_id: Uuid,
        from: TtsStatus,
        location: &AudioLocation,
        duration_ms: i32,
    ) -> AppResult<bool>;

    /// `from` -> failed
    async fn mark_failed(&self, segment_id: Uuid, from: TtsStatus, reason: &str)
        -> AppResult<bool>;

    /// failed -> queued for segments with attempts left; returns how many moved
    async fn requeue_failed(&self, episode_id: Uuid, max_attempts: i32) -> AppResult<u64>;
}

const SEGMENT_COLUMNS: &str = "id, episode_id, user_id, seq, speaker, text, tts_status, job_id, \
     audio_bucket, audio_path, duration_ms, attempts, error";

pub struct PgSegmentRepository {
    pool: Arc<DbPool>,
}

impl PgSegmentRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SegmentRepository for PgSegmentRepository {
    async fn list_by_episode(&self, episode_id: Uuid) -> AppResult<Vec<Segment>> {
        let pool = self.pool.as_ref();
        let segments = sqlx::query_as::<_, Segment>(&format!(
            "SELECT {} FROM podcast_segments WHERE episode_id = $1 ORDER BY seq ASC",
            SEGMENT_COLUMNS
        ))
        .bind(episode_id)
        .fetch_all(pool)
        .await?;

        Ok(segments)
    }

    async fn find_by_status(
        &self,
        episode_id: Uuid,
        status: TtsStatus,
        limit: i64,
    ) -> AppResult<Vec<Segment>> {
        let pool = self.pool.as_ref();
        let segments = sqlx::query_as::<_, Segment>(&format!(
            "SELECT {} FROM podcast_segments \
             WHERE episode_id = $1 AND tts_status = $2 \
             ORDER BY seq ASC LIMIT $3",
            SEGMENT_COLUMNS
        ))
        .bind(episode_id)
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(segments)
    }

    async fn list_statuses(&self, episode_id: Uuid) -> AppResult<Vec<TtsStatus>> {
        let pool = self.pool.as_ref();
        let statuses = sqlx::query_scalar::<_, TtsStatus>(
            "SELECT tts_status FROM podcast_segments WHERE episode_id = $1",
        )
        .bind(episode_id)
        .fetch_all(pool)
        .await?;

        Ok(statuses)
    }

    async fn last_seq(&self, episode_id: Uuid) -> AppResult<Option<i32>> {
        let pool = self.pool.as_ref();
        let seq = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT MAX(seq) FROM podcast_segments WHERE episode_id = $1",
        )
        .bind(episode_id)
        .fetch_one(pool)
        .await?;

        Ok(seq)
    }

    async fn insert_batch(
        &self,
        episode_id: Uuid,
        user_id: Uuid,
        first_seq: i32,
        segments: &[NewSegment],
    ) -> AppResult<Vec<Segment>> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(segments.len());

        for (offset, segment) in segments.iter().enumerate() {
            let seq = first_seq + offset as i32;
            let row = sqlx::query_as::<_, Segment>(&format!(
                "INSERT INTO podcast_segments \
                     (id, episode_id, user_id, seq, speaker, text, tts_status, attempts) \
                 VALUES ($1, $2, $3, $4, $5, $6, 'queued', 0) \
                 RETURNING {}",
                SEGMENT_COLUMNS
            ))
            .bind(Uuid::new_v4())
            .bind(episode_id)
            .bind(user_id)
            .bind(seq)
            .bind(&segment.speaker)
            .bind(&segment.text)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(row);
        }

        tx.commit().await?;

        Ok(inserted)
    }

    async fn mark_generating(&self, segment_id: Uuid, handle: &JobHandle) -> AppResult<bool> {
        let pool = self.pool.as_ref();
        let result = sqlx::query(
            r#"
            UPDATE podcast_segments
            SET tts_status = 'generating', job_id = $2, error = NULL,
                attempts = attempts + 1, updated_at = NOW()
            WHERE id = $1 AND tts_status = 'queued'
            "#,
        )
        .bind(segment_id)
        .bind(handle.as_str())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_ready(
        &self,
        segment_id: Uuid,
        from: TtsStatus,
        location: &AudioLocation,
        duration_ms: i32,
    ) -> AppResult<bool> {
        let pool = self.pool.as_ref();
        let result = sqlx::query(
            r#"
            UPDATE podcast_segments
            SET tts_status = 'ready', job_id = NULL, error = NULL,
                audio_bucket = $3, audio_path = $4, duration_ms = $5,
                attempts = attempts + CASE WHEN tts_status = 'queued' THEN 1 ELSE 0 END,
                updated_at = NOW()
            WHERE id = $1 AND tts_status = $2
            "#,
        )
        .bind(segment_id)
        .bind(from.as_str())
        .bind(&location.bucket)
        .bind(&location.path)
        .bind(duration_ms)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(
        &self,
        segment_id: Uuid,
        from: TtsStatus,
        reason: &str,
    ) -> AppResult<bool> {
        let pool = self.pool.as_ref();
        let result = sqlx::query(
            r#"
            UPDATE podcast_segments
            SET tts_status = 'failed', job_id = NULL, error = $3,
                attempts = attempts + CASE WHEN tts_status = 'queued' THEN 1 ELSE 0 END,
                updated_at = NOW()
            WHERE id = $1 AND tts_status = $2
            "#,
        )
        .bind(segment_id)
        .bind(from.as_str())
        .bind(reason)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn requeue_failed(&self, episode_id: Uuid, max_attempts: i32) -> AppResult<u64> {
        let pool = self.pool.as_ref();
        let result = sqlx::query(
            r#"
            UPDATE podcast_segments
            SET tts_status = 'queued', job_id = NULL, updated_at = NOW()
            WHERE episode_id = $1 AND tts_status = 'failed' AND attempts < $2
            "#,
        )
        .bind(episode_id)
        .bind(max_attempts)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
