use crate::domain::episode::{Episode, EpisodeStatus, TtsBackend};
use crate::error::AppResult;
use crate::infrastructure::db::DbPool;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait EpisodeRepository: Send + Sync {
    async fn find_by_id(&self, episode_id: Uuid) -> AppResult<Option<Episode>>;

    /// Overwrite the episode status; `error` is cleared unless given
    async fn update_status(
        &self,
        episode_id: Uuid,
        status: EpisodeStatus,
        error: Option<&str>,
    ) -> AppResult<()>;

    /// Pin the backend if none is recorded yet and return the one in effect
    async fn pin_backend(&self, episode_id: Uuid, backend: TtsBackend) -> AppResult<TtsBackend>;

    async fn record_script(
        &self,
        episode_id: Uuid,
        total_segments: i32,
        script_hash: &str,
    ) -> AppResult<()>;
}

pub struct PgEpisodeRepository {
    pool: Arc<DbPool>,
}

impl PgEpisodeRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EpisodeRepository for PgEpisodeRepository {
    async fn find_by_id(&self, episode_id: Uuid) -> AppResult<Option<Episode>> {
        let pool = self.pool.as_ref();
        let episode = sqlx::query_as::<_, Episode>(
            r#"
            SELECT id, user_id, status, language, total_segments, tts_backend,
                   script_hash, error, created_at, updated_at
            FROM podcast_episodes
            WHERE id = $1
            "#,
        )
        .bind(episode_id)
        .fetch_optional(pool)
        .await?;

        Ok(episode)
    }

    async fn update_status(
        &self,
        episode_id: Uuid,
        status: EpisodeStatus,
        error: Option<&str>,
    ) -> AppResult<()> {
        let pool = self.pool.as_ref();
        sqlx::query(
            r#"
            UPDATE podcast_episodes
            SET status = $2, error = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(episode_id)
        .bind(status.as_str())
        .bind(error)
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn pin_backend(&self, episode_id: Uuid, backend: TtsBackend) -> AppResult<TtsBackend> {
        let pool = self.pool.as_ref();
        let pinned = sqlx::query_scalar::<_, TtsBackend>(
            r#"
            UPDATE podcast_episodes
            SET tts_backend = COALESCE(tts_backend, $2), updated_at = NOW()
            WHERE id = $1
            RETURNING tts_backend
            "#,
        )
        .bind(episode_id)
        .bind(backend.as_str())
        .fetch_one(pool)
        .await?;

        Ok(pinned)
    }

    async fn record_script(
        &self,
        episode_id: Uuid,
        total_segments: i32,
        script_hash: &str,
    ) -> AppResult<()> {
        let pool = self.pool.as_ref();
        sqlx::query(
            r#"
            UPDATE podcast_episodes
            SET total_segments = $2, script_hash = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(episode_id)
        .bind(total_segments)
        .bind(script_hash)
        .execute(pool)
        .await?;

        Ok(())
    }
}
