use crate::e2e::helpers;

use helpers::PgTestDatabase;
use podcast_voicing_backend::domain::episode::{
    AudioLocation, EpisodeStatus, JobHandle, NewSegment, TtsBackend, TtsStatus,
};
use podcast_voicing_backend::infrastructure::repositories::{
    EpisodeRepository, PgEpisodeRepository, PgSegmentRepository, SegmentRepository,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use uuid::Uuid;

fn new_segments(lines: &[(&str, &str)]) -> Vec<NewSegment> {
    lines
        .iter()
        .map(|(speaker, text)| NewSegment {
            speaker: speaker.to_string(),
            text: text.to_string(),
        })
        .collect()
}

fn repositories(db: &PgTestDatabase) -> (PgEpisodeRepository, PgSegmentRepository) {
    let pool = Arc::new(db.pool.clone());
    (
        PgEpisodeRepository::new(pool.clone()),
        PgSegmentRepository::new(pool),
    )
}

#[tokio::test]
#[ignore = "requires docker"]
async fn it_should_insert_segments_and_read_them_in_order() {
    let db = PgTestDatabase::lease().await;
    let (_, segments) = repositories(&db);
    let user_id = Uuid::new_v4();
    let episode = db
        .fixtures
        .create_episode(user_id, EpisodeStatus::Voicing, None)
        .await
        .unwrap();

    segments
        .insert_batch(
            episode.id,
            user_id,
            1001,
            &new_segments(&[("b", "Late one."), ("a", "Late two.")]),
        )
        .await
        .unwrap();
    let inserted = segments
        .insert_batch(
            episode.id,
            user_id,
            1,
            &new_segments(&[("a", "First."), ("b", "Second.")]),
        )
        .await
        .unwrap();

    assert_eq!(inserted.len(), 2);
    assert!(inserted
        .iter()
        .all(|s| s.tts_status == TtsStatus::Queued && s.attempts == 0));

    let listed: Vec<i32> = segments
        .list_by_episode(episode.id)
        .await
        .unwrap()
        .iter()
        .map(|s| s.seq)
        .collect();
    assert_eq!(listed, vec![1, 2, 1001, 1002]);
    assert_eq!(segments.last_seq(episode.id).await.unwrap(), Some(1002));

    let queued = segments
        .find_by_status(episode.id, TtsStatus::Queued, 3)
        .await
        .unwrap();
    assert_eq!(
        queued.iter().map(|s| s.seq).collect::<Vec<_>>(),
        vec![1, 2, 1001]
    );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn it_should_reject_duplicate_sequence_numbers() {
    let db = PgTestDatabase::lease().await;
    let (_, segments) = repositories(&db);
    let user_id = Uuid::new_v4();
    let episode = db
        .fixtures
        .create_episode(user_id, EpisodeStatus::Voicing, None)
        .await
        .unwrap();

    segments
        .insert_batch(episode.id, user_id, 1, &new_segments(&[("a", "One.")]))
        .await
        .unwrap();
    let duplicate = segments
        .insert_batch(episode.id, user_id, 1, &new_segments(&[("b", "Again.")]))
        .await;

    assert!(duplicate.is_err());
    assert_eq!(segments.list_by_episode(episode.id).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn it_should_only_transition_from_the_expected_status() {
    let db = PgTestDatabase::lease().await;
    let (_, segments) = repositories(&db);
    let user_id = Uuid::new_v4();
    let episode = db
        .fixtures
        .create_episode(user_id, EpisodeStatus::Voicing, None)
        .await
        .unwrap();
    let inserted = segments
        .insert_batch(episode.id, user_id, 1, &new_segments(&[("a", "Hello.")]))
        .await
        .unwrap();
    let segment_id = inserted[0].id;
    let handle = JobHandle("job-abc".to_string());

    assert!(segments.mark_generating(segment_id, &handle).await.unwrap());
    // Already generating, a second submission loses
    assert!(!segments.mark_generating(segment_id, &handle).await.unwrap());

    let location = AudioLocation {
        bucket: "tts_audio".to_string(),
        path: "podcasts/test/seg_1_a.mp3".to_string(),
    };
    // Wrong source status is a no-op
    assert!(!segments
        .mark_ready(segment_id, TtsStatus::Queued, &location, 1200)
        .await
        .unwrap());
    assert!(segments
        .mark_ready(segment_id, TtsStatus::Generating, &location, 1200)
        .await
        .unwrap());

    let segment = segments.list_by_episode(episode.id).await.unwrap().remove(0);
    assert_eq!(segment.tts_status, TtsStatus::Ready);
    assert!(segment.job_id.is_none());
    assert_eq!(segment.audio_location(), Some(location));
    assert_eq!(segment.duration_ms, Some(1200));
    assert_eq!(segment.attempts, 1);

    // Ready is terminal for the orchestrator
    assert!(!segments
        .mark_failed(segment_id, TtsStatus::Generating, "late failure")
        .await
        .unwrap());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn it_should_requeue_failed_segments_below_the_attempt_ceiling() {
    let db = PgTestDatabase::lease().await;
    let (_, segments) = repositories(&db);
    let user_id = Uuid::new_v4();
    let episode = db
        .fixtures
        .create_episode(user_id, EpisodeStatus::Voicing, None)
        .await
        .unwrap();
    let inserted = segments
        .insert_batch(
            episode.id,
            user_id,
            1,
            &new_segments(&[("a", "Retry me."), ("b", "Give up on me.")]),
        )
        .await
        .unwrap();

    let (retry_me, give_up) = (inserted[0].id, inserted[1].id);

    // Two attempts for the second segment, one for the first
    assert!(segments
        .mark_failed(give_up, TtsStatus::Queued, "provider rejected")
        .await
        .unwrap());
    assert_eq!(segments.requeue_failed(episode.id, 99).await.unwrap(), 1);
    assert!(segments
        .mark_failed(give_up, TtsStatus::Queued, "provider rejected")
        .await
        .unwrap());
    assert!(segments
        .mark_failed(retry_me, TtsStatus::Queued, "provider rejected")
        .await
        .unwrap());

    let requeued = segments.requeue_failed(episode.id, 2).await.unwrap();
    assert_eq!(requeued, 1);

    let rows = segments.list_by_episode(episode.id).await.unwrap();
    assert_eq!(rows[0].tts_status, TtsStatus::Queued);
    assert_eq!(rows[0].attempts, 1);
    assert_eq!(rows[1].tts_status, TtsStatus::Failed);
    assert_eq!(rows[1].attempts, 2);
    assert_eq!(rows[1].error.as_deref(), Some("provider rejected"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn it_should_pin_the_backend_only_once() {
    let db = PgTestDatabase::lease().await;
    let (episodes, _) = repositories(&db);
    let episode = db
        .fixtures
        .create_episode(Uuid::new_v4(), EpisodeStatus::Voicing, None)
        .await
        .unwrap();

    let first = episodes
        .pin_backend(episode.id, TtsBackend::Gemini)
        .await
        .unwrap();
    let second = episodes
        .pin_backend(episode.id, TtsBackend::RunPod)
        .await
        .unwrap();

    assert_eq!(first, TtsBackend::Gemini);
    assert_eq!(second, TtsBackend::Gemini);
    assert_eq!(
        episodes
            .find_by_id(episode.id)
            .await
            .unwrap()
            .unwrap()
            .tts_backend,
        Some(TtsBackend::Gemini)
    );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn it_should_record_status_and_script_fingerprint() {
    let db = PgTestDatabase::lease().await;
    let (episodes, _) = repositories(&db);
    let episode = db
        .fixtures
        .create_episode(Uuid::new_v4(), EpisodeStatus::Voicing, Some(TtsBackend::RunPod))
        .await
        .unwrap();

    episodes
        .update_status(episode.id, EpisodeStatus::Failed, Some("2 segments failed to generate"))
        .await
        .unwrap();
    episodes
        .record_script(episode.id, 12, "abc123")
        .await
        .unwrap();

    let row = episodes.find_by_id(episode.id).await.unwrap().unwrap();
    assert_eq!(row.status, EpisodeStatus::Failed);
    assert_eq!(row.error.as_deref(), Some("2 segments failed to generate"));
    assert_eq!(row.total_segments, 12);
    assert_eq!(row.script_hash.as_deref(), Some("abc123"));

    assert!(episodes.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn it_should_refuse_a_job_handle_outside_generating() {
    let db = PgTestDatabase::lease().await;
    let (_, segments) = repositories(&db);
    let user_id = Uuid::new_v4();
    let episode = db
        .fixtures
        .create_episode(user_id, EpisodeStatus::Voicing, None)
        .await
        .unwrap();
    let inserted = segments
        .insert_batch(episode.id, user_id, 1, &new_segments(&[("a", "Hello.")]))
        .await
        .unwrap();

    let result = sqlx::query("UPDATE podcast_segments SET job_id = 'orphan' WHERE id = $1")
        .bind(inserted[0].id)
        .execute(&db.pool)
        .await;

    assert!(result.is_err());
}
