use crate::domain::episode::{Episode, EpisodeStatus, NewSegment, Segment, TtsBackend, TtsStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request for POST /api/podcasts/generate-audio
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateAudioRequest {
    pub episode_id: Uuid,
}

/// Outcome of one generation pass.
///
/// `more_work` tells the caller to invoke again; the counts only cover
/// this pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoicingSummary {
    pub episode_id: Uuid,
    pub processed: u32,
    pub submitted: u32,
    pub failed: u32,
    pub status: EpisodeStatus,
    pub more_work: bool,
}

/// Request for POST /api/podcasts/:episode_id/segments
#[derive(Debug, Serialize, Deserialize)]
pub struct AppendSegmentsRequest {
    pub segments: Vec<NewSegment>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AppendSegmentsResponse {
    pub episode_id: Uuid,
    pub appended: usize,
    pub first_seq: i32,
    pub total_segments: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentResponse {
    pub id: Uuid,
    pub seq: i32,
    pub speaker: String,
    pub text: String,
    pub tts_status: TtsStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Segment> for SegmentResponse {
    fn from(segment: Segment) -> Self {
        Self {
            id: segment.id,
            seq: segment.seq,
            speaker: segment.speaker,
            text: segment.text,
            tts_status: segment.tts_status,
            audio_bucket: segment.audio_bucket,
            audio_path: segment.audio_path,
            duration_ms: segment.duration_ms,
            error: segment.error,
        }
    }
}

/// Response for GET /api/podcasts/:episode_id
#[derive(Debug, Serialize, Deserialize)]
pub struct EpisodeDetailResponse {
    pub id: Uuid,
    pub status: EpisodeStatus,
    pub language: String,
    pub total_segments: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_backend: Option<TtsBackend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub segments: Vec<SegmentResponse>,
}

impl EpisodeDetailResponse {
    pub fn new(episode: Episode, segments: Vec<Segment>) -> Self {
        Self {
            id: episode.id,
            status: episode.status,
            language: episode.language,
            total_segments: episode.total_segments,
            tts_backend: episode.tts_backend,
            error: episode.error,
            segments: segments.into_iter().map(SegmentResponse::from).collect(),
        }
    }
}
