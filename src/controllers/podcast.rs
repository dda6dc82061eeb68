use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::voicing::{
    AppendSegmentsRequest, AppendSegmentsResponse, EpisodeDetailResponse, GenerateAudioRequest,
    VoicingSummary,
};
use crate::{
    domain::{
        auth::Caller,
        voicing::{VoicingService, VoicingServiceApi},
    },
    error::AppResult,
    infrastructure::auth::RequestId,
};

pub struct PodcastController {
    voicing_service: Arc<VoicingService>,
}

impl PodcastController {
    pub fn new(voicing_service: Arc<VoicingService>) -> Self {
        Self { voicing_service }
    }

    /// POST /api/podcasts/generate-audio - Run one generation pass
    pub async fn generate_audio(
        State(controller): State<Arc<PodcastController>>,
        Extension(caller): Extension<Caller>,
        Extension(request_id): Extension<RequestId>,
        Json(request): Json<GenerateAudioRequest>,
    ) -> AppResult<Json<VoicingSummary>> {
        tracing::info!(
            request_id = %request_id.0,
            episode_id = %request.episode_id,
            internal = caller.is_internal(),
            "Generate audio request"
        );

        let summary = controller
            .voicing_service
            .generate(&caller, request.episode_id)
            .await?;

        Ok(Json(summary))
    }

    /// GET /api/podcasts/{episodeId} - Episode with its segments
    pub async fn get_episode(
        State(controller): State<Arc<PodcastController>>,
        Extension(caller): Extension<Caller>,
        Path(episode_id): Path<Uuid>,
    ) -> AppResult<Json<EpisodeDetailResponse>> {
        let episode = controller
            .voicing_service
            .get_episode(&caller, episode_id)
            .await?;
        Ok(Json(episode))
    }

    /// POST /api/podcasts/{episodeId}/segments - Append segments to the script
    pub async fn append_segments(
        State(controller): State<Arc<PodcastController>>,
        Extension(caller): Extension<Caller>,
        Extension(request_id): Extension<RequestId>,
        Path(episode_id): Path<Uuid>,
        Json(request): Json<AppendSegmentsRequest>,
    ) -> AppResult<(StatusCode, Json<AppendSegmentsResponse>)> {
        tracing::info!(
            request_id = %request_id.0,
            episode_id = %episode_id,
            count = request.segments.len(),
            "Append segments request"
        );

        let response = controller
            .voicing_service
            .append_segments(&caller, episode_id, request.segments)
            .await?;

        Ok((StatusCode::CREATED, Json(response)))
    }
}
