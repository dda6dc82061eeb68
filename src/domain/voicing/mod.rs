pub mod completion;
pub mod dto;
pub mod error;
pub mod limiter;
pub mod orchestrator;
pub mod service;
pub mod source_hash;
pub mod speech_text;
pub mod voice;

pub use completion::{EpisodeCompletionTracker, RetryOutcome, Rollup, SegmentStatusCounts};
pub use dto::{
    AppendSegmentsRequest, AppendSegmentsResponse, EpisodeDetailResponse, GenerateAudioRequest,
    SegmentResponse, VoicingSummary,
};
pub use error::VoicingServiceError;
pub use limiter::ConcurrencyLimiter;
pub use orchestrator::{OrchestratorSettings, SegmentOrchestrator};
pub use service::{VoicingService, VoicingServiceApi};
pub use source_hash::{SourceAsset, SourceHashInputs, SourceHasher, EMPTY_SOURCE_HASH};
pub use voice::{voice_for_speaker, VoiceParams};
