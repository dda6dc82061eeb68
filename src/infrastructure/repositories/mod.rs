pub mod audio_storage_repository;
pub mod episode_repository;
pub mod gemini_tts_repository;
pub mod retry;
pub mod runpod_tts_repository;
pub mod segment_repository;
pub mod tts_repository;

pub use audio_storage_repository::{AudioStorageRepository, StorageError, SupabaseStorageRepository};
pub use episode_repository::{EpisodeRepository, PgEpisodeRepository};
pub use gemini_tts_repository::GeminiTtsRepository;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use runpod_tts_repository::RunPodTtsRepository;
pub use segment_repository::{PgSegmentRepository, SegmentRepository};
pub use tts_repository::{
    AsyncJobTtsRepository, AudioClip, JobPoll, Submission, SyncTtsRepository, TtsProvider,
    TtsProviderError, TtsProviders,
};
