use crate::domain::episode::TtsBackend;
use serde::{Deserialize, Serialize};

/// Provider-facing voice settings for one segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceParams {
    pub voice: String,
    pub speed: f32,
    pub language: String,
}

/// Host speaker, also the fallback for unknown speaker ids
pub const HOST_SPEAKER: &str = "a";
pub const COHOST_SPEAKER: &str = "b";

/// Resolve a speaker id to voice settings for the given backend.
///
/// RunPod clones from reference recordings baked into the worker image;
/// Gemini uses prebuilt voice names.
pub fn voice_for_speaker(backend: TtsBackend, speaker: &str, language: &str) -> VoiceParams {
    let speaker = match speaker {
        HOST_SPEAKER | COHOST_SPEAKER => speaker,
        other => {
            tracing::warn!(speaker = other, "Unknown speaker, using host voice");
            HOST_SPEAKER
        }
    };

    let (voice, speed) = match (backend, speaker) {
        (TtsBackend::RunPod, COHOST_SPEAKER) => ("/app/runpod/male_en.flac", 1.05),
        (TtsBackend::RunPod, _) => ("/app/runpod/host_voice.flac", 1.0),
        (TtsBackend::Gemini, COHOST_SPEAKER) => ("Puck", 1.0),
        (TtsBackend::Gemini, _) => ("Kore", 1.0),
    };

    VoiceParams {
        voice: voice.to_string(),
        speed,
        language: language.to_string(),
    }
}
