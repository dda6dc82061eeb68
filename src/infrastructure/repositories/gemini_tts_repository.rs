use super::retry::{retry_with_backoff, RetryPolicy};
use super::tts_repository::{AudioClip, SyncTtsRepository, TtsProviderError};
use crate::domain::voicing::VoiceParams;
use crate::infrastructure::audio::{pcm_duration_ms, wrap_pcm_as_wav, PcmFormat};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_modalities: [&'a str; 1],
    speech_config: SpeechConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig<'a> {
    voice_config: VoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
    prebuilt_voice_config: PrebuiltVoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig<'a> {
    voice_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: Option<String>,
    data: String,
}

/// Gemini speech generation: one blocking call returns raw PCM, which is
/// framed as WAV before it leaves this client
pub struct GeminiTtsRepository {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    retry_policy: RetryPolicy,
}

impl GeminiTtsRepository {
    pub fn new(
        base_url: String,
        model: String,
        api_key: String,
        retry_policy: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            retry_policy,
        })
    }

    /// One request, no retries
    async fn call_gemini(&self, text: &str, voice: &VoiceParams) -> Result<AudioClip, TtsProviderError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![TextPart { text }],
            }],
            generation_config: GenerationConfig {
                response_modalities: ["AUDIO"],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: &voice.voice,
                        },
                    },
                },
            },
        };

        let response = self
            .http
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| TtsProviderError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_error(status, body));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| TtsProviderError::InvalidResponse(e.to_string()))?;

        clip_from_response(body)
    }
}

#[async_trait]
impl SyncTtsRepository for GeminiTtsRepository {
    async fn generate(&self, text: &str, voice: &VoiceParams) -> Result<AudioClip, TtsProviderError> {
        let start_time = std::time::Instant::now();

        let clip = retry_with_backoff(&self.retry_policy, "gemini_generate", |attempt| {
            tracing::debug!(
                model = %self.model,
                voice = %voice.voice,
                attempt,
                text_length = text.len(),
                "Calling Gemini TTS API"
            );
            self.call_gemini(text, voice)
        })
        .await?;

        tracing::info!(
            model = %self.model,
            audio_size = clip.bytes.len(),
            duration_ms = clip.duration_ms,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Gemini TTS audio generated"
        );

        Ok(clip)
    }
}

fn classify_http_error(status: StatusCode, body: String) -> TtsProviderError {
    let message = format!("{}: {}", status, body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => TtsProviderError::RateLimited(message),
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => TtsProviderError::Unavailable(message),
        _ => TtsProviderError::Rejected(message),
    }
}

fn clip_from_response(body: GenerateContentResponse) -> Result<AudioClip, TtsProviderError> {
    let inline = body
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .find_map(|part| part.inline_data)
        .ok_or_else(|| TtsProviderError::InvalidResponse("response contains no audio".to_string()))?;

    let pcm = STANDARD
        .decode(inline.data.as_bytes())
        .map_err(|e| TtsProviderError::InvalidResponse(format!("undecodable audio: {}", e)))?;
    if pcm.is_empty() {
        return Err(TtsProviderError::InvalidResponse("empty audio".to_string()));
    }

    let format = inline
        .mime_type
        .as_deref()
        .map(|mime| PcmFormat::from_mime(mime, PcmFormat::GEMINI_SPEECH))
        .unwrap_or(PcmFormat::GEMINI_SPEECH);

    let wav = wrap_pcm_as_wav(&pcm, format)
        .map_err(|e| TtsProviderError::InvalidResponse(e.to_string()))?;

    Ok(AudioClip::from_mime(
        wav,
        Some("audio/wav"),
        Some(pcm_duration_ms(pcm.len(), format)),
    ))
}
