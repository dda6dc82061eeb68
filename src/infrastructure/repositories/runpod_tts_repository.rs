use super::tts_repository::{AsyncJobTtsRepository, AudioClip, JobPoll, TtsProviderError};
use crate::domain::episode::JobHandle;
use crate::domain::voicing::VoiceParams;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    input: RunInput<'a>,
}

#[derive(Debug, Serialize)]
struct RunInput<'a> {
    text: &'a str,
    format: &'a str,
    speed: f32,
    voice: &'a str,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    output: Option<JobOutput>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobOutput {
    audio_base64: Option<String>,
    mimetype: Option<String>,
    duration_ms: Option<f64>,
}

/// RunPod serverless endpoint: `/run` enqueues, `/status/{id}` reports
pub struct RunPodTtsRepository {
    http: reqwest::Client,
    endpoint_url: String,
    api_key: String,
}

impl RunPodTtsRepository {
    pub fn new(
        base_url: String,
        endpoint_id: String,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint_url: format!("{}/{}", base_url.trim_end_matches('/'), endpoint_id),
            api_key,
        })
    }
}

#[async_trait]
impl AsyncJobTtsRepository for RunPodTtsRepository {
    async fn submit(&self, text: &str, voice: &VoiceParams) -> Result<JobHandle, TtsProviderError> {
        let request = RunRequest {
            input: RunInput {
                text,
                format: "mp3",
                speed: voice.speed,
                voice: &voice.voice,
                language: &voice.language,
            },
        };

        let response = self
            .http
            .post(format!("{}/run", self.endpoint_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "RunPod submit request failed");
                TtsProviderError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "RunPod submit rejected");
            return Err(classify_http_error(status, body));
        }

        let run: RunResponse = response
            .json()
            .await
            .map_err(|e| TtsProviderError::InvalidResponse(e.to_string()))?;

        tracing::debug!(job_id = %run.id, text_length = text.len(), "RunPod job submitted");

        Ok(JobHandle(run.id))
    }

    async fn poll_once(&self, handle: &JobHandle) -> JobPoll {
        let response = match self
            .http
            .get(format!(
                "{}/status/{}",
                self.endpoint_url,
                urlencoding::encode(handle.as_str())
            ))
            .bearer_auth(&self.api_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(job_id = %handle, error = %e, "RunPod status check failed, will retry");
                return JobPoll::Pending;
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let poll = interpret_status(status, &body);

        tracing::debug!(
            job_id = %handle,
            http_status = status.as_u16(),
            outcome = poll_label(&poll),
            "RunPod job polled"
        );

        poll
    }
}

fn classify_http_error(status: StatusCode, body: String) -> TtsProviderError {
    let message = format!("{}: {}", status, body);
    if status == StatusCode::TOO_MANY_REQUESTS {
        TtsProviderError::RateLimited(message)
    } else if status.is_server_error() {
        TtsProviderError::Unavailable(message)
    } else {
        TtsProviderError::Rejected(message)
    }
}

/// Map one status response onto the poll contract. Transient trouble
/// (throttling, 5xx, garbled bodies) stays pending; only the provider's own
/// verdict or an unknown job is terminal.
fn interpret_status(status: StatusCode, body: &str) -> JobPoll {
    if status == StatusCode::NOT_FOUND {
        return JobPoll::Failed("job not found".to_string());
    }
    if !status.is_success() {
        return JobPoll::Pending;
    }

    let parsed: StatusResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable RunPod status body");
            return JobPoll::Pending;
        }
    };

    match parsed.status.as_str() {
        "COMPLETED" => completed_clip(parsed.output),
        "FAILED" | "CANCELLED" | "TIMED_OUT" => JobPoll::Failed(
            parsed
                .error
                .unwrap_or_else(|| format!("job {}", parsed.status.to_lowercase())),
        ),
        _ => JobPoll::Pending,
    }
}

fn completed_clip(output: Option<JobOutput>) -> JobPoll {
    let Some(output) = output else {
        return JobPoll::Failed("job completed without output".to_string());
    };
    let Some(encoded) = output.audio_base64.filter(|audio| !audio.is_empty()) else {
        return JobPoll::Failed("job completed without audio".to_string());
    };

    match STANDARD.decode(encoded.as_bytes()) {
        Ok(bytes) => JobPoll::Completed(AudioClip::from_mime(
            bytes,
            output.mimetype.as_deref(),
            output.duration_ms.map(|ms| ms.round() as i32),
        )),
        Err(e) => JobPoll::Failed(format!("undecodable audio: {}", e)),
    }
}

fn poll_label(poll: &JobPoll) -> &'static str {
    match poll {
        JobPoll::Pending => "pending",
        JobPoll::Completed(_) => "completed",
        JobPoll::Failed(_) => "failed",
    }
}
