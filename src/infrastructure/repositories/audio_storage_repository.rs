use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum StorageError {
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("storage transport error: {0}")]
    Transport(String),
}

/// Blob store for generated audio.
///
/// An `Ok` upload means the object is fully written and visible; callers
/// commit the segment row only after that.
#[async_trait]
pub trait AudioStorageRepository: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;
}

/// Supabase Storage REST implementation
pub struct SupabaseStorageRepository {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl SupabaseStorageRepository {
    pub fn new(
        base_url: String,
        service_key: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
        })
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        let encoded_path: Vec<String> = path
            .split('/')
            .map(|part| urlencoding::encode(part).into_owned())
            .collect();
        format!(
            "{}/object/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            encoded_path.join("/")
        )
    }
}

#[async_trait]
impl AudioStorageRepository for SupabaseStorageRepository {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let size = bytes.len();
        tracing::debug!(bucket, path, size, content_type, "Uploading audio");

        let response = self
            .http
            .post(self.object_url(bucket, path))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, bucket, path, "Audio upload request failed");
                StorageError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                body = %body,
                bucket,
                path,
                "Audio upload rejected"
            );
            return Err(StorageError::UploadFailed(format!("{}: {}", status, body)));
        }

        tracing::info!(bucket, path, size, "Audio uploaded");
        Ok(())
    }
}
