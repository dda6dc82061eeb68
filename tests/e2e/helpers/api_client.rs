use anyhow::Result;
use http_body_util::{BodyExt, Full};
use hyper::{body::Bytes, Method, Request, Response, StatusCode};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// HTTP client for the podcast API served by a `TestContext`
#[derive(Clone)]
pub struct TestClient {
    base_url: String,
    client: Client<HttpConnector, Full<Bytes>>,
}

/// One outgoing request; headers are optional
struct Call<'a> {
    method: Method,
    path: &'a str,
    body: Option<Value>,
    token: Option<&'a str>,
    request_id: Option<&'a str>,
}

impl TestClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.send(Call::new(Method::GET, path)).await
    }

    pub async fn get_with_request_id(&self, path: &str, request_id: &str) -> Result<ApiResponse> {
        self.send(Call::new(Method::GET, path).request_id(request_id))
            .await
    }

    pub async fn get_with_auth(&self, path: &str, token: &str) -> Result<ApiResponse> {
        self.send(Call::new(Method::GET, path).token(token)).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.send(Call::new(Method::POST, path).body(body.clone()))
            .await
    }

    pub async fn post_with_auth(&self, path: &str, body: &Value, token: &str) -> Result<ApiResponse> {
        self.send(Call::new(Method::POST, path).body(body.clone()).token(token))
            .await
    }

    /// POST /api/podcasts/generate-audio
    pub async fn generate_audio(&self, episode_id: Uuid, token: &str) -> Result<ApiResponse> {
        self.post_with_auth(
            "/api/podcasts/generate-audio",
            &json!({ "episode_id": episode_id }),
            token,
        )
        .await
    }

    /// GET /api/podcasts/:episodeId
    pub async fn get_episode(&self, episode_id: Uuid, token: &str) -> Result<ApiResponse> {
        self.get_with_auth(&format!("/api/podcasts/{}", episode_id), token)
            .await
    }

    /// POST /api/podcasts/:episodeId/segments with `(speaker, text)` pairs
    pub async fn append_segments(
        &self,
        episode_id: Uuid,
        segments: &[(&str, &str)],
        token: &str,
    ) -> Result<ApiResponse> {
        let segments: Vec<Value> = segments
            .iter()
            .map(|(speaker, text)| json!({ "speaker": speaker, "text": text }))
            .collect();
        self.post_with_auth(
            &format!("/api/podcasts/{}/segments", episode_id),
            &json!({ "segments": segments }),
            token,
        )
        .await
    }

    async fn send(&self, call: Call<'_>) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, call.path);
        let mut builder = Request::builder().method(call.method).uri(&url);

        if let Some(token) = call.token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(request_id) = call.request_id {
            builder = builder.header("x-request-id", request_id);
        }

        let body = match call.body {
            Some(body) => {
                builder = builder.header("Content-Type", "application/json");
                Full::new(Bytes::from(serde_json::to_vec(&body)?))
            }
            None => Full::new(Bytes::new()),
        };

        let response = self.client.request(builder.body(body)?).await?;
        ApiResponse::from_response(response).await
    }
}

impl<'a> Call<'a> {
    fn new(method: Method, path: &'a str) -> Self {
        Self {
            method,
            path,
            body: None,
            token: None,
            request_id: None,
        }
    }

    fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    fn token(mut self, token: &'a str) -> Self {
        self.token = Some(token);
        self
    }

    fn request_id(mut self, request_id: &'a str) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Option<Value>,
    pub body_bytes: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl ApiResponse {
    async fn from_response(response: Response<hyper::body::Incoming>) -> Result<Self> {
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        let body_bytes = response.into_body().collect().await?.to_bytes().to_vec();
        let body = serde_json::from_slice(&body_bytes).ok();

        Ok(Self {
            status,
            body,
            body_bytes,
            headers,
        })
    }

    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "Expected status {} but got {}. Body: {:?}",
            expected, self.status, self.body
        );
        self
    }

    /// Error bodies are `{ "message": ... }`
    pub fn assert_error_message(&self, expected_message: &str) -> &Self {
        let message = self
            .body
            .as_ref()
            .and_then(|b| b.get("message"))
            .and_then(|m| m.as_str())
            .expect("Missing message field in error response");

        assert!(
            message.contains(expected_message),
            "Expected error message to contain '{}', but got '{}'",
            expected_message,
            message
        );
        self
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body_bytes)?)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn assert_header_exists(&self, name: &str) -> &Self {
        assert!(self.header(name).is_some(), "Header '{}' not found", name);
        self
    }
}
