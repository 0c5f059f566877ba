use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Raw byte chunks from an in-flight generation request.
///
/// Chunk boundaries are arbitrary; the relay reframes them into
/// newline-delimited records.
pub type ChunkStream = BoxStream<'static, Result<Bytes, RelayError>>;

/// One newline-delimited record of the streaming generate response.
#[derive(Debug, Deserialize)]
pub struct GenerateChunk {
    /// Incremental text fragment, absent on bookkeeping records.
    pub response: Option<String>,
    /// Terminal marker; the final record also carries timing metadata.
    pub done: Option<bool>,
    /// Total generation time in nanoseconds, on the terminal record.
    pub total_duration: Option<u64>,
}

/// Complete response of a non-streaming generate call.
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Capability to submit a prompt and receive generated text.
///
/// The relay depends on this seam rather than on the concrete backend so
/// tests can script upstream behavior.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Opens a streaming generation request and returns its raw byte
    /// chunks. The stream is lazy and not restartable.
    async fn stream_generate(&self, prompt: &str) -> Result<ChunkStream, RelayError>;

    /// Performs one blocking generation call.
    async fn generate(&self, prompt: &str) -> Result<GenerateResponse, RelayError>;
}

/// [`Upstream`] implementation backed by an Ollama server's
/// `/api/generate` endpoint.
#[derive(Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    /// Creates a client for the given base URL and model.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    /// Returns the configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_generate(&self, prompt: &str, stream: bool) -> Result<reqwest::Response, RelayError> {
        let payload = GenerateRequest {
            model: &self.model,
            prompt,
            stream,
        };
        let url = format!("{}/api/generate", self.base_url);
        tracing::debug!(%url, stream, "sending generate request");
        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RelayError::UpstreamUnavailable {
                status: None,
                detail: e.to_string(),
            })?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayError::UpstreamUnavailable {
                status: Some(status),
                detail: body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl Upstream for OllamaClient {
    async fn stream_generate(&self, prompt: &str) -> Result<ChunkStream, RelayError> {
        let resp = self.post_generate(prompt, true).await?;
        let stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(RelayError::from));
        Ok(Box::pin(stream))
    }

    async fn generate(&self, prompt: &str) -> Result<GenerateResponse, RelayError> {
        let resp = self.post_generate(prompt, false).await?;
        resp.json::<GenerateResponse>()
            .await
            .map_err(|e| RelayError::UpstreamProtocol(e.to_string()))
    }
}
