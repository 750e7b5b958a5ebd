//! OpenAI-Compatible Backend Implementation
//!
//! Chat backend for any endpoint that implements the OpenAI chat-completion
//! API with server-sent-event streaming.
//!
//! # API
//!
//! - `POST <api_url>` with `Authorization: Bearer <key>` and a JSON body
//!   `{model, messages, stream}`
//! - Streaming responses are `text/event-stream`, one `data: {json}` line per
//!   delta, terminated by `data: [DONE]`
//!
//! Only connection handling lives here; the body bytes are handed to the
//! streaming pipeline untouched.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;

use super::traits::{ByteStream, ChatBackend, ChatRequest, ChatResponse, Usage};
use crate::config::ClientConfig;
use crate::error::StreamError;

/// OpenAI-compatible backend client
#[derive(Clone)]
pub struct OpenAiBackend {
    /// Chat-completion endpoint
    api_url: String,
    /// Bearer token
    api_key: String,
    /// Timeout for non-streaming requests
    request_timeout: Duration,
    /// Retry attempts for non-streaming requests
    max_retries: u32,
    /// Delay between retries
    retry_delay: Duration,
    /// HTTP client
    http_client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl OpenAiBackend {
    /// Create a new backend
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, StreamError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            request_timeout: Duration::from_secs(120),
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            http_client,
        })
    }

    /// Create from a validated [`ClientConfig`]
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &ClientConfig) -> Result<Self, StreamError> {
        let mut backend = Self::new(config.api_url.clone(), config.api_key.clone())?;
        backend.request_timeout = config.request_timeout;
        backend.max_retries = config.max_retries;
        backend.retry_delay = config.retry_delay;
        Ok(backend)
    }

    /// Endpoint this backend posts to
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn post(&self, request: &ChatRequest) -> reqwest::RequestBuilder {
        self.http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(request)
    }

    /// One non-streaming attempt
    async fn complete_once(&self, request: &ChatRequest) -> Result<ChatResponse, StreamError> {
        let start = Instant::now();
        let response = self
            .post(request)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| StreamError::connect(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::from_status(status.as_u16(), &body));
        }

        let data: serde_json::Value = response.json().await?;
        parse_completion(&data, request, start.elapsed())
    }
}

/// Extract content and usage from a non-streaming completion body
fn parse_completion(
    data: &serde_json::Value,
    request: &ChatRequest,
    elapsed: Duration,
) -> Result<ChatResponse, StreamError> {
    let content = data
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| StreamError::InvalidResponse("missing choices[0].message.content".into()))?
        .to_string();

    let usage = data.get("usage").map(|u| {
        let field = |name: &str| {
            u.get(name)
                .and_then(serde_json::Value::as_u64)
                .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX))
        };
        Usage {
            prompt_tokens: field("prompt_tokens"),
            completion_tokens: field("completion_tokens"),
            total_tokens: field("total_tokens"),
        }
    });

    Ok(ChatResponse {
        content,
        model: request.model.clone(),
        usage,
        duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
    })
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "OpenAI-compatible"
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, StreamError> {
        tracing::debug!(model = %request.model, url = %self.api_url, "Opening stream");

        let response = self
            .post(request)
            .send()
            .await
            .map_err(|e| StreamError::connect(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::from_status(status.as_u16(), &body));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(StreamError::from));
        Ok(Box::pin(stream))
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, StreamError> {
        let request = request.clone().with_stream(false);
        let mut attempt = 0;

        loop {
            match self.complete_once(&request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        model = %request.model,
                        attempt = attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "Completion failed, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
