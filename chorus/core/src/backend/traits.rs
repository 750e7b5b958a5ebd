//! Chat Backend Traits
//!
//! Trait definitions for chat-completion backends. This abstraction lets the
//! dispatcher drive real HTTP endpoints and scripted test backends through the
//! same code path.
//!
//! # Design Philosophy
//!
//! The backend only opens connections and hands back raw body bytes. Framing,
//! delta classification and think/answer splitting all happen in
//! [`crate::streaming`], so every backend gets identical parsing behaviour.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::Serialize;

use crate::error::StreamError;
use crate::messages::{ChatMessage, ModelId};

/// Raw response body of a streaming request
///
/// Dropping the stream aborts the underlying connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

/// A chat-completion request body
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatRequest {
    /// Model to use
    pub model: ModelId,
    /// Conversation context followed by the new user message
    pub messages: Vec<ChatMessage>,
    /// Whether to stream the response
    pub stream: bool,
}

impl ChatRequest {
    /// Create a streaming request
    pub fn new(model: impl Into<ModelId>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
        }
    }

    /// Set streaming mode
    #[must_use]
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Prepend a system prompt
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.messages.insert(0, ChatMessage::system(system));
        self
    }
}

/// Token accounting reported by non-streaming responses
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Usage {
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Completion tokens
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

/// Response from a non-streaming request
#[derive(Clone, Debug, PartialEq)]
pub struct ChatResponse {
    /// The response text
    pub content: String,
    /// Model that generated the response
    pub model: ModelId,
    /// Tokens used (if reported)
    pub usage: Option<Usage>,
    /// Response time in milliseconds
    pub duration_ms: u64,
}

/// Chat backend trait
///
/// Implement this trait to add support for different providers or to script
/// responses in tests.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Get the backend name (e.g., "OpenAI-compatible")
    fn name(&self) -> &str;

    /// Open a streaming request and return the raw body
    ///
    /// Must fail with [`StreamError::Connection`] on a non-success status.
    /// Dropping the returned future or stream aborts the request.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, StreamError>;

    /// Send a request and wait for the complete response (non-streaming)
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, StreamError>;
}
