//! Chat-Completion Backend Integration
//!
//! This module provides abstracted access to chat-completion endpoints through
//! a common trait interface, so sessions and tests never depend on a concrete
//! HTTP client.
//!
//! # Available Backends
//!
//! - **OpenAI-compatible**: any endpoint speaking `/v1/chat/completions` with
//!   server-sent-event streaming (default)
//!
//! # Usage
//!
//! ```ignore
//! use chorus_core::backend::{ChatBackend, ChatRequest, OpenAiBackend};
//!
//! let backend = OpenAiBackend::from_config(&config)?;
//! let request = ChatRequest::new("gpt-4o", messages);
//! let body = backend.open_stream(&request).await?;
//! ```

mod openai;
mod traits;

pub use openai::OpenAiBackend;
pub use traits::{ByteStream, ChatBackend, ChatRequest, ChatResponse, Usage};
