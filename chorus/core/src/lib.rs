//! Chorus Core - Headless Multi-Model Streaming Chat
//!
//! This crate provides the orchestration logic for chorus, completely
//! independent of any UI framework. It sends one user turn to up to three
//! OpenAI-compatible models at once and reconstructs each model's streamed
//! output into a "thinking" channel and an "answer" channel.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          ChatClient                              │
//! │   History (bounded) ──snapshot──► Dispatcher ──► TurnOutcome     │
//! │                                      │                           │
//! │              ┌───────────────────────┼──────────────────┐        │
//! │              ▼                       ▼                  ▼        │
//! │        StreamSession           StreamSession      StreamSession  │
//! │   bytes ─► FrameDecoder ─► classify ─► ThinkSplitter ─► sink     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ChatClient`]: Application context owning config, backend and history
//! - [`Dispatcher`]: Fans one turn out to several models and fans results in
//! - [`StreamSession`]: One cancellable streaming request for one model
//! - [`ThinkSplitter`]: Separates reasoning text from answer text
//! - [`History`]: Bounded conversation log sent upstream as context
//!
//! # Quick Start
//!
//! ```ignore
//! use chorus_core::{ChatClient, ClientConfig, ModelId, StreamUpdate};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = ClientConfig::load()?;
//! let mut client = ChatClient::new(config)?;
//! let token = CancellationToken::new();
//!
//! let outcome = client
//!     .submit("Hello!", &[ModelId::from("gpt-4o")], &token, |_model| {
//!         |update: &StreamUpdate| println!("{}", update.answer)
//!     })
//!     .await?;
//! ```
//!
//! # No UI Dependencies
//!
//! Surfaces receive [`StreamUpdate`] snapshots through a [`RenderSink`] and
//! decide for themselves how to draw them.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod history;
pub mod messages;
pub mod models;
pub mod render;
pub mod streaming;

// Re-exports for convenience
pub use backend::{ByteStream, ChatBackend, ChatRequest, ChatResponse, OpenAiBackend};
pub use client::{ChatClient, ChatError};
pub use config::{
    default_config_path, ClientConfig, ConfigError, ConfigOverrides, ConfigSource,
};
pub use dispatcher::{DispatchError, Dispatcher, TurnOutcome, MAX_MODELS_PER_TURN};
pub use error::{ErrorInfo, ErrorKind, StreamError};
pub use history::{History, DEFAULT_HISTORY_LIMIT};
pub use messages::{ChatMessage, ModelId, Role, Turn, TurnId};
pub use models::{ModelCatalog, ModelEntry, ModelSelection, SelectionError};
pub use render::{fallback_html, transcript_html, HtmlRenderer, MarkdownRenderer};
pub use streaming::{
    classify, ChannelSink, DeltaShape, FragmentKind, FrameDecoder, RawEvent, RenderSink,
    SessionPhase, SessionResult, SessionStatus, SinkEvent, SplitStep, SplitterPhase,
    StreamFragment, StreamSession, StreamUpdate, ThinkSplitter,
};
