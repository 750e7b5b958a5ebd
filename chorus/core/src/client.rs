//! Chat Client
//!
//! Application context tying configuration, backend, dispatcher and history
//! together. Surfaces hold one [`ChatClient`] and call [`ChatClient::submit`]
//! per user turn.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::backend::{ChatBackend, ChatRequest, ChatResponse, OpenAiBackend};
use crate::config::{ClientConfig, ConfigError};
use crate::dispatcher::{DispatchError, Dispatcher, TurnOutcome};
use crate::error::StreamError;
use crate::history::History;
use crate::messages::{now_ms, ChatMessage, ModelId};
use crate::models::ModelCatalog;
use crate::render::{transcript_html, HtmlRenderer, MarkdownRenderer};
use crate::streaming::RenderSink;

/// Errors surfaced by [`ChatClient`]
#[derive(Debug, Error)]
pub enum ChatError {
    /// Invalid or incomplete configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The turn was rejected before sending
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A non-streaming request failed
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// History could not be serialized
    #[error("Failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),

    /// An export file could not be written
    #[error("Failed to write {path}: {source}")]
    Io {
        /// Target path
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },
}

/// Chat application context
pub struct ChatClient<B: ChatBackend + ?Sized = OpenAiBackend> {
    config: ClientConfig,
    dispatcher: Dispatcher<B>,
    history: History,
    catalog: ModelCatalog,
    renderer: Box<dyn MarkdownRenderer>,
}

impl ChatClient<OpenAiBackend> {
    /// Build a client talking to the configured OpenAI-compatible endpoint
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingApiKey`] (wrapped) when no key is set,
    /// other validation errors, or a failure to build the HTTP client.
    pub fn new(config: ClientConfig) -> Result<Self, ChatError> {
        config.validate()?;
        let backend = OpenAiBackend::from_config(&config)?;
        Self::with_backend(config, Arc::new(backend))
    }
}

impl<B: ChatBackend + ?Sized> ChatClient<B> {
    /// Build a client over an arbitrary backend
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn with_backend(config: ClientConfig, backend: Arc<B>) -> Result<Self, ChatError> {
        config.validate()?;

        let mut dispatcher = Dispatcher::new(backend);
        if let Some(ref prompt) = config.system_prompt {
            dispatcher = dispatcher.with_system_prompt(prompt.clone());
        }

        tracing::info!(
            backend = dispatcher.backend().name(),
            models = ?config.default_models,
            history_limit = config.history_limit,
            "Chat client ready"
        );

        Ok(Self {
            history: History::with_limit(config.history_limit),
            config,
            dispatcher,
            catalog: ModelCatalog::new(),
            renderer: Box::new(HtmlRenderer::new()),
        })
    }

    /// Replace the markdown renderer used for transcripts
    #[must_use]
    pub fn with_renderer(mut self, renderer: Box<dyn MarkdownRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Conversation so far
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Known models
    #[must_use]
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Models a turn goes to when the surface has no selection
    #[must_use]
    pub fn default_models(&self) -> &[ModelId] {
        &self.config.default_models
    }

    /// Start a new chat
    pub fn new_chat(&mut self) {
        tracing::info!(dropped = self.history.len(), "Starting new chat");
        self.history.clear();
    }

    /// Send one user turn to `models` and record the results
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Dispatch`] if the turn is rejected before sending.
    /// Per-model failures are reported in the [`TurnOutcome`], not here.
    pub async fn submit<F, S>(
        &mut self,
        prompt: &str,
        models: &[ModelId],
        token: &CancellationToken,
        make_sink: F,
    ) -> Result<TurnOutcome, ChatError>
    where
        F: FnMut(&ModelId) -> S,
        S: RenderSink,
    {
        let outcome = self
            .dispatcher
            .dispatch(&mut self.history, prompt, models, token, make_sink)
            .await?;
        Ok(outcome)
    }

    /// Ask one model without streaming, using the history as context
    ///
    /// History is not modified.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after all retries.
    pub async fn complete(&self, prompt: &str, model: ModelId) -> Result<ChatResponse, ChatError> {
        if prompt.trim().is_empty() {
            return Err(DispatchError::EmptyPrompt.into());
        }

        let mut messages = self.history.snapshot();
        messages.push(ChatMessage::user(prompt));

        let mut request = ChatRequest::new(model, messages).with_stream(false);
        if let Some(ref system) = self.config.system_prompt {
            request = request.with_system(system.clone());
        }

        Ok(self.dispatcher.backend().complete(&request).await?)
    }

    /// History as a pretty-printed JSON array
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn history_json(&self) -> Result<String, ChatError> {
        Ok(self.history.to_json()?)
    }

    /// Write the history as JSON
    ///
    /// Without a path, writes `chat_history_<timestamp>.json` in the current
    /// directory. Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn export_history(&self, path: Option<&Path>) -> Result<PathBuf, ChatError> {
        let path = path.map_or_else(|| default_export_path("json"), Path::to_path_buf);
        let json = self.history_json()?;
        write_export(&path, json).await?;
        Ok(path)
    }

    /// Write the conversation as a standalone HTML page
    ///
    /// Without a path, writes `chat_history_<timestamp>.html`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn export_transcript_html(&self, path: Option<&Path>) -> Result<PathBuf, ChatError> {
        let path = path.map_or_else(|| default_export_path("html"), Path::to_path_buf);
        let page = transcript_html(&self.history, self.renderer.as_ref(), &self.catalog);
        write_export(&path, page).await?;
        Ok(path)
    }
}

fn default_export_path(extension: &str) -> PathBuf {
    PathBuf::from(format!("chat_history_{}.{extension}", now_ms()))
}

async fn write_export(path: &Path, contents: String) -> Result<(), ChatError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| ChatError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::info!(path = %path.display(), "Exported conversation");
    Ok(())
}
