//! Multi-Model Dispatcher
//!
//! Fans one user turn out to up to [`MAX_MODELS_PER_TURN`] streaming sessions
//! and fans their results back in.
//!
//! # Design Philosophy
//!
//! All sessions of a turn are futures polled together on the caller's task.
//! They share one cancellation token and one history snapshot, and each owns
//! its own render sink, so a slow or failing model never holds up the others.
//! The user turn is recorded when the turn is accepted; model answers are
//! recorded only after every session has reached a terminal state.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::{ChatBackend, ChatRequest};
use crate::history::History;
use crate::messages::{ChatMessage, ModelId, Turn, TurnId};
use crate::streaming::{RenderSink, SessionResult, SessionStatus, StreamSession};

/// Most models a single turn may be sent to
pub const MAX_MODELS_PER_TURN: usize = 3;

/// Reasons a turn is rejected before any network activity
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// No model selected
    #[error("select at least one model")]
    NoModels,

    /// More models than a turn allows
    #[error("at most {max} models per turn, got {requested}")]
    TooManyModels {
        /// Number of models requested
        requested: usize,
        /// The limit
        max: usize,
    },

    /// The same model was selected twice
    #[error("model selected more than once: {0}")]
    DuplicateModel(ModelId),

    /// Blank prompt
    #[error("prompt is empty")]
    EmptyPrompt,
}

/// Everything a turn produced
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    /// Turn identifier
    pub turn: TurnId,
    /// One result per model, in request order
    pub results: Vec<SessionResult>,
    /// Number of model answers appended to history
    pub appended: usize,
}

impl TurnOutcome {
    /// Result for one model
    #[must_use]
    pub fn result(&self, model: &ModelId) -> Option<&SessionResult> {
        self.results.iter().find(|r| &r.model == model)
    }

    /// Results that completed
    pub fn completed(&self) -> impl Iterator<Item = &SessionResult> {
        self.results.iter().filter(|r| r.is_completed())
    }

    /// Whether every session was cancelled
    #[must_use]
    pub fn all_aborted(&self) -> bool {
        self.results
            .iter()
            .all(|r| r.status == SessionStatus::Aborted)
    }
}

/// Fans turns out to several models through one backend
pub struct Dispatcher<B: ChatBackend + ?Sized> {
    backend: Arc<B>,
    system_prompt: Option<String>,
}

impl<B: ChatBackend + ?Sized> Dispatcher<B> {
    /// Create a dispatcher over `backend`
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            system_prompt: None,
        }
    }

    /// Prepend a system prompt to every request
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// The backend sessions stream from
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Check a turn without sending it
    ///
    /// # Errors
    ///
    /// Returns the first [`DispatchError`] that applies.
    pub fn validate(prompt: &str, models: &[ModelId]) -> Result<(), DispatchError> {
        if prompt.trim().is_empty() {
            return Err(DispatchError::EmptyPrompt);
        }
        if models.is_empty() {
            return Err(DispatchError::NoModels);
        }
        if models.len() > MAX_MODELS_PER_TURN {
            return Err(DispatchError::TooManyModels {
                requested: models.len(),
                max: MAX_MODELS_PER_TURN,
            });
        }

        let mut seen = HashSet::with_capacity(models.len());
        for model in models {
            if !seen.insert(model) {
                return Err(DispatchError::DuplicateModel(model.clone()));
            }
        }
        Ok(())
    }

    /// Send `prompt` to every model and record the results in `history`
    ///
    /// Once the turn is accepted the user turn is appended, after the context
    /// snapshot is taken. Each completed answer is appended after fan-in, in
    /// request order; aborted and failed sessions append nothing.
    ///
    /// `make_sink` is called once per model, in request order, before any
    /// request is sent.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] if the turn is rejected; history is then
    /// untouched.
    pub async fn dispatch<F, S>(
        &self,
        history: &mut History,
        prompt: &str,
        models: &[ModelId],
        token: &CancellationToken,
        mut make_sink: F,
    ) -> Result<TurnOutcome, DispatchError>
    where
        F: FnMut(&ModelId) -> S,
        S: RenderSink,
    {
        Self::validate(prompt, models)?;

        let turn = TurnId::new();
        let mut messages = history.snapshot();
        messages.push(ChatMessage::user(prompt));
        history.append(Turn::user(prompt));

        let requests: Vec<ChatRequest> = models
            .iter()
            .map(|model| {
                let request = ChatRequest::new(model.clone(), messages.clone());
                match &self.system_prompt {
                    Some(system) => request.with_system(system.clone()),
                    None => request,
                }
            })
            .collect();
        let mut sinks: Vec<S> = models.iter().map(&mut make_sink).collect();

        info!(
            turn = %turn,
            models = models.len(),
            context = messages.len() - 1,
            "Dispatching turn"
        );

        let backend = self.backend.as_ref();
        let sessions = models
            .iter()
            .zip(&requests)
            .zip(sinks.iter_mut())
            .map(|((model, request), sink)| {
                StreamSession::new(model.clone(), turn).run(backend, request, token, sink)
            });
        let results = join_all(sessions).await;

        let appended = record_answers(history, &results);
        debug!(turn = %turn, appended = appended, "Turn recorded");

        Ok(TurnOutcome {
            turn,
            results,
            appended,
        })
    }
}

/// Append every completed answer in request order; returns the count
fn record_answers(history: &mut History, results: &[SessionResult]) -> usize {
    let mut appended = 0;
    for result in results.iter().filter(|r| r.is_completed()) {
        history.append(Turn::assistant(result.model.clone(), result.final_text.clone()));
        appended += 1;
    }
    appended
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OpenAiBackend;
    use crate::error::ErrorInfo;
    use crate::messages::Role;
    use std::time::Duration;

    type Check = Dispatcher<OpenAiBackend>;

    fn ids(names: &[&str]) -> Vec<ModelId> {
        names.iter().map(|n| ModelId::from(*n)).collect()
    }

    fn result(model: &str, status: SessionStatus, text: &str) -> SessionResult {
        SessionResult {
            model: ModelId::from(model),
            status,
            final_text: text.to_string(),
            reasoning_text: String::new(),
            error: None::<ErrorInfo>,
            duration: Duration::ZERO,
            events_seen: 0,
            reasoning_closed: false,
            unterminated_think: false,
        }
    }

    #[test]
    fn test_validate_rejects_bad_turns() {
        assert_eq!(Check::validate("hi", &[]), Err(DispatchError::NoModels));
        assert_eq!(
            Check::validate("hi", &ids(&["a", "b", "c", "d"])),
            Err(DispatchError::TooManyModels {
                requested: 4,
                max: 3
            })
        );
        assert_eq!(
            Check::validate("hi", &ids(&["a", "b", "a"])),
            Err(DispatchError::DuplicateModel(ModelId::from("a")))
        );
        assert_eq!(
            Check::validate("  \n", &ids(&["a"])),
            Err(DispatchError::EmptyPrompt)
        );
        assert_eq!(Check::validate("hi", &ids(&["a", "b", "c"])), Ok(()));
    }

    #[test]
    fn test_record_answers_keeps_request_order() {
        let mut history = History::new();
        let results = vec![
            result("b", SessionStatus::Completed, "from b"),
            result("x", SessionStatus::Failed, "partial"),
            result("a", SessionStatus::Completed, "from a"),
        ];

        assert_eq!(record_answers(&mut history, &results), 2);

        let turns: Vec<&Turn> = history.turns().collect();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::Assistant);
        assert_eq!(turns[0].model, Some(ModelId::from("b")));
        assert_eq!(turns[1].model, Some(ModelId::from("a")));
    }

    #[test]
    fn test_record_answers_all_aborted_appends_nothing() {
        let mut history = History::new();
        let results = vec![
            result("a", SessionStatus::Aborted, "par"),
            result("b", SessionStatus::Aborted, ""),
        ];
        assert_eq!(record_answers(&mut history, &results), 0);
        assert!(history.is_empty());
    }

    #[test]
    fn test_record_answers_keeps_empty_completed_answer() {
        let mut history = History::new();
        let results = vec![result("r1", SessionStatus::Completed, "")];
        assert_eq!(record_answers(&mut history, &results), 1);
        assert_eq!(history.last().map(|t| t.content.as_str()), Some(""));
    }

    #[test]
    fn test_outcome_helpers() {
        let outcome = TurnOutcome {
            turn: TurnId::new(),
            results: vec![
                result("a", SessionStatus::Completed, "x"),
                result("b", SessionStatus::Aborted, ""),
            ],
            appended: 2,
        };
        assert_eq!(outcome.completed().count(), 1);
        assert!(!outcome.all_aborted());
        assert_eq!(
            outcome.result(&ModelId::from("b")).map(|r| r.status),
            Some(SessionStatus::Aborted)
        );
    }
}
