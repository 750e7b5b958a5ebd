//! Single-Stream Session
//!
//! Owns the lifecycle of one streaming request for one model:
//!
//! ```text
//! Connecting ──► Streaming ──► Completed
//!      │             │
//!      │             ├──────► Failed   (read error, partial text kept)
//!      ├─────────────┴──────► Aborted  (token cancelled)
//!      └────────────────────► Failed   (non-2xx / connect error)
//! ```
//!
//! Every suspension point (the connect and each chunk read) is raced against
//! the turn's [`CancellationToken`]. Returning from the session drops the
//! body stream, which aborts the HTTP connection.

use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::classifier::classify;
use super::decoder::{FrameDecoder, RawEvent};
use super::splitter::{SplitterPhase, ThinkSplitter};
use crate::backend::{ChatBackend, ChatRequest};
use crate::error::{ErrorInfo, StreamError};
use crate::messages::{ModelId, TurnId};

/// Lifecycle phase of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for response headers
    Connecting,
    /// Reading the body
    Streaming,
    /// `[DONE]` or end of body reached
    Completed,
    /// Cancelled by the user
    Aborted,
    /// Connection or read failure
    Failed,
}

/// Terminal status of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// The stream finished normally
    Completed,
    /// The turn's token was cancelled
    Aborted,
    /// The request failed
    Failed,
}

/// Outcome of one session, produced exactly once
#[derive(Clone, Debug, PartialEq)]
pub struct SessionResult {
    /// Model the session streamed from
    pub model: ModelId,
    /// Terminal status
    pub status: SessionStatus,
    /// Answer text (partial unless completed)
    pub final_text: String,
    /// Reasoning text
    pub reasoning_text: String,
    /// Failure detail
    pub error: Option<ErrorInfo>,
    /// Wall time from connect to terminal state
    pub duration: Duration,
    /// Number of JSON events decoded
    pub events_seen: u32,
    /// Whether the reasoning phase closed
    pub reasoning_closed: bool,
    /// Whether the stream ended inside an unterminated think span
    pub unterminated_think: bool,
}

impl SessionResult {
    /// Whether the session completed
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    /// Short inline message for non-success states
    ///
    /// `None` for completed sessions.
    #[must_use]
    pub fn status_message(&self) -> Option<String> {
        match self.status {
            SessionStatus::Completed => None,
            SessionStatus::Aborted => Some("stopped".to_string()),
            SessionStatus::Failed => Some(format!(
                "request failed: {}",
                self.error
                    .as_ref()
                    .map_or("unknown error", |e| e.message.as_str())
            )),
        }
    }
}

/// Snapshot of a session's reconstructed text after a chunk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamUpdate {
    /// Model the update belongs to
    pub model: ModelId,
    /// Full reasoning text so far
    pub reasoning: String,
    /// Full answer text so far
    pub answer: String,
    /// Whether the reasoning phase closed during this chunk
    pub phase_just_closed: bool,
    /// Splitter phase after this chunk
    pub phase: SplitterPhase,
}

/// Receiver of a session's incremental output
///
/// Updates carry complete snapshots, so rendering is idempotent.
pub trait RenderSink: Send {
    /// Called after every chunk that changed the text
    fn update(&mut self, update: &StreamUpdate);

    /// Called exactly once with the terminal result
    fn finish(&mut self, _result: &SessionResult) {}
}

impl<F> RenderSink for F
where
    F: FnMut(&StreamUpdate) + Send,
{
    fn update(&mut self, update: &StreamUpdate) {
        self(update);
    }
}

/// Event forwarded by a [`ChannelSink`]
#[derive(Clone, Debug)]
pub enum SinkEvent {
    /// A text snapshot
    Update(StreamUpdate),
    /// The terminal result
    Finished(SessionResult),
}

/// Sink that forwards everything to an unbounded channel
///
/// Lets a surface render from its own task while sessions run.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    /// Wrap a sender
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<SinkEvent>) -> Self {
        Self { tx }
    }
}

impl RenderSink for ChannelSink {
    fn update(&mut self, update: &StreamUpdate) {
        // Receiver gone means the surface stopped listening
        let _ = self.tx.send(SinkEvent::Update(update.clone()));
    }

    fn finish(&mut self, result: &SessionResult) {
        let _ = self.tx.send(SinkEvent::Finished(result.clone()));
    }
}

enum Outcome {
    Completed,
    Aborted,
    Failed(StreamError),
}

/// One cancellable streaming request for one model
#[derive(Debug)]
pub struct StreamSession {
    model: ModelId,
    turn: TurnId,
    phase: SessionPhase,
    decoder: FrameDecoder,
    splitter: ThinkSplitter,
    events_seen: u32,
}

impl StreamSession {
    /// Create a session for `model` within `turn`
    #[must_use]
    pub fn new(model: ModelId, turn: TurnId) -> Self {
        Self {
            model,
            turn,
            phase: SessionPhase::Connecting,
            decoder: FrameDecoder::new(),
            splitter: ThinkSplitter::new(),
            events_seen: 0,
        }
    }

    /// Model this session streams from
    #[must_use]
    pub fn model(&self) -> &ModelId {
        &self.model
    }

    /// Current lifecycle phase
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Run the session to its terminal state
    ///
    /// The sink sees zero or more updates followed by exactly one `finish`.
    pub async fn run<B, S>(
        mut self,
        backend: &B,
        request: &ChatRequest,
        token: &CancellationToken,
        sink: &mut S,
    ) -> SessionResult
    where
        B: ChatBackend + ?Sized,
        S: RenderSink + ?Sized,
    {
        let span = tracing::info_span!("session", model = %self.model, turn = %self.turn);
        let start = Instant::now();

        let outcome = self
            .drive(backend, request, token, sink)
            .instrument(span.clone())
            .await;

        let interrupted_in = self.phase;
        let result = self.into_result(outcome, start.elapsed());
        span.in_scope(|| match result.status {
            SessionStatus::Completed => tracing::info!(
                events = result.events_seen,
                answer_len = result.final_text.len(),
                duration_ms = u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
                "Session completed"
            ),
            SessionStatus::Aborted => tracing::info!(phase = ?interrupted_in, "Session aborted"),
            SessionStatus::Failed => tracing::warn!(
                phase = ?interrupted_in,
                error = result.error.as_ref().map_or("", |e| e.message.as_str()),
                "Session failed"
            ),
        });

        sink.finish(&result);
        result
    }

    async fn drive<B, S>(
        &mut self,
        backend: &B,
        request: &ChatRequest,
        token: &CancellationToken,
        sink: &mut S,
    ) -> Outcome
    where
        B: ChatBackend + ?Sized,
        S: RenderSink + ?Sized,
    {
        self.phase = SessionPhase::Connecting;

        let mut body = tokio::select! {
            biased;
            () = token.cancelled() => return Outcome::Aborted,
            opened = backend.open_stream(request) => match opened {
                Ok(body) => body,
                Err(e) => return Outcome::Failed(e),
            },
        };

        self.phase = SessionPhase::Streaming;
        tracing::debug!("Stream opened");

        loop {
            let next = tokio::select! {
                biased;
                () = token.cancelled() => return Outcome::Aborted,
                next = body.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    if self.consume(&chunk, sink) {
                        return Outcome::Completed;
                    }
                }
                Some(Err(e)) => return Outcome::Failed(e),
                None => {
                    let events = self.decoder.finish();
                    if !self.apply(events, sink) {
                        tracing::debug!("Body ended without [DONE]");
                        self.flush(sink);
                    }
                    return Outcome::Completed;
                }
            }
        }
    }

    /// Process one body chunk; returns whether the stream is done
    ///
    /// Exposed for surfaces that read the body themselves.
    pub fn consume<S>(&mut self, chunk: &[u8], sink: &mut S) -> bool
    where
        S: RenderSink + ?Sized,
    {
        let events = self.decoder.feed(chunk);
        self.apply(events, sink)
    }

    fn apply<S>(&mut self, events: Vec<RawEvent>, sink: &mut S) -> bool
    where
        S: RenderSink + ?Sized,
    {
        let mut changed = false;
        let mut closed = false;
        let mut done = false;

        for event in events {
            match event {
                RawEvent::Payload(value) => {
                    self.events_seen += 1;
                    for fragment in classify(&value) {
                        let step = self.splitter.push(&fragment);
                        changed |= step.text_changed;
                        closed |= step.phase_just_closed;
                    }
                }
                RawEvent::Done => {
                    changed |= self.splitter.finish();
                    done = true;
                }
            }
        }

        if changed || closed {
            sink.update(&self.snapshot(closed));
        }
        done
    }

    fn flush<S>(&mut self, sink: &mut S)
    where
        S: RenderSink + ?Sized,
    {
        if self.splitter.finish() {
            sink.update(&self.snapshot(false));
        }
    }

    fn snapshot(&self, phase_just_closed: bool) -> StreamUpdate {
        StreamUpdate {
            model: self.model.clone(),
            reasoning: self.splitter.reasoning().to_string(),
            answer: self.splitter.answer().to_string(),
            phase_just_closed,
            phase: self.splitter.phase(),
        }
    }

    fn into_result(self, outcome: Outcome, duration: Duration) -> SessionResult {
        let (status, error) = match outcome {
            Outcome::Completed => (SessionStatus::Completed, None),
            Outcome::Aborted => (SessionStatus::Aborted, None),
            Outcome::Failed(e) => (SessionStatus::Failed, Some(ErrorInfo::from(&e))),
        };

        SessionResult {
            model: self.model,
            status,
            final_text: self.splitter.answer().to_string(),
            reasoning_text: self.splitter.reasoning().to_string(),
            error,
            duration,
            events_seen: self.events_seen,
            reasoning_closed: self.splitter.reasoning_closed(),
            unterminated_think: self.splitter.inside_think_tag(),
        }
    }
}
