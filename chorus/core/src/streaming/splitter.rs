//! Think/Answer Splitter
//!
//! Reconstructs two text channels from the fragments of one stream:
//! the model's reasoning and its final answer. Three upstream conventions are
//! handled by the same state machine:
//!
//! 1. An explicit reasoning field, followed later by plain content
//! 2. Inline `<think>…</think>` markup inside content, with the closing marker
//!    in the same or a later fragment
//! 3. Markers that are themselves cut in half by a chunk boundary
//!    (`"…<thi"` + `"nk>…"`)
//!
//! A `</think>` with no matching `<think>` still closes the reasoning phase;
//! its text stays in the answer.
//!
//! ```text
//!            Reasoning / <think>            content after reasoning
//!   Idle ───────────────────────► Reasoning ─────────────────────► Answering
//!     │                                         or </think>            ▲
//!     └────────────────── plain content ───────────────────────────────┘
//! ```

use super::classifier::{FragmentKind, StreamFragment};

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

/// Observable phase of a splitter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitterPhase {
    /// No text seen yet
    Idle,
    /// Accumulating reasoning text
    Reasoning,
    /// Accumulating answer text
    Answering,
}

/// Result of pushing one fragment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SplitStep {
    /// Whether either channel grew
    pub text_changed: bool,
    /// Whether the reasoning phase closed on this fragment (fires once)
    pub phase_just_closed: bool,
}

/// State machine separating reasoning text from answer text
#[derive(Clone, Debug, Default)]
pub struct ThinkSplitter {
    reasoning: String,
    answer: String,
    inside_think_tag: bool,
    reasoning_closed: bool,
    /// Tail of the last content fragment that may be the start of a marker
    held: String,
    /// Drop leading whitespace of the answer right after `</think>`
    trim_answer_start: bool,
}

impl ThinkSplitter {
    /// Create a splitter in the `Idle` phase
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulated reasoning text
    #[must_use]
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Accumulated answer text
    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Whether an inline think span is open
    #[must_use]
    pub fn inside_think_tag(&self) -> bool {
        self.inside_think_tag
    }

    /// Whether the reasoning phase has closed (never reverts)
    #[must_use]
    pub fn reasoning_closed(&self) -> bool {
        self.reasoning_closed
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> SplitterPhase {
        if self.reasoning_closed || !self.answer.is_empty() {
            SplitterPhase::Answering
        } else if self.inside_think_tag || !self.reasoning.is_empty() {
            SplitterPhase::Reasoning
        } else {
            SplitterPhase::Idle
        }
    }

    /// Consume one fragment in arrival order
    pub fn push(&mut self, fragment: &StreamFragment) -> SplitStep {
        let reasoning_before = self.reasoning.len();
        let answer_before = self.answer.len();

        let saw_close = match fragment.kind {
            FragmentKind::Reasoning => {
                self.reasoning.push_str(&fragment.text);
                false
            }
            FragmentKind::Content => self.push_content(&fragment.text),
        };

        // Reasoning delivered first, then the first answer text arrives
        let vendor_transition =
            reasoning_before > 0 && answer_before == 0 && !self.answer.is_empty();

        let phase_just_closed = !self.reasoning_closed && (vendor_transition || saw_close);
        if phase_just_closed {
            self.reasoning_closed = true;
            tracing::trace!(
                reasoning_len = self.reasoning.len(),
                "Reasoning phase closed"
            );
        }

        SplitStep {
            text_changed: self.reasoning.len() != reasoning_before
                || self.answer.len() != answer_before,
            phase_just_closed,
        }
    }

    /// Flush any held-back marker prefix at end of stream
    ///
    /// Returns whether either channel grew.
    pub fn finish(&mut self) -> bool {
        if self.held.is_empty() {
            return false;
        }

        let held = std::mem::take(&mut self.held);
        if self.inside_think_tag {
            self.reasoning.push_str(&held);
        } else {
            self.push_answer(&held);
        }
        true
    }

    /// Split content across the two channels; returns whether `</think>` was seen
    fn push_content(&mut self, text: &str) -> bool {
        let mut buffer = std::mem::take(&mut self.held);
        buffer.push_str(text);

        let mut rest = buffer.as_str();
        let mut saw_close = false;

        loop {
            if self.inside_think_tag {
                if let Some(pos) = rest.find(CLOSE_TAG) {
                    self.reasoning.push_str(&rest[..pos]);
                    self.inside_think_tag = false;
                    self.trim_answer_start = true;
                    saw_close = true;
                    rest = &rest[pos + CLOSE_TAG.len()..];
                    continue;
                }

                let keep = marker_prefix_len(rest, CLOSE_TAG);
                let (text, tail) = rest.split_at(rest.len() - keep);
                self.reasoning.push_str(text);
                self.held = tail.to_string();
                break;
            }

            match (rest.find(OPEN_TAG), rest.find(CLOSE_TAG)) {
                (Some(pos), close) if close.map_or(true, |c| pos < c) => {
                    self.push_answer(&rest[..pos]);
                    self.inside_think_tag = true;
                    rest = &rest[pos + OPEN_TAG.len()..];
                    continue;
                }
                // A stray close marker ends the reasoning phase but stays answer text
                (_, Some(pos)) => {
                    let end = pos + CLOSE_TAG.len();
                    self.push_answer(&rest[..end]);
                    saw_close = true;
                    rest = &rest[end..];
                    continue;
                }
                _ => {}
            }

            let keep = marker_prefix_len(rest, OPEN_TAG).max(marker_prefix_len(rest, CLOSE_TAG));
            let (text, tail) = rest.split_at(rest.len() - keep);
            self.push_answer(text);
            self.held = tail.to_string();
            break;
        }

        saw_close
    }

    fn push_answer(&mut self, text: &str) {
        let text = if self.trim_answer_start && self.answer.is_empty() {
            text.trim_start()
        } else {
            text
        };
        self.answer.push_str(text);
    }
}

/// Length of the longest proper prefix of `marker` that `text` ends with
fn marker_prefix_len(text: &str, marker: &str) -> usize {
    (1..marker.len())
        .rev()
        .find(|&len| text.ends_with(&marker[..len]))
        .unwrap_or(0)
}
