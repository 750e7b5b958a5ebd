//! Delta Classifier
//!
//! Maps one decoded stream event to typed fragments. Vendor differences in
//! how reasoning is delivered are isolated here:
//!
//! - `delta.reasoning` (DeepSeek-R1 style)
//! - `delta.reasoning_content` (Claude / OpenAI-compatible proxies)
//! - `delta.content`, which may itself carry inline `<think>` markup that the
//!   [`ThinkSplitter`](super::ThinkSplitter) resolves
//!
//! Classification is a pure per-event mapping with no buffering.

use serde::Deserialize;

/// Vendor field a fragment was read from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaShape {
    /// `delta.reasoning`
    ReasoningField,
    /// `delta.reasoning_content`
    ReasoningContentField,
    /// `delta.content`
    ContentField,
}

/// Which text channel a fragment feeds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FragmentKind {
    /// Explicit reasoning text
    Reasoning,
    /// Content text (may contain inline think markup)
    Content,
}

/// The unit consumed by the think/answer splitter
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamFragment {
    /// Channel
    pub kind: FragmentKind,
    /// Raw text
    pub text: String,
    /// Field the text came from
    pub shape: DeltaShape,
}

impl StreamFragment {
    /// Reasoning fragment read from `delta.reasoning`
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Reasoning,
            text: text.into(),
            shape: DeltaShape::ReasoningField,
        }
    }

    /// Content fragment read from `delta.content`
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Content,
            text: text.into(),
            shape: DeltaShape::ContentField,
        }
    }
}

#[derive(Deserialize)]
struct ChunkEvent {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

/// Extract fragments from one event payload, reasoning first
#[must_use]
pub fn classify(event: &serde_json::Value) -> Vec<StreamFragment> {
    let Some(delta) = first_delta(event) else {
        return Vec::new();
    };

    let mut fragments = Vec::with_capacity(2);

    let reasoning = non_empty(delta.reasoning)
        .map(|text| (text, DeltaShape::ReasoningField))
        .or_else(|| {
            non_empty(delta.reasoning_content).map(|text| (text, DeltaShape::ReasoningContentField))
        });

    if let Some((text, shape)) = reasoning {
        fragments.push(StreamFragment {
            kind: FragmentKind::Reasoning,
            text,
            shape,
        });
    }

    if let Some(text) = non_empty(delta.content) {
        fragments.push(StreamFragment::content(text));
    }

    fragments
}

fn first_delta(event: &serde_json::Value) -> Option<Delta> {
    match ChunkEvent::deserialize(event) {
        Ok(chunk) => chunk.choices.into_iter().next().and_then(|c| c.delta),
        Err(e) => {
            tracing::debug!(error = %e, "Event does not match the chat-completion chunk shape");
            None
        }
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.is_empty())
}
