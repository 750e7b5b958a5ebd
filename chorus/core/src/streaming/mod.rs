//! Streaming Pipeline
//!
//! Everything between the raw response body and the text a surface draws:
//!
//! ```text
//! bytes ──► FrameDecoder ──► classify ──► ThinkSplitter ──► RenderSink
//!           (SSE lines)      (fragments)   (reasoning/answer)
//! ```
//!
//! # Design Philosophy
//!
//! Each stage is a plain synchronous value with no I/O, so parsing behaviour is
//! identical for every backend and can be tested chunk by chunk.
//! [`StreamSession`] is the only async piece: it owns one connection and races
//! each read against the turn's cancellation token.

mod classifier;
mod decoder;
mod session;
mod splitter;

pub use classifier::{classify, DeltaShape, FragmentKind, StreamFragment};
pub use decoder::{FrameDecoder, RawEvent};
pub use session::{
    ChannelSink, RenderSink, SessionPhase, SessionResult, SessionStatus, SinkEvent,
    StreamSession, StreamUpdate,
};
pub use splitter::{SplitStep, SplitterPhase, ThinkSplitter};
