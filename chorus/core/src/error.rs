//! Stream Error Types
//!
//! Errors that terminate a single streaming session. Malformed per-event JSON
//! is not represented here: the frame decoder recovers from it locally.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while opening or reading one model's stream
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    /// The endpoint answered with a non-success status
    #[error("{message}")]
    Connection {
        /// HTTP status code
        status: u16,
        /// Detail extracted from the error body, or `HTTP error: <status>`
        message: String,
    },

    /// The request never got a response (DNS, connect, TLS, timeout)
    #[error("connection failed: {0}")]
    Connect(String),

    /// The transport failed after the stream was open
    #[error("network error: {0}")]
    Network(String),

    /// The response could not be interpreted
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl StreamError {
    /// Build a connection error from a status and a best-effort JSON body
    ///
    /// Uses `error.message` when present, otherwise `HTTP error: <status>`.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(serde_json::Value::as_str)
                    .map(String::from)
            })
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("HTTP error: {status}"));

        Self::Connection { status, message }
    }

    /// Transport failure before any response arrived
    #[must_use]
    pub fn connect(e: &reqwest::Error) -> Self {
        Self::Connect(e.to_string())
    }

    /// Whether a retry could plausibly succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { status, .. } => *status == 429 || *status >= 500,
            Self::Connect(_) | Self::Network(_) => true,
            Self::InvalidResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// Coarse error category carried in a session result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Non-2xx status, or no response at all
    Connection,
    /// Transport failure after the stream was open
    Network,
    /// Unusable response body
    InvalidResponse,
}

/// Serializable error summary for display in a model's own response area
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error category
    pub kind: ErrorKind,
    /// HTTP status if the endpoint answered
    pub status: Option<u16>,
    /// Human-readable detail
    pub message: String,
}

impl From<&StreamError> for ErrorInfo {
    fn from(e: &StreamError) -> Self {
        match e {
            StreamError::Connection { status, message } => Self {
                kind: ErrorKind::Connection,
                status: Some(*status),
                message: message.clone(),
            },
            StreamError::Connect(message) => Self {
                kind: ErrorKind::Connection,
                status: None,
                message: message.clone(),
            },
            StreamError::Network(message) => Self {
                kind: ErrorKind::Network,
                status: None,
                message: message.clone(),
            },
            StreamError::InvalidResponse(message) => Self {
                kind: ErrorKind::InvalidResponse,
                status: None,
                message: message.clone(),
            },
        }
    }
}
