use std::fmt;

use redline_core::Chunk;

pub use redline_core::JobId;

/// Failure classes reported by an inference backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InferenceFailure {
    RateLimited,
    ServiceUnavailable,
    CredentialOrAuth,
    MalformedResponse,
    ModelNotReady,
}

impl InferenceFailure {
    /// Transient classes that are retried with backoff.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            InferenceFailure::RateLimited | InferenceFailure::ServiceUnavailable
        )
    }
}

impl fmt::Display for InferenceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceFailure::RateLimited => write!(f, "rate limited"),
            InferenceFailure::ServiceUnavailable => write!(f, "service unavailable"),
            InferenceFailure::CredentialOrAuth => write!(f, "credential or auth failure"),
            InferenceFailure::MalformedResponse => write!(f, "malformed response"),
            InferenceFailure::ModelNotReady => write!(f, "model not ready"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct InferenceError {
    pub kind: InferenceFailure,
    pub message: String,
}

impl InferenceError {
    pub fn new(kind: InferenceFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Outcome of one chunk's round trip through the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkResult {
    pub index: usize,
    pub text: String,
    pub changed: bool,
}

impl ChunkResult {
    pub fn unchanged(chunk: &Chunk) -> Self {
        Self {
            index: chunk.index,
            text: chunk.text.clone(),
            changed: false,
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn progress(&self, progress: u8, message: String);
}
