//! Error taxonomy for the dispatcher engine.
//!
//! Mirrors the error classes of §7: admission, transport, persistence and
//! serialization failures each get their own variant so the HTTP layer can
//! match on kind instead of string-sniffing a boxed error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed request or an unparseable cron expression. Does not mutate state.
    #[error("admission error: {0}")]
    Admission(String),

    /// A callback delivery attempt failed before it got an HTTP response
    /// (DNS, connect, TLS, read). Classified as status −1 in the task's
    /// `last_error_status_code`, but carried as a typed error here so
    /// callers that want the underlying `reqwest::Error` can match on it.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Filesystem error while reading, writing or listing a bucket.
    #[error("persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    /// A task file on disk could not be decoded as JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
