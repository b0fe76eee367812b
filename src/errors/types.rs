//! Error type definitions for the log-query engine.
//!
//! Mirrors the taxonomy in spec §7: configuration errors are fatal at
//! construction, parse errors are fatal at the command boundary, transport
//! errors are fatal for single-target queries but collected for fan-out,
//! protocol errors carry a raw body excerpt, and stream errors surface on a
//! result's error channel without invalidating entries already emitted.

use thiserror::Error;

/// Top-level engine error type.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Unknown backend type, missing required option, or an unresolvable
    /// `${VAR}` reference. Fatal at adapter construction time.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A filter or query expression failed to parse. Carries the byte
    /// offset into the original expression where the error was detected.
    #[error("parse error at byte {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// Connection refused, auth failure, or timeout talking to a backend.
    #[error("transport error ({backend}): {message}")]
    Transport { backend: String, message: String },

    /// A backend responded with something the adapter couldn't make sense
    /// of. `excerpt` holds a bounded slice of the raw response body.
    #[error("protocol error ({backend}): {message} (body: {excerpt})")]
    Protocol {
        backend: String,
        message: String,
        excerpt: String,
    },

    /// Child-process non-zero exit, EOF mid-line, or other stream-level
    /// failure. Already-emitted entries remain valid.
    #[error("stream error: {0}")]
    Stream(String),

    /// Caller-initiated cancellation. Not a failure; propagated so callers
    /// can distinguish "cancelled" from "errored".
    #[error("operation cancelled")]
    Cancelled,

    /// A named backend configuration does not exist in the engine facade.
    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn parse<S: Into<String>>(offset: usize, message: S) -> Self {
        Self::Parse {
            offset,
            message: message.into(),
        }
    }

    pub fn transport<B: Into<String>, M: Into<String>>(backend: B, message: M) -> Self {
        Self::Transport {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn protocol<B: Into<String>, M: Into<String>, E: Into<String>>(
        backend: B,
        message: M,
        excerpt: E,
    ) -> Self {
        Self::Protocol {
            backend: backend.into(),
            message: message.into(),
            excerpt: excerpt.into(),
        }
    }

    pub fn stream<S: Into<String>>(message: S) -> Self {
        Self::Stream(message.into())
    }

    /// Whether this error represents caller cancellation rather than a
    /// genuine failure (§7 propagation policy).
    pub fn is_cancellation(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }
}
