//! Error taxonomy for the upload client.
//!
//! `UploadError` is what a session or the resolver reports; `GatewayError`
//! is what any REST call reports; `ChunkSendError` is the transport-level
//! result of one chunk attempt and decides whether a retry is worthwhile.

use reqwest::StatusCode;
use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid file {}: {reason}", path.display())]
    InvalidFile { path: PathBuf, reason: String },

    #[error("chunk {chunk} failed after {attempts} attempt(s): {reason}")]
    ChunkUploadFailed {
        chunk: u32,
        attempts: u32,
        reason: String,
    },

    #[error("upload record `{id}` not available after {attempts} attempt(s)")]
    RecordNotAvailable { id: String, attempts: u32 },

    #[error("checksum mismatch for `{id}`: local {expected}, server {actual}")]
    ChecksumMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("upload `{0}` was cancelled")]
    Cancelled(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl UploadError {
    pub(crate) fn invalid_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidFile {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("`{0}` not found")]
    NotFound(String),

    #[error("rejected by server validation ({status}): {message}")]
    Validation { status: u16, message: String },

    #[error("malformed record id `{0}`")]
    InvalidId(String),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("request refused ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("CSRF token is not a valid header value")]
    InvalidCsrfToken,

    #[error("created response carried no usable Location header")]
    MissingLocation,

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl GatewayError {
    /// Map a non-success HTTP status to an error. `what` names the resource
    /// for `NotFound`.
    pub fn from_status(status: StatusCode, what: &str, message: String) -> Self {
        let code = status.as_u16();
        match status {
            StatusCode::NOT_FOUND => Self::NotFound(what.to_string()),
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                Self::Validation {
                    status: code,
                    message,
                }
            }
            s if s.is_server_error() => Self::Server {
                status: code,
                message,
            },
            _ => Self::Rejected {
                status: code,
                message,
            },
        }
    }

    /// Worth retrying: the server or the network may recover.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Server { .. } => true,
            Self::Transport(err) => !(err.is_decode() || err.is_builder()),
            _ => false,
        }
    }
}

/// Result of a single chunk attempt that did not succeed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChunkSendError {
    #[error("transient: {0}")]
    Transient(String),

    #[error("permanent: {0}")]
    Permanent(String),
}

impl ChunkSendError {
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = if body.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            format!("HTTP {}: {}", status.as_u16(), body)
        };
        if status.is_server_error()
            || status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
        {
            Self::Transient(message)
        } else {
            Self::Permanent(message)
        }
    }
}

impl From<reqwest::Error> for ChunkSendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::Permanent(err.to_string())
        } else {
            Self::Transient(err.to_string())
        }
    }
}
