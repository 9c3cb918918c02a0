//! Error types for the Gemini client.
//!
//! Callers usually only need the predicates:
//!
//! - [`Error::is_transient`]: worth retrying after a pause
//! - [`Error::is_auth`]: every further request will fail the same way

use thiserror::Error;

/// The error type for Gemini operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network error from reqwest (connect, timeout, body decode).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API key was rejected (401/403).
    #[error("API key invalid or unauthorized ({status}): {message}")]
    Auth {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Quota or rate limit exceeded (429).
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    /// The API failed on its side (5xx).
    #[error("Gemini server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// The request was rejected (other 4xx), e.g. an unknown model.
    #[error("bad request ({status}): {message}")]
    BadRequest {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// The model answered without any usable text.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// The response was withheld by the safety filter.
    #[error("response blocked: {0}")]
    Blocked(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No model supporting `generateContent` is available to this key.
    #[error("no generateContent-capable models available")]
    NoModels,

    /// The API key is malformed.
    #[error("invalid API key: {0}")]
    InvalidKey(String),
}

impl Error {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Error::RateLimited(_) | Error::Server { .. } => true,
            _ => false,
        }
    }

    /// Whether the API key itself is the problem.
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth { .. } | Error::InvalidKey(_))
    }
}

/// A specialized Result type for Gemini operations.
pub type Result<T> = std::result::Result<T, Error>;
