//! Error types for the ankit crate.
//!
//! The variants a caller usually branches on:
//!
//! - [`Error::ConnectionRefused`]: Anki is not running or AnkiConnect is not installed
//! - [`Error::AnkiConnect`]: the action failed inside Anki (unknown deck, unknown
//!   field name, duplicate note, ...)
//! - [`Error::PermissionDenied`]: an API key is required or the request needs approval
//!
//! # Example
//!
//! ```no_run
//! use ankit::{AnkiClient, Error};
//!
//! # async fn example() {
//! let client = AnkiClient::new();
//!
//! match client.misc().version().await {
//!     Ok(version) => println!("AnkiConnect version {}", version),
//!     Err(Error::ConnectionRefused) => {
//!         eprintln!("Please start Anki with AnkiConnect installed");
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! # }
//! ```

use thiserror::Error;

/// The error type for AnkiConnect operations.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP/network error from reqwest.
    ///
    /// For connection failures, see [`Error::ConnectionRefused`].
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// AnkiConnect returned an error message.
    ///
    /// Common messages include:
    /// - "cannot create note because it is a duplicate"
    /// - "deck was not found"
    /// - "model was not found"
    #[error("AnkiConnect error: {0}")]
    AnkiConnect(String),

    /// The response carried neither a result nor an error.
    #[error("AnkiConnect returned empty response")]
    EmptyResponse,

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Connection refused - Anki is likely not running.
    #[error("Could not connect to Anki. Is Anki running with AnkiConnect installed?")]
    ConnectionRefused,

    /// Permission denied by AnkiConnect.
    #[error("Permission denied. Request permission first or check API key.")]
    PermissionDenied,
}

impl Error {
    /// Whether the error means Anki itself could not be reached, as opposed to
    /// a single request being rejected.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Error::ConnectionRefused | Error::Http(_))
    }
}

/// A specialized Result type for AnkiConnect operations.
pub type Result<T> = std::result::Result<T, Error>;
