//! Error types for ankit-importer.
//!
//! Errors fall into three groups:
//!
//! 1. **Profile management**: caller mistakes surfaced synchronously
//!    ([`Error::DuplicateName`], [`Error::NotFound`], [`Error::ProtectedProfile`],
//!    [`Error::NotApplicable`], [`Error::InvalidName`])
//! 2. **Per-image**: recorded in the run summary and never abort a batch
//!    ([`Error::InvalidImage`], [`Error::NoUsableFields`], [`Error::NoCards`],
//!    [`Error::Generation`], [`Error::Host`])
//! 3. **Run-level**: stop a run before the first image ([`Error::NoImages`],
//!    [`Error::UnknownFields`], [`Error::Io`])
//!
//! # Example
//!
//! ```
//! use ankit_importer::{Error, ProfileStore};
//!
//! let mut store = ProfileStore::with_builtins();
//! match store.delete("Default MCQ") {
//!     Err(Error::ProtectedProfile(name)) => println!("'{}' is built in", name),
//!     other => panic!("unexpected: {:?}", other),
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

use crate::format::Format;

/// Result type for ankit-importer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while managing profiles or importing images.
#[derive(Debug, Error)]
pub enum Error {
    /// A profile with this name already exists.
    #[error("a profile named '{0}' already exists")]
    DuplicateName(String),

    /// No profile has this name.
    #[error("profile not found: {0}")]
    NotFound(String),

    /// Built-in profiles cannot be deleted.
    #[error("'{0}' is a built-in profile and cannot be deleted")]
    ProtectedProfile(String),

    /// The operation only applies to built-in profiles.
    #[error("'{0}' is a custom profile and has no factory default")]
    NotApplicable(String),

    /// A profile name was empty or otherwise unusable.
    #[error("invalid profile name: '{0}'")]
    InvalidName(String),

    /// A format name was not one of mcq, cloze, basic.
    #[error("unknown format '{0}' (expected mcq, cloze or basic)")]
    UnknownFormat(String),

    /// A slot name does not belong to the format.
    #[error("'{slot}' is not a slot of the {format} format")]
    UnknownSlot {
        /// The format the slot was checked against.
        format: Format,
        /// The offending slot name.
        slot: String,
    },

    /// An image failed validation.
    #[error("invalid image {}: {reason}", path.display())]
    InvalidImage {
        /// The image file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// The field map produced no fields with content for a row.
    #[error("no content reached a mapped field of the {format} row; check the profile's field map")]
    NoUsableFields {
        /// Format of the row being mapped.
        format: Format,
    },

    /// No content slot is mapped to a field the note type has.
    #[error("note type '{note_type}' has none of the mapped fields: {}", fields.join(", "))]
    UnknownFields {
        /// The note type checked.
        note_type: String,
        /// Mapped fields missing from the note type.
        fields: Vec<String>,
    },

    /// The model's response contained no usable card lines.
    #[error("no cards found in response ({warnings} line(s) skipped)")]
    NoCards {
        /// Lines rejected by the parser.
        warnings: usize,
    },

    /// The image folder contains no supported images.
    #[error("no supported images found in {}", .0.display())]
    NoImages(PathBuf),

    /// An error from the generation API.
    #[error(transparent)]
    Generation(#[from] ankit_gemini::Error),

    /// An error from the note host (AnkiConnect).
    #[error(transparent)]
    Host(#[from] ankit::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error means the generation API key is unusable, so every
    /// further image would fail the same way.
    pub fn is_auth(&self) -> bool {
        match self {
            Error::Generation(e) => e.is_auth(),
            Error::Host(ankit::Error::PermissionDenied) => true,
            _ => false,
        }
    }
}
