//! Media-related types.

use serde::Serialize;

/// Parameters for storing a media file.
///
/// AnkiConnect reads the file itself when given a `path`, so large images
/// do not have to travel base64-encoded over the local socket.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreMediaParams {
    /// Filename to save as.
    pub filename: String,
    /// Local file path AnkiConnect should copy from.
    pub path: String,
}

impl StoreMediaParams {
    /// Create params for storing a local file.
    pub fn from_path(filename: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            path: path.into(),
        }
    }
}
