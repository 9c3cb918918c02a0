//! Miscellaneous AnkiConnect actions.

use crate::client::AnkiClient;
use crate::error::Result;

/// Provides access to miscellaneous AnkiConnect operations.
///
/// Obtained via [`AnkiClient::misc()`].
#[derive(Debug)]
pub struct MiscActions<'a> {
    pub(crate) client: &'a AnkiClient,
}

impl<'a> MiscActions<'a> {
    /// Get the AnkiConnect API version.
    ///
    /// Cheap enough to use as a "is Anki up" probe before a long import.
    pub async fn version(&self) -> Result<u8> {
        self.client.invoke_without_params("version").await
    }
}
