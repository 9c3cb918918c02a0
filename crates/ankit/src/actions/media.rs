//! Media-related AnkiConnect actions.

use crate::client::AnkiClient;
use crate::error::Result;
use crate::types::StoreMediaParams;

/// Provides access to media-related AnkiConnect operations.
///
/// Obtained via [`AnkiClient::media()`].
#[derive(Debug)]
pub struct MediaActions<'a> {
    pub(crate) client: &'a AnkiClient,
}

impl<'a> MediaActions<'a> {
    /// Store a file in Anki's media folder.
    ///
    /// Returns the filename Anki actually used, which may differ from the
    /// requested one when a different file with that name already exists.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ankit::{AnkiClient, StoreMediaParams};
    ///
    /// # async fn example() -> ankit::Result<()> {
    /// let client = AnkiClient::new();
    /// let params = StoreMediaParams::from_path("page-01.png", "/slides/page-01.png");
    /// let stored = client.media().store(params).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn store(&self, params: StoreMediaParams) -> Result<String> {
        self.client.invoke("storeMediaFile", params).await
    }

    /// Get the path to Anki's media directory.
    pub async fn directory(&self) -> Result<String> {
        self.client.invoke_without_params("getMediaDirPath").await
    }
}
