//! Deck-related AnkiConnect actions.

use serde::Serialize;

use crate::client::AnkiClient;
use crate::error::Result;

/// Provides access to deck-related AnkiConnect operations.
///
/// Obtained via [`AnkiClient::decks()`].
#[derive(Debug)]
pub struct DeckActions<'a> {
    pub(crate) client: &'a AnkiClient,
}

#[derive(Serialize)]
struct CreateDeckParams<'a> {
    deck: &'a str,
}

impl<'a> DeckActions<'a> {
    /// Create a deck, including any missing parents in a `Parent::Child` path.
    ///
    /// Returns the deck ID. Creating a deck that already exists is not an
    /// error; AnkiConnect returns the existing deck's ID.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use ankit::AnkiClient;
    /// # async fn example() -> ankit::Result<()> {
    /// let client = AnkiClient::new();
    /// let deck_id = client.decks().create("Medicine::Cardiology").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create(&self, name: &str) -> Result<i64> {
        self.client
            .invoke("createDeck", CreateDeckParams { deck: name })
            .await
    }
}
