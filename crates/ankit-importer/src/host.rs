//! The note host: where decks, notes and media end up.
//!
//! [`NoteHost`] is the seam between the importer and Anki. [`AnkiHost`] talks
//! to a running AnkiConnect; tests substitute an in-memory host.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;

use ankit::{AnkiClient, NoteBuilder, StoreMediaParams};
use tracing::debug;

use crate::error::Result;

/// One note to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRequest {
    /// Full deck path including the subdeck.
    pub deck: String,
    pub note_type: String,
    /// Note field name to value.
    pub fields: HashMap<String, String>,
    pub tags: Vec<String>,
}

/// Note-creation boundary.
pub trait NoteHost {
    /// Create a deck (and missing parents) if it does not exist.
    fn ensure_deck(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Field names of a note type, in field order.
    fn note_fields(&self, note_type: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Create a note, returning its identifier.
    fn add_note(&self, note: NoteRequest) -> impl Future<Output = Result<i64>> + Send;

    /// Copy a local file into the media folder, returning the stored name.
    fn store_media(&self, path: &Path) -> impl Future<Output = Result<String>> + Send;

    /// Show the media folder to the user.
    fn open_media_folder(&self) -> impl Future<Output = Result<()>> + Send;
}

/// [`NoteHost`] backed by AnkiConnect.
#[derive(Debug, Clone)]
pub struct AnkiHost {
    client: AnkiClient,
    allow_duplicates: bool,
}

impl AnkiHost {
    pub fn new(client: AnkiClient) -> Self {
        Self {
            client,
            allow_duplicates: false,
        }
    }

    /// Let Anki accept notes whose first field matches an existing note.
    pub fn allow_duplicates(mut self, allow: bool) -> Self {
        self.allow_duplicates = allow;
        self
    }

    /// The underlying client.
    pub fn client(&self) -> &AnkiClient {
        &self.client
    }

    /// Name of the note type with this id, if it still exists.
    pub async fn note_type_name(&self, id: i64) -> Result<Option<String>> {
        let models = self.client.models().names_and_ids().await?;
        Ok(models
            .into_iter()
            .find_map(|(name, model_id)| (model_id == id).then_some(name)))
    }
}

impl NoteHost for AnkiHost {
    async fn ensure_deck(&self, name: &str) -> Result<()> {
        let id = self.client.decks().create(name).await?;
        debug!(deck = name, deck_id = id, "Deck ready");
        Ok(())
    }

    async fn note_fields(&self, note_type: &str) -> Result<Vec<String>> {
        Ok(self.client.models().field_names(note_type).await?)
    }

    async fn add_note(&self, note: NoteRequest) -> Result<i64> {
        let mut builder = NoteBuilder::new(note.deck, note.note_type)
            .fields(note.fields)
            .tags(note.tags);
        if self.allow_duplicates {
            builder = builder.allow_duplicate(true);
        }
        let note = builder.build();
        Ok(self.client.notes().add(note).await?)
    }

    async fn store_media(&self, path: &Path) -> Result<String> {
        let absolute = std::path::absolute(path)?;
        let filename = absolute
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let params = StoreMediaParams::from_path(filename, absolute.to_string_lossy());
        Ok(self.client.media().store(params).await?)
    }

    async fn open_media_folder(&self) -> Result<()> {
        let dir = self.client.media().directory().await?;
        debug!(dir = %dir, "Opening media folder");
        open::that(&dir)?;
        Ok(())
    }
}
