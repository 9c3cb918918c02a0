//! Note-related AnkiConnect actions.

use serde::Serialize;

use crate::client::AnkiClient;
use crate::error::Result;
use crate::types::Note;

/// Provides access to note-related AnkiConnect operations.
///
/// Obtained via [`AnkiClient::notes()`].
#[derive(Debug)]
pub struct NoteActions<'a> {
    pub(crate) client: &'a AnkiClient,
}

#[derive(Serialize)]
struct AddNoteParams {
    note: Note,
}

impl<'a> NoteActions<'a> {
    /// Add a new note and return its ID.
    ///
    /// AnkiConnect rejects duplicates unless
    /// [`NoteBuilder::allow_duplicate()`](crate::NoteBuilder::allow_duplicate)
    /// was set, and rejects field names the note type does not have.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ankit::{AnkiClient, NoteBuilder};
    ///
    /// # async fn example() -> ankit::Result<()> {
    /// let client = AnkiClient::new();
    ///
    /// let note = NoteBuilder::new("Default", "Cloze")
    ///     .field("Text", "The {{c1::mitochondria}} makes ATP")
    ///     .tag("generated")
    ///     .build();
    ///
    /// let note_id = client.notes().add(note).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn add(&self, note: Note) -> Result<i64> {
        self.client.invoke("addNote", AddNoteParams { note }).await
    }
}
