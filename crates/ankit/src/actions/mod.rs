//! Action groups, one per AnkiConnect domain.

mod decks;
mod media;
mod misc;
mod models;
mod notes;

pub use decks::DeckActions;
pub use media::MediaActions;
pub use misc::MiscActions;
pub use models::ModelActions;
pub use notes::NoteActions;
