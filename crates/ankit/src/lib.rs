//! Async client for the subset of the AnkiConnect API that card importers need.
//!
//! The importer treats Anki as an external host: it creates decks, adds notes,
//! stores media files and asks for the media folder. This crate covers exactly
//! that surface, plus the model (note type) lookups used to validate field maps.
//!
//! # Quick Start
//!
//! ```no_run
//! use ankit::{AnkiClient, NoteBuilder};
//!
//! # async fn example() -> ankit::Result<()> {
//! let client = AnkiClient::new();
//!
//! client.decks().create("Pharmacology::Antibiotics").await?;
//!
//! let note = NoteBuilder::new("Pharmacology::Antibiotics", "Basic")
//!     .field("Front", "Drug class of amoxicillin?")
//!     .field("Back", "Penicillins")
//!     .build();
//! let note_id = client.notes().add(note).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! - Anki must be running with the [AnkiConnect](https://ankiweb.net/shared/info/2055492159) add-on installed
//! - By default, the client connects to `http://127.0.0.1:8765`

pub mod actions;
pub mod client;
pub mod error;
mod request;
pub mod types;

pub use client::{AnkiClient, ClientBuilder};
pub use error::{Error, Result};
pub use types::{Note, NoteBuilder, NoteOptions, StoreMediaParams};
