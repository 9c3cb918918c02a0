//! Profile-driven flashcard generation from folders of study images.
//!
//! Each image is sent to a generation model together with the active
//! profile's prompt. The model answers with pipe-delimited rows, which are
//! parsed under the profile's [`Format`], routed into note fields by the
//! profile's [`FieldMap`], and added to Anki in one subdeck per subtopic.
//!
//! # Quick Start
//!
//! ```no_run
//! use ankit::AnkiClient;
//! use ankit_gemini::GeminiClient;
//! use ankit_importer::{AnkiHost, ConfigFile, ImportOptions, ImportRequest, Importer};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> ankit_importer::Result<()> {
//! let (config, _) = ConfigFile::new("config.json").load()?;
//! let profile = config.profiles.active()?.clone();
//! let note_type = config.note_type_for(&profile).unwrap_or_else(|| "Basic".into());
//!
//! let importer = Importer::new(
//!     GeminiClient::new(config.effective_api_key()),
//!     AnkiHost::new(AnkiClient::new()),
//! );
//! let request = ImportRequest::new("./slides", "Pharmacology", note_type, profile);
//! let summary = importer
//!     .run(&request, &ImportOptions::from_config(&config), &CancellationToken::new(), |_| {})
//!     .await?;
//! println!("Created {} cards", summary.cards_created);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`profile`] - profiles and the profile store
//! - [`config`] and [`migrate`] - the persisted document and its upgrades
//! - [`parse`] and [`mapper`] - model output to note fields
//! - [`import`] - the batch orchestrator

mod error;

pub mod cloze;
pub mod config;
pub mod deck;
pub mod format;
pub mod generate;
pub mod host;
pub mod images;
pub mod import;
pub mod mapper;
pub mod migrate;
pub mod parse;
pub mod profile;
pub mod prompts;

pub use config::{Config, ConfigFile, RetrySettings};
pub use error::{Error, Result};
pub use format::{Format, Slot};
pub use generate::ContentGenerator;
pub use host::{AnkiHost, NoteHost, NoteRequest};
pub use import::{
    ImageOutcome, ImageReport, ImportEvent, ImportFailure, ImportOptions, ImportRequest,
    ImportSummary, Importer, RunState,
};
pub use migrate::MigrationReport;
pub use parse::{ParseWarning, RowRecord};
pub use profile::{FieldMap, Profile, ProfileStore, ProfileUpdate};

// Re-export client types for convenience
pub use ankit::AnkiClient;
pub use ankit_gemini::{GeminiClient, RetryPolicy};
