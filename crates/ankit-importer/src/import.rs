//! Batch import: a folder of images in, notes out.
//!
//! Images are processed one at a time in lexical filename order, because each
//! prompt carries a summary of the previous page. A run moves through
//! [`RunState`]s:
//!
//! ```text
//! Idle -> Validating -> Running -> Summarizing -> Done
//!                          \-> Cancelled
//! ```
//!
//! Problems with a single image (bad file, generation failure, no parsable
//! rows, rejected notes) are recorded in the [`ImportSummary`] and the loop
//! moves on. Only problems found while validating the run itself are returned
//! as errors.
//!
//! # Example
//!
//! ```no_run
//! use ankit::AnkiClient;
//! use ankit_gemini::GeminiClient;
//! use ankit_importer::import::{ImportOptions, ImportRequest, Importer};
//! use ankit_importer::{AnkiHost, ProfileStore};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> ankit_importer::Result<()> {
//! let importer = Importer::new(GeminiClient::new("AIza..."), AnkiHost::new(AnkiClient::new()));
//! let profile = ProfileStore::with_builtins().get("Default Basic")?.clone();
//!
//! let request = ImportRequest::new("./slides", "Pharmacology", "Basic", profile);
//! let summary = importer
//!     .run(&request, &ImportOptions::default(), &CancellationToken::new(), |_| {})
//!     .await?;
//! println!("{} cards from {} images", summary.cards_created, summary.succeeded);
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use ankit_gemini::{GenerateRequest, ImagePart};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::deck;
use crate::error::{Error, Result};
use crate::format::Slot;
use crate::generate::ContentGenerator;
use crate::host::{NoteHost, NoteRequest};
use crate::images::{self, ImageData};
use crate::mapper;
use crate::parse::{self, RowRecord};
use crate::profile::Profile;

/// Rows summarised into the next page's context.
const CONTEXT_ROWS: usize = 5;

/// Upper bound on the context text, in characters.
const CONTEXT_MAX_CHARS: usize = 2000;

/// What to import and where.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub folder: PathBuf,
    /// Root deck; subtopics become subdecks below it.
    pub root_deck: String,
    pub note_type: String,
    /// Snapshot of the profile. Edits made during the run do not apply.
    pub profile: Profile,
    /// Overrides the generator's default model.
    pub model: Option<String>,
    /// Tags added to every note.
    pub tags: Vec<String>,
}

impl ImportRequest {
    pub fn new(
        folder: impl Into<PathBuf>,
        root_deck: impl Into<String>,
        note_type: impl Into<String>,
        profile: Profile,
    ) -> Self {
        Self {
            folder: folder.into(),
            root_deck: root_deck.into(),
            note_type: note_type.into(),
            profile,
            model: None,
            tags: Vec::new(),
        }
    }
}

/// Knobs of a run.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub max_image_bytes: u64,
    /// Store each source image and link it in the extra field.
    pub attach_source_image: bool,
    /// Open the media folder when the run created cards.
    pub open_media: bool,
    /// Log a checkpoint every this many images. `0` disables it.
    pub progress_interval: usize,
    /// End the run on the first authentication failure.
    pub stop_on_auth_error: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            max_image_bytes: 20 * 1024 * 1024,
            attach_source_image: false,
            open_media: false,
            progress_interval: 10,
            stop_on_auth_error: true,
        }
    }
}

impl ImportOptions {
    /// Options as configured.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_image_bytes: config.max_image_bytes(),
            attach_source_image: config.attach_source_image,
            open_media: config.auto_open_media,
            progress_interval: config.batch_size as usize,
            stop_on_auth_error: true,
        }
    }
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Validating,
    Running,
    Summarizing,
    Done,
    /// Stopped between images on request. Terminal.
    Cancelled,
}

/// Result of one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Succeeded {
        /// Notes created.
        cards: usize,
        /// Rows whose note could not be created.
        failed_rows: usize,
        /// Parse warnings, including rejected lines.
        warnings: usize,
    },
    Failed {
        reason: String,
        /// Parse warnings seen before the image failed.
        warnings: usize,
    },
}

/// Outcome of one image in the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReport {
    /// 1-based position in the batch.
    pub position: usize,
    pub filename: String,
    pub outcome: ImageOutcome,
}

/// Progress notifications delivered to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportEvent {
    /// The run entered a new state.
    State(RunState),
    ImageStarted {
        position: usize,
        total: usize,
        filename: String,
    },
    ImageFinished {
        position: usize,
        total: usize,
        report: ImageReport,
    },
}

/// Details about a failed image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    pub position: usize,
    pub filename: String,
    pub reason: String,
}

/// Summary of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    /// `Done` or `Cancelled`.
    pub state: RunState,
    /// Images found in the folder.
    pub total_images: usize,
    /// Images attempted.
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cards_created: usize,
    /// Subdecks created, in creation order.
    pub subdecks: Vec<String>,
    /// Parse warnings across all images.
    pub warnings: usize,
    pub failures: Vec<ImportFailure>,
    pub images: Vec<ImageReport>,
    /// Set when the run stopped early on an authentication failure.
    pub aborted: Option<String>,
    pub media_opened: bool,
    /// Mapped fields the note type does not have. Anki ignores their values.
    pub unknown_fields: Vec<String>,
}

impl ImportSummary {
    fn new(total_images: usize) -> Self {
        Self {
            state: RunState::Idle,
            total_images,
            processed: 0,
            succeeded: 0,
            failed: 0,
            cards_created: 0,
            subdecks: Vec::new(),
            warnings: 0,
            failures: Vec::new(),
            images: Vec::new(),
            aborted: None,
            media_opened: false,
            unknown_fields: Vec::new(),
        }
    }

    /// Whether every image was attempted.
    pub fn is_complete(&self) -> bool {
        self.processed == self.total_images
    }
}

/// Mutable state of one run. Dropped when the run ends.
struct Batch {
    root: String,
    context: Option<String>,
    known_decks: HashSet<String>,
    summary: ImportSummary,
}

/// What a successfully processed image contributed.
struct ImageSuccess {
    cards: usize,
    failed_rows: usize,
    warnings: usize,
    context: Option<String>,
}

/// Why an image produced no cards.
struct ImageFailure {
    error: Error,
    /// Parse warnings seen before the failure.
    warnings: usize,
}

impl From<Error> for ImageFailure {
    fn from(error: Error) -> Self {
        Self { error, warnings: 0 }
    }
}

/// Runs imports with a generator and a note host.
#[derive(Debug)]
pub struct Importer<G, H> {
    generator: G,
    host: H,
}

impl<G: ContentGenerator, H: NoteHost> Importer<G, H> {
    pub fn new(generator: G, host: H) -> Self {
        Self { generator, host }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Import every image in `request.folder`.
    ///
    /// `on_event` is called on every state change and before and after each
    /// image. Cancelling `cancel` stops the run before the next image; the
    /// image in flight is finished first.
    ///
    /// # Errors
    ///
    /// - [`Error::NoUsableFields`] if the profile maps no content slot
    /// - [`Error::Io`] if the folder cannot be read
    /// - [`Error::NoImages`] if the folder holds no supported images
    /// - [`Error::UnknownFields`] if no mapped content field exists on the
    ///   note type
    /// - [`Error::Host`] if the note type's fields cannot be read
    ///
    /// These are returned after the [`RunState::Validating`] event. No
    /// terminal state is reported and no summary exists for such a run.
    pub async fn run<F>(
        &self,
        request: &ImportRequest,
        options: &ImportOptions,
        cancel: &CancellationToken,
        mut on_event: F,
    ) -> Result<ImportSummary>
    where
        F: FnMut(&ImportEvent),
    {
        let profile = &request.profile;

        on_event(&ImportEvent::State(RunState::Validating));
        if !profile.field_map.is_usable_for(profile.format) {
            return Err(Error::NoUsableFields {
                format: profile.format,
            });
        }
        let images = images::scan_folder(&request.folder)?;
        if images.is_empty() {
            return Err(Error::NoImages(request.folder.clone()));
        }
        let unknown_fields = self.check_fields(request).await?;

        let total = images.len();
        let mut batch = Batch {
            root: deck::sanitize_root(&request.root_deck),
            context: None,
            known_decks: HashSet::new(),
            summary: ImportSummary::new(total),
        };
        batch.summary.unknown_fields = unknown_fields;

        info!(
            folder = %request.folder.display(),
            images = total,
            profile = %profile.name,
            format = %profile.format,
            root_deck = %batch.root,
            "Starting import"
        );
        on_event(&ImportEvent::State(RunState::Running));

        let mut cancelled = false;
        for (index, path) in images.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let position = index + 1;
            let filename = display_name(path);
            on_event(&ImportEvent::ImageStarted {
                position,
                total,
                filename: filename.clone(),
            });

            let result = self
                .process_image(request, options, &mut batch, path, position)
                .await;
            batch.summary.processed += 1;

            let (outcome, stop) = match result {
                Ok(success) => {
                    info!(image = %filename, cards = success.cards, "Image imported");
                    batch.summary.succeeded += 1;
                    batch.summary.cards_created += success.cards;
                    batch.summary.warnings += success.warnings;
                    batch.context = success.context;
                    (
                        ImageOutcome::Succeeded {
                            cards: success.cards,
                            failed_rows: success.failed_rows,
                            warnings: success.warnings,
                        },
                        false,
                    )
                }
                Err(ImageFailure { error: e, warnings }) => {
                    warn!(image = %filename, error = %e, warnings, "Image failed");
                    batch.summary.failed += 1;
                    batch.summary.warnings += warnings;
                    batch.context = None;
                    let reason = e.to_string();
                    batch.summary.failures.push(ImportFailure {
                        position,
                        filename: filename.clone(),
                        reason: reason.clone(),
                    });
                    let stop = options.stop_on_auth_error && e.is_auth();
                    if stop {
                        batch.summary.aborted = Some(reason.clone());
                    }
                    (ImageOutcome::Failed { reason, warnings }, stop)
                }
            };

            let report = ImageReport {
                position,
                filename,
                outcome,
            };
            batch.summary.images.push(report.clone());
            on_event(&ImportEvent::ImageFinished {
                position,
                total,
                report,
            });

            if options.progress_interval > 0 && position % options.progress_interval == 0 {
                info!(
                    processed = position,
                    total,
                    cards = batch.summary.cards_created,
                    failed = batch.summary.failed,
                    "Checkpoint"
                );
            }

            if stop {
                warn!("Authentication failed, stopping import");
                break;
            }
        }

        let mut summary = batch.summary;
        if cancelled {
            info!(processed = summary.processed, total, "Import cancelled");
            summary.state = RunState::Cancelled;
            on_event(&ImportEvent::State(RunState::Cancelled));
            return Ok(summary);
        }

        on_event(&ImportEvent::State(RunState::Summarizing));
        if options.open_media && summary.cards_created > 0 {
            match self.host.open_media_folder().await {
                Ok(()) => summary.media_opened = true,
                Err(e) => warn!(error = %e, "Could not open media folder"),
            }
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            cards = summary.cards_created,
            subdecks = summary.subdecks.len(),
            warnings = summary.warnings,
            "Import finished"
        );
        summary.state = RunState::Done;
        on_event(&ImportEvent::State(RunState::Done));
        Ok(summary)
    }

    /// Compare the mapped fields with the note type's fields, returning the
    /// mapped fields it lacks.
    async fn check_fields(&self, request: &ImportRequest) -> Result<Vec<String>> {
        let profile = &request.profile;
        let available = self.host.note_fields(&request.note_type).await?;
        let known = |field: &str| available.iter().any(|f| f.eq_ignore_ascii_case(field));

        let mut unknown: Vec<String> = Vec::new();
        let mut content_known = false;
        for slot in profile.format.schema().slots {
            let Some(field) = profile.field_map.get(*slot) else {
                continue;
            };
            if known(field) {
                content_known |= slot.is_content();
            } else if !unknown.iter().any(|f| f == field) {
                unknown.push(field.to_string());
            }
        }

        if !content_known {
            return Err(Error::UnknownFields {
                note_type: request.note_type.clone(),
                fields: unknown,
            });
        }
        for field in &unknown {
            warn!(note_type = %request.note_type, field = %field, "Mapped field is not on the note type");
        }
        Ok(unknown)
    }

    async fn process_image(
        &self,
        request: &ImportRequest,
        options: &ImportOptions,
        batch: &mut Batch,
        path: &Path,
        position: usize,
    ) -> std::result::Result<ImageSuccess, ImageFailure> {
        let profile = &request.profile;
        let image = images::load(path, options.max_image_bytes).await?;

        let text = self.generate(request, &image, batch.context.as_deref()).await?;

        let outcome = parse::parse(profile.format, &text).partition();
        for warning in &outcome.warnings {
            debug!(image = %image.filename, %warning, "Parse warning");
        }
        let warnings = outcome.warnings.len();
        if outcome.rows.is_empty() {
            return Err(ImageFailure {
                error: Error::NoCards { warnings },
                warnings,
            });
        }

        let stored_image = if options.attach_source_image {
            let stored = self
                .host
                .store_media(&image.path)
                .await
                .map_err(|error| ImageFailure { error, warnings })?;
            Some(stored)
        } else {
            None
        };

        let rows: Vec<RowRecord> = outcome
            .rows
            .into_iter()
            .map(|row| row.with_source(image.filename.clone(), position))
            .collect();

        let mut cards = 0;
        let mut failed_rows = 0;
        let mut last_error: Option<Error> = None;
        for row in &rows {
            let created = match mapper::map_row(row, &profile.field_map) {
                Ok(mut fields) => {
                    if let Some(stored) = &stored_image {
                        attach_image(&mut fields, profile, stored);
                    }
                    self.create_note(request, batch, row, fields).await
                }
                Err(e) => Err(e),
            };

            match created {
                Ok(note_id) => {
                    debug!(image = %image.filename, line = row.line, note_id, "Note created");
                    cards += 1;
                }
                Err(e) => {
                    debug!(image = %image.filename, line = row.line, error = %e, "Note rejected");
                    failed_rows += 1;
                    last_error = Some(e);
                }
            }
        }

        if cards == 0 {
            if let Some(error) = last_error {
                return Err(ImageFailure { error, warnings });
            }
        }

        Ok(ImageSuccess {
            cards,
            failed_rows,
            warnings,
            context: build_context(&rows),
        })
    }

    async fn generate(
        &self,
        request: &ImportRequest,
        image: &ImageData,
        context: Option<&str>,
    ) -> Result<String> {
        let mut generate = GenerateRequest::new(&request.profile.prompt)
            .image(ImagePart::new(&image.bytes, image.mime_type))
            .context(context);
        if let Some(model) = request.model.as_deref() {
            generate = generate.model(model);
        }
        Ok(self.generator.generate(generate).await?)
    }

    async fn create_note(
        &self,
        request: &ImportRequest,
        batch: &mut Batch,
        row: &RowRecord,
        fields: HashMap<String, String>,
    ) -> Result<i64> {
        let deck = deck::subdeck(&batch.root, row.subtopic());
        if !batch.known_decks.contains(&deck) {
            self.host.ensure_deck(&deck).await?;
            batch.known_decks.insert(deck.clone());
            batch.summary.subdecks.push(deck.clone());
        }

        self.host
            .add_note(NoteRequest {
                deck,
                note_type: request.note_type.clone(),
                fields,
                tags: request.tags.clone(),
            })
            .await
    }
}

/// Append the stored source image to the field mapped from `extra`.
fn attach_image(fields: &mut HashMap<String, String>, profile: &Profile, stored: &str) {
    let Some(target) = profile.field_map.get(Slot::Extra) else {
        return;
    };
    let value = fields.entry(target.to_string()).or_default();
    if !value.is_empty() {
        value.push_str("<br><br>");
    }
    value.push_str(&format!("<img src=\"{}\">", stored));
}

/// Context for the next page: the last subtopic and the gist of the last
/// few rows.
fn build_context(rows: &[RowRecord]) -> Option<String> {
    let last = rows.last()?;
    let mut context = format!("Previous page subtopic: {}", last.subtopic());
    let start = rows.len().saturating_sub(CONTEXT_ROWS);
    for row in &rows[start..] {
        let content = row.primary_content();
        if !content.is_empty() {
            context.push_str("\n- ");
            context.push_str(content);
        }
    }
    if let Some((cut, _)) = context.char_indices().nth(CONTEXT_MAX_CHARS) {
        context.truncate(cut);
    }
    Some(context)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
