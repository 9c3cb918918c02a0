//! Common test utilities for importer tests: scripted generator, recording
//! host and AnkiConnect mock helpers.

#![allow(dead_code)] // Not all test files use every helper

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use ankit_gemini::GenerateRequest;
use ankit_importer::{ContentGenerator, NoteHost, NoteRequest};
use serde::Serialize;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

/// Fields `RecordingHost` reports for every note type unless told otherwise.
pub const STOCK_FIELDS: &[&str] = &[
    "Front",
    "Back",
    "Question",
    "Multiple Choice",
    "Correct Answers",
    "Extra",
    "Text",
    "Back Extra",
];

pub const MCQ_LINE: &str = "Cells | Question? | Choice A;Choice B | Choice A | note";

/// A folder holding PNG files with the given names.
pub fn image_folder(names: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in names {
        std::fs::write(dir.path().join(name), PNG).unwrap();
    }
    dir
}

/// One scripted generator reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// 500 after the client's retry was spent.
    ServerError,
    /// 403, key rejected.
    AuthError,
    Empty,
}

impl Reply {
    pub fn text(s: &str) -> Self {
        Reply::Text(s.to_string())
    }
}

/// What the generator was asked.
#[derive(Debug, Clone)]
pub struct Call {
    pub prompt: String,
    pub context: Option<String>,
    pub mime_type: Option<String>,
    pub model: Option<String>,
}

/// Generator that answers from a script, one reply per call.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    replies: Vec<Reply>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// The same reply for every call.
    pub fn always(reply: Reply, times: usize) -> Self {
        Self::new(vec![reply; times])
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn contexts(&self) -> Vec<Option<String>> {
        self.calls().into_iter().map(|c| c.context).collect()
    }
}

impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerateRequest<'_>) -> ankit_gemini::Result<String> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                prompt: request.prompt.to_string(),
                context: request.context.map(str::to_string),
                mime_type: request.image.map(|i| i.mime_type.to_string()),
                model: request.model.map(str::to_string),
            });
            calls.len() - 1
        };

        match self.replies.get(index).cloned().unwrap_or(Reply::Empty) {
            Reply::Text(text) => Ok(text),
            Reply::ServerError => Err(ankit_gemini::Error::Server {
                status: 500,
                message: "internal error".into(),
            }),
            Reply::AuthError => Err(ankit_gemini::Error::Auth {
                status: 403,
                message: "API key not valid".into(),
            }),
            Reply::Empty => Err(ankit_gemini::Error::EmptyResponse),
        }
    }
}

/// In-memory host that records everything it is asked to do.
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub decks: Mutex<Vec<String>>,
    pub notes: Mutex<Vec<NoteRequest>>,
    pub media: Mutex<Vec<PathBuf>>,
    pub opened: AtomicBool,
    /// Reject notes whose fields contain this text.
    pub reject_containing: Option<String>,
    /// Fields of every note type. [`STOCK_FIELDS`] when unset.
    pub fields: Option<Vec<String>>,
    pub field_lookups: Mutex<Vec<String>>,
}

impl RecordingHost {
    pub fn rejecting(text: &str) -> Self {
        Self {
            reject_containing: Some(text.to_string()),
            ..Default::default()
        }
    }

    /// A host whose note types have exactly these fields.
    pub fn with_fields(fields: &[&str]) -> Self {
        Self {
            fields: Some(fields.iter().map(|f| f.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn notes(&self) -> Vec<NoteRequest> {
        self.notes.lock().unwrap().clone()
    }

    pub fn decks(&self) -> Vec<String> {
        self.decks.lock().unwrap().clone()
    }

    pub fn opened(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }
}

impl NoteHost for RecordingHost {
    async fn ensure_deck(&self, name: &str) -> ankit_importer::Result<()> {
        self.decks.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn note_fields(&self, note_type: &str) -> ankit_importer::Result<Vec<String>> {
        self.field_lookups.lock().unwrap().push(note_type.to_string());
        Ok(self
            .fields
            .clone()
            .unwrap_or_else(|| STOCK_FIELDS.iter().map(|f| f.to_string()).collect()))
    }

    async fn add_note(&self, note: NoteRequest) -> ankit_importer::Result<i64> {
        if let Some(marker) = &self.reject_containing {
            if note.fields.values().any(|v| v.contains(marker.as_str())) {
                return Err(ankit::Error::AnkiConnect(
                    "cannot create note because it is a duplicate".into(),
                )
                .into());
            }
        }
        let mut notes = self.notes.lock().unwrap();
        notes.push(note);
        Ok(1_000 + notes.len() as i64)
    }

    async fn store_media(&self, path: &Path) -> ankit_importer::Result<String> {
        self.media.lock().unwrap().push(path.to_path_buf());
        Ok(path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default())
    }

    async fn open_media_folder(&self) -> ankit_importer::Result<()> {
        self.opened.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Create a successful AnkiConnect response.
pub fn mock_anki_response<T: Serialize>(result: T) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "result": result,
        "error": null
    }))
}

/// Create an error AnkiConnect response.
pub fn mock_anki_error(error: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "result": null,
        "error": error
    }))
}

/// Mount a mock for a specific action (expect exactly 1 call).
pub async fn mock_action(server: &MockServer, action: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "action": action,
            "version": 6
        })))
        .respond_with(response)
        .expect(1)
        .mount(server)
        .await;
}
