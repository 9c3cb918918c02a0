//! Tests for the AnkiConnect-backed note host.

mod common;

use std::collections::HashMap;

use ankit::AnkiClient;
use ankit_importer::{AnkiHost, Error, NoteHost, NoteRequest};
use common::{PNG, mock_action, mock_anki_error, mock_anki_response};
use wiremock::MockServer;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, ResponseTemplate};

async fn setup() -> (MockServer, AnkiHost) {
    let server = MockServer::start().await;
    let client = AnkiClient::builder().url(server.uri()).build();
    (server, AnkiHost::new(client))
}

#[tokio::test]
async fn test_ensure_deck() {
    let (server, host) = setup().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "action": "createDeck",
            "params": { "deck": "Bio::Cells" }
        })))
        .respond_with(mock_anki_response(1_651_445_861_967_i64))
        .expect(1)
        .mount(&server)
        .await;

    host.ensure_deck("Bio::Cells").await.unwrap();
}

#[tokio::test]
async fn test_add_note() {
    let (server, host) = setup().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "action": "addNote",
            "params": {
                "note": {
                    "deckName": "Bio::Cells",
                    "modelName": "Basic",
                    "fields": { "Front": "Question?", "Back": "Answer" },
                    "tags": ["generated"]
                }
            }
        })))
        .respond_with(mock_anki_response(1_496_198_395_707_i64))
        .expect(1)
        .mount(&server)
        .await;

    let id = host
        .add_note(NoteRequest {
            deck: "Bio::Cells".into(),
            note_type: "Basic".into(),
            fields: HashMap::from([
                ("Front".to_string(), "Question?".to_string()),
                ("Back".to_string(), "Answer".to_string()),
            ]),
            tags: vec!["generated".into()],
        })
        .await
        .unwrap();
    assert_eq!(id, 1_496_198_395_707);
}

#[tokio::test]
async fn test_add_note_allowing_duplicates() {
    let (server, host) = setup().await;
    let host = host.allow_duplicates(true);
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "action": "addNote",
            "params": { "note": { "options": { "allowDuplicate": true } } }
        })))
        .respond_with(mock_anki_response(7_i64))
        .expect(1)
        .mount(&server)
        .await;

    let id = host
        .add_note(NoteRequest {
            deck: "Bio".into(),
            note_type: "Basic".into(),
            fields: HashMap::from([("Front".to_string(), "Q".to_string())]),
            tags: Vec::new(),
        })
        .await
        .unwrap();
    assert_eq!(id, 7);
}

#[tokio::test]
async fn test_add_note_rejected() {
    let (server, host) = setup().await;
    mock_action(
        &server,
        "addNote",
        mock_anki_error("cannot create note because it is a duplicate"),
    )
    .await;

    let err = host
        .add_note(NoteRequest {
            deck: "Bio".into(),
            note_type: "Basic".into(),
            fields: HashMap::from([("Front".to_string(), "Q".to_string())]),
            tags: Vec::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Host(ankit::Error::AnkiConnect(_))));
    assert!(!err.is_auth());
}

#[tokio::test]
async fn test_store_media_sends_absolute_path() {
    let (server, host) = setup().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slide-01.png");
    std::fs::write(&path, PNG).unwrap();
    let absolute = std::path::absolute(&path).unwrap();

    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "action": "storeMediaFile",
            "params": {
                "filename": "slide-01.png",
                "path": absolute.to_string_lossy()
            }
        })))
        .respond_with(mock_anki_response("slide-01.png"))
        .expect(1)
        .mount(&server)
        .await;

    let stored = host.store_media(&path).await.unwrap();
    assert_eq!(stored, "slide-01.png");
}

#[tokio::test]
async fn test_permission_denied_is_auth() {
    let (server, host) = setup().await;
    mock_action(
        &server,
        "createDeck",
        mock_anki_error("valid api key must be provided; permission denied"),
    )
    .await;

    let err = host.ensure_deck("Bio").await.unwrap_err();
    assert!(matches!(err, Error::Host(ankit::Error::PermissionDenied)));
    assert!(err.is_auth());
}

#[tokio::test]
async fn test_media_directory_failure_is_reported() {
    let (server, host) = setup().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = host.open_media_folder().await.unwrap_err();
    assert!(matches!(err, Error::Host(_)));
}

#[tokio::test]
async fn test_note_fields() {
    let (server, host) = setup().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "action": "modelFieldNames",
            "params": { "modelName": "AnKing MCQ" }
        })))
        .respond_with(mock_anki_response(vec![
            "Question",
            "Multiple Choice",
            "Correct Answers",
            "Extra",
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let fields = host.note_fields("AnKing MCQ").await.unwrap();
    assert_eq!(fields[0], "Question");
    assert_eq!(fields.len(), 4);
}

#[tokio::test]
async fn test_note_fields_of_missing_note_type() {
    let (server, host) = setup().await;
    mock_action(&server, "modelFieldNames", mock_anki_error("model was not found: Nope")).await;

    let err = host.note_fields("Nope").await.unwrap_err();
    assert!(matches!(err, Error::Host(ankit::Error::AnkiConnect(ref m)) if m.contains("not found")));
}

#[tokio::test]
async fn test_note_type_name_from_legacy_id() {
    let (server, host) = setup().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({ "action": "modelNamesAndIds" })))
        .respond_with(mock_anki_response(serde_json::json!({
            "Basic": 1_483_883_011_648_i64,
            "AnKing MCQ": 1_700_000_000_000_i64
        })))
        .expect(2)
        .mount(&server)
        .await;

    assert_eq!(
        host.note_type_name(1_700_000_000_000).await.unwrap().as_deref(),
        Some("AnKing MCQ")
    );
    assert_eq!(host.note_type_name(5).await.unwrap(), None);
}
