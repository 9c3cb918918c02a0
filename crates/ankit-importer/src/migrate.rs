//! Additive, idempotent upgrade of a persisted configuration document.
//!
//! The migrator works on the raw JSON so it can repair documents the typed
//! [`Config`] would reject. The rules:
//!
//! - a missing key, a `null`, or an empty string takes the default value
//! - a value of the wrong JSON type is replaced with the default and reported
//! - any format without a profile gets its factory profile
//! - a built-in profile gets a default field-map entry only if the document
//!   predates the release that introduced it, so a mapping the user removed
//!   stays removed
//! - an existing non-empty value is never overwritten
//! - keys this release does not know are kept as they are
//!
//! Migration cannot fail: an unreadable document becomes the default
//! configuration.

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::{CURRENT_VERSION, Config};
use crate::format::Format;
use crate::profile::Profile;
use crate::prompts;

/// What a migration run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Version found in the document. `0` when there was no document, `1` for
    /// documents written before versioning.
    pub from_version: u32,
    /// A default configuration replaced a missing or unreadable document.
    pub reset: bool,
    /// Factory profiles added because their format had no profile.
    pub seeded_profiles: Vec<String>,
    /// Dotted paths of values filled in from defaults.
    pub backfilled: Vec<String>,
    /// Dotted paths of values of the wrong type that were replaced.
    pub repaired: Vec<String>,
    /// Profile entries that could not be read.
    pub dropped: Vec<String>,
}

impl MigrationReport {
    /// Whether the migrated configuration differs from the stored document.
    pub fn changed(&self) -> bool {
        self.reset
            || self.from_version < CURRENT_VERSION
            || !self.seeded_profiles.is_empty()
            || !self.backfilled.is_empty()
            || !self.repaired.is_empty()
            || !self.dropped.is_empty()
    }
}

/// Migrate a configuration document given as text.
pub fn migrate_str(text: &str) -> (Config, MigrationReport) {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => migrate(Some(value)),
        Err(e) => {
            warn!(error = %e, "Configuration is not valid JSON, using defaults");
            fresh(1)
        }
    }
}

/// Migrate a parsed configuration document. `None` means there is none yet.
pub fn migrate(document: Option<Value>) -> (Config, MigrationReport) {
    let Some(document) = document else {
        return fresh(0);
    };
    let Value::Object(mut doc) = document else {
        warn!("Configuration is not an object, using defaults");
        return fresh(1);
    };

    let from_version = match doc.get("config_version").and_then(Value::as_u64) {
        Some(v) => u32::try_from(v).unwrap_or(u32::MAX),
        None => 1,
    };
    let mut report = MigrationReport {
        from_version,
        ..Default::default()
    };

    let defaults = match serde_json::to_value(Config::default()) {
        Ok(Value::Object(map)) => map,
        _ => return fresh(from_version),
    };
    for (key, default) in defaults {
        if matches!(key.as_str(), "config_version" | "profiles" | "active_profile") {
            continue;
        }
        merge_key(&mut doc, &key, default, &key, &mut report);
    }
    check_note_type_id(&mut doc, &mut report);

    let profiles = migrate_profiles(doc.remove("profiles"), from_version, &mut report);
    fix_active(&mut doc, &profiles, &mut report);
    doc.insert("profiles".to_string(), Value::Object(profiles));
    doc.insert(
        "config_version".to_string(),
        Value::from(from_version.max(CURRENT_VERSION)),
    );

    match serde_json::from_value::<Config>(Value::Object(doc)) {
        Ok(config) => {
            if report.changed() {
                info!(
                    from_version,
                    seeded = report.seeded_profiles.len(),
                    backfilled = report.backfilled.len(),
                    repaired = report.repaired.len(),
                    dropped = report.dropped.len(),
                    "Configuration migrated"
                );
            }
            (config, report)
        }
        Err(e) => {
            warn!(error = %e, "Configuration could not be read after migration, using defaults");
            fresh(from_version)
        }
    }
}

fn fresh(from_version: u32) -> (Config, MigrationReport) {
    let config = Config::default();
    let report = MigrationReport {
        from_version,
        reset: true,
        seeded_profiles: config.profiles.list(None).map(|p| p.name.clone()).collect(),
        ..Default::default()
    };
    (config, report)
}

/// Whether `value` can stand in for a key whose default is `default`.
fn same_kind(value: &Value, default: &Value) -> bool {
    match (value, default) {
        // Optional strings default to null.
        (Value::Null | Value::String(_), Value::Null) => true,
        (Value::Bool(_), Value::Bool(_)) => true,
        (Value::String(_), Value::String(_)) => true,
        (Value::Number(n), Value::Number(_)) => n.as_u64().is_some_and(|v| v <= u64::from(u32::MAX)),
        (Value::Object(_), Value::Object(_)) => true,
        (Value::Array(_), Value::Array(_)) => true,
        _ => false,
    }
}

fn is_blank(value: &Value, default: &Value) -> bool {
    match value {
        Value::Null => !default.is_null(),
        Value::String(s) => s.trim().is_empty() && default.as_str().is_some_and(|d| !d.is_empty()),
        _ => false,
    }
}

fn merge_key(
    doc: &mut Map<String, Value>,
    key: &str,
    default: Value,
    path: &str,
    report: &mut MigrationReport,
) {
    let Some(existing) = doc.get_mut(key) else {
        doc.insert(key.to_string(), default);
        report.backfilled.push(path.to_string());
        return;
    };

    if is_blank(existing, &default) {
        *existing = default;
        report.backfilled.push(path.to_string());
        return;
    }
    if !same_kind(existing, &default) {
        *existing = default;
        report.repaired.push(path.to_string());
        return;
    }
    if let (Value::Object(inner), Value::Object(defaults)) = (existing, default) {
        for (child, child_default) in defaults {
            let child_path = format!("{}.{}", path, child);
            merge_key(inner, &child, child_default, &child_path, report);
        }
    }
}

/// The legacy note type id stays until the host resolves it to a name.
fn check_note_type_id(doc: &mut Map<String, Value>, report: &mut MigrationReport) {
    let Some(id) = doc.get("note_type_id") else {
        return;
    };
    if id.is_null() || id.as_i64().is_some() {
        return;
    }
    doc.remove("note_type_id");
    report.repaired.push("note_type_id".to_string());
}

fn migrate_profiles(
    raw: Option<Value>,
    from_version: u32,
    report: &mut MigrationReport,
) -> Map<String, Value> {
    let raw = match raw {
        Some(Value::Object(map)) => map,
        None | Some(Value::Null) => Map::new(),
        Some(_) => {
            report.repaired.push("profiles".to_string());
            Map::new()
        }
    };

    let mut kept = Map::new();
    for (name, entry) in raw {
        if name.trim().is_empty() {
            report.dropped.push(name);
            continue;
        }
        let Value::Object(mut entry) = entry else {
            report.dropped.push(name);
            continue;
        };
        let factory_format = prompts::builtin_format(&name);
        let stored_format = entry
            .get("format")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Format>().ok());
        let Some(format) = stored_format.or(factory_format) else {
            report.dropped.push(name);
            continue;
        };
        migrate_profile(&name, &mut entry, format, factory_format, from_version, report);
        kept.insert(name, Value::Object(entry));
    }

    for format in Format::ALL {
        let has_format = kept
            .values()
            .any(|e| e.get("format").and_then(Value::as_str) == Some(format.as_str()));
        if has_format {
            continue;
        }
        let mut profile = Profile::factory(format);
        if kept.contains_key(&profile.name) {
            profile.name = format!("{} (built-in)", profile.name);
        }
        report.seeded_profiles.push(profile.name.clone());
        kept.insert(profile.name.clone(), factory_entry(&profile));
    }

    kept
}

fn migrate_profile(
    name: &str,
    entry: &mut Map<String, Value>,
    format: Format,
    factory_format: Option<Format>,
    from_version: u32,
    report: &mut MigrationReport,
) {
    let path = |key: &str| format!("profiles.{}.{}", name, key);

    if entry.get("format").and_then(Value::as_str) != Some(format.as_str()) {
        entry.insert("format".to_string(), Value::from(format.as_str()));
        report.repaired.push(path("format"));
    }

    let builtin = match entry.get("builtin") {
        Some(Value::Bool(b)) => *b,
        _ => {
            let b = factory_format == Some(format);
            entry.insert("builtin".to_string(), Value::Bool(b));
            report.backfilled.push(path("builtin"));
            b
        }
    };

    let prompt_ok = match entry.get("prompt") {
        Some(Value::String(s)) => !(builtin && s.trim().is_empty()),
        _ => false,
    };
    if !prompt_ok {
        entry.insert(
            "prompt".to_string(),
            Value::from(prompts::factory_prompt(format)),
        );
        report.backfilled.push(path("prompt"));
    }

    let mut field_map = match entry.remove("field_map") {
        Some(Value::Object(map)) => map,
        other => {
            let map: Map<String, Value> = prompts::default_mappings(format)
                .iter()
                .map(|m| (m.slot.as_str().to_string(), Value::from(m.field)))
                .collect();
            if other.is_some() {
                report.repaired.push(path("field_map"));
            } else {
                report.backfilled.push(path("field_map"));
            }
            entry.insert("field_map".to_string(), Value::Object(map));
            return finish_profile(entry, name, report);
        }
    };

    let before = field_map.len();
    field_map.retain(|_, v| v.is_string());
    if field_map.len() != before {
        report.repaired.push(path("field_map"));
    }

    if builtin {
        for m in prompts::default_mappings(format) {
            if m.since > from_version && !field_map.contains_key(m.slot.as_str()) {
                field_map.insert(m.slot.as_str().to_string(), Value::from(m.field));
                report
                    .backfilled
                    .push(format!("profiles.{}.field_map.{}", name, m.slot));
            }
        }
    }
    entry.insert("field_map".to_string(), Value::Object(field_map));
    finish_profile(entry, name, report);
}

fn finish_profile(entry: &mut Map<String, Value>, name: &str, report: &mut MigrationReport) {
    if let Some(note_type) = entry.get("note_type") {
        if !matches!(note_type, Value::String(_) | Value::Null) {
            entry.remove("note_type");
            report.repaired.push(format!("profiles.{}.note_type", name));
        }
    }
}

fn factory_entry(profile: &Profile) -> Value {
    let field_map: Map<String, Value> = profile
        .field_map
        .iter()
        .map(|(slot, field)| (slot.to_string(), Value::from(field)))
        .collect();
    serde_json::json!({
        "format": profile.format,
        "prompt": profile.prompt,
        "field_map": field_map,
        "builtin": true,
    })
}

fn fix_active(
    doc: &mut Map<String, Value>,
    profiles: &Map<String, Value>,
    report: &mut MigrationReport,
) {
    let current = doc.get("active_profile");
    if let Some(Value::String(name)) = current {
        if profiles.contains_key(name) {
            return;
        }
    }

    let fallback = profiles
        .iter()
        .find(|(_, e)| e.get("builtin") == Some(&Value::Bool(true)))
        .or_else(|| profiles.iter().next())
        .map(|(name, _)| name.clone())
        .unwrap_or_default();

    if current.is_none() {
        report.backfilled.push("active_profile".to_string());
    } else {
        report.repaired.push("active_profile".to_string());
    }
    doc.insert("active_profile".to_string(), Value::String(fallback));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Slot;
    use crate::profile::{FieldMap, ProfileUpdate};
    use serde_json::json;

    fn roundtrip(config: &Config) -> Value {
        serde_json::to_value(config).unwrap()
    }

    /// A document as written by the release before profiles existed.
    fn legacy_document() -> Value {
        json!({
            "api_key": "AIzaSyLEGACY00000000000000000000000000",
            "model": "gemini-1.5-flash",
            "note_type_id": 1700000000000_i64,
            "github_repo": "someone/anki-mcq-note-type",
            "show_welcome": false,
            "auto_open_media": false,
            "batch_size": 25,
            "validate_api_on_startup": true
        })
    }

    #[test]
    fn test_no_document_gives_defaults() {
        let (config, report) = migrate(None);
        assert_eq!(config, Config::default());
        assert!(report.reset);
        assert_eq!(report.seeded_profiles.len(), 3);
    }

    #[test]
    fn test_non_object_gives_defaults() {
        for doc in [json!([1, 2, 3]), json!("config"), json!(42), Value::Null] {
            let (config, report) = migrate(Some(doc));
            assert_eq!(config, Config::default());
            assert!(report.reset);
        }
    }

    #[test]
    fn test_legacy_values_survive() {
        let (config, report) = migrate(Some(legacy_document()));
        assert!(!report.reset);
        assert_eq!(report.from_version, 1);
        assert_eq!(config.api_key, "AIzaSyLEGACY00000000000000000000000000");
        assert_eq!(config.model, "gemini-1.5-flash");
        assert!(!config.auto_open_media);
        assert_eq!(config.batch_size, 25);
        assert!(config.validate_api_on_startup);
        assert_eq!(config.config_version, CURRENT_VERSION);
        assert_eq!(report.seeded_profiles.len(), 3);
        assert_eq!(config.profiles.active_name(), "Default MCQ");
        assert_eq!(config.note_type_id, Some(1700000000000));
        assert_eq!(config.extra["github_repo"], "someone/anki-mcq-note-type");
        assert_eq!(config.extra["show_welcome"], false);
    }

    #[test]
    fn test_legacy_keys_survive_serialization() {
        let (config, _) = migrate(Some(legacy_document()));
        let saved = roundtrip(&config);
        assert_eq!(saved["note_type_id"], 1700000000000_i64);
        assert_eq!(saved["github_repo"], "someone/anki-mcq-note-type");
        assert_eq!(saved["show_welcome"], false);
        assert!(saved["profiles"].is_object());
        assert!(saved.get("extra").is_none());
    }

    #[test]
    fn test_unusable_note_type_id_is_repaired() {
        let mut doc = legacy_document();
        doc["note_type_id"] = json!("1700000000000");
        let (config, report) = migrate(Some(doc));
        assert_eq!(config.note_type_id, None);
        assert!(report.repaired.contains(&"note_type_id".to_string()));
        assert!(config.extra.get("note_type_id").is_none());
    }

    #[test]
    fn test_idempotent() {
        let (once, _) = migrate(Some(legacy_document()));
        let (twice, report) = migrate(Some(roundtrip(&once)));
        assert_eq!(once, twice);
        assert!(!report.changed());
    }

    #[test]
    fn test_idempotent_for_every_builtin_format() {
        let mut doc = roundtrip(&Config::default());
        doc["config_version"] = json!(2);
        let (once, first) = migrate(Some(doc));
        assert!(first.changed());
        let (twice, second) = migrate(Some(roundtrip(&once)));
        assert_eq!(once, twice);
        assert!(!second.changed());
    }

    #[test]
    fn test_custom_edits_are_never_overwritten() {
        let mut config = Config::default();
        config
            .profiles
            .update(
                "Default MCQ",
                ProfileUpdate {
                    prompt: Some("my own MCQ prompt".into()),
                    field_map: Some(
                        [(Slot::Question, "Front".to_string())].into_iter().collect(),
                    ),
                    ..Default::default()
                },
            )
            .unwrap();
        config
            .profiles
            .create("Custom Cloze", Format::Cloze, "cloze please", FieldMap::new())
            .unwrap();
        config.profiles.set_active("Custom Cloze").unwrap();

        let (migrated, _) = migrate(Some(roundtrip(&config)));
        let mcq = migrated.profiles.get("Default MCQ").unwrap();
        assert_eq!(mcq.prompt, "my own MCQ prompt");
        assert_eq!(mcq.field_map.get(Slot::Question), Some("Front"));
        // Current-version document: removed mappings stay removed.
        assert_eq!(mcq.field_map.get(Slot::Extra), None);

        let custom = migrated.profiles.get("Custom Cloze").unwrap();
        assert_eq!(custom.prompt, "cloze please");
        assert!(custom.field_map.is_empty());
        assert_eq!(migrated.profiles.active_name(), "Custom Cloze");
    }

    #[test]
    fn test_backfills_mapping_introduced_later() {
        let doc = json!({
            "config_version": 2,
            "active_profile": "Default MCQ",
            "profiles": {
                "Default MCQ": {
                    "format": "mcq",
                    "prompt": "edited",
                    "builtin": true,
                    "field_map": {
                        "question": "Q",
                        "choices": "Choices",
                        "correct_answers": "Answer"
                    }
                }
            }
        });
        let (config, report) = migrate(Some(doc));
        let mcq = config.profiles.get("Default MCQ").unwrap();
        assert_eq!(mcq.prompt, "edited");
        assert_eq!(mcq.field_map.get(Slot::Question), Some("Q"));
        assert_eq!(mcq.field_map.get(Slot::Extra), Some("Extra"));
        assert!(report
            .backfilled
            .contains(&"profiles.Default MCQ.field_map.extra".to_string()));
        assert_eq!(
            report.seeded_profiles,
            vec!["Default Cloze".to_string(), "Default Basic".to_string()]
        );
    }

    #[test]
    fn test_empty_builtin_prompt_is_restored() {
        let mut doc = roundtrip(&Config::default());
        doc["profiles"]["Default Basic"]["prompt"] = json!("   ");
        let (config, report) = migrate(Some(doc));
        assert_eq!(
            config.profiles.get("Default Basic").unwrap().prompt,
            prompts::factory_prompt(Format::Basic)
        );
        assert!(report.backfilled.contains(&"profiles.Default Basic.prompt".to_string()));
    }

    #[test]
    fn test_blank_and_wrong_typed_keys() {
        let mut doc = roundtrip(&Config::default());
        doc["model"] = json!("");
        doc["batch_size"] = json!("ten");
        doc["auto_open_media"] = Value::Null;
        doc["retry"] = json!({"max_retries": 3});
        let (config, report) = migrate(Some(doc));

        assert_eq!(config.model, ankit_gemini::DEFAULT_MODEL);
        assert_eq!(config.batch_size, 10);
        assert!(config.auto_open_media);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.backoff_ms, 1000);
        assert!(report.repaired.contains(&"batch_size".to_string()));
        assert!(report.backfilled.contains(&"model".to_string()));
        assert!(report.backfilled.contains(&"retry.backoff_ms".to_string()));
    }

    #[test]
    fn test_unreadable_profiles_are_dropped() {
        let mut doc = roundtrip(&Config::default());
        doc["profiles"]["Broken"] = json!("not an object");
        doc["profiles"]["Essay"] = json!({"format": "essay", "prompt": "x"});
        doc["profiles"]["Default Cloze"].as_object_mut().unwrap().remove("format");
        let (config, report) = migrate(Some(doc));

        assert!(report.dropped.contains(&"Broken".to_string()));
        assert!(report.dropped.contains(&"Essay".to_string()));
        // A factory name recovers its format.
        assert_eq!(config.profiles.get("Default Cloze").unwrap().format, Format::Cloze);
        assert_eq!(config.profiles.len(), 3);
    }

    #[test]
    fn test_seeding_avoids_name_collisions() {
        let doc = json!({
            "config_version": CURRENT_VERSION,
            "profiles": {
                "Default Cloze": {"format": "basic", "prompt": "p", "builtin": false, "field_map": {}}
            }
        });
        let (config, report) = migrate(Some(doc));
        assert!(report.seeded_profiles.contains(&"Default Cloze (built-in)".to_string()));
        let seeded = config.profiles.get("Default Cloze (built-in)").unwrap();
        assert_eq!(seeded.format, Format::Cloze);
        assert!(seeded.builtin);
        // The user's profile keeps its name and format.
        assert_eq!(config.profiles.get("Default Cloze").unwrap().format, Format::Basic);
    }

    #[test]
    fn test_dangling_active_profile_is_repaired() {
        let mut doc = roundtrip(&Config::default());
        doc["active_profile"] = json!("Deleted Long Ago");
        let (config, report) = migrate(Some(doc));
        assert_eq!(config.profiles.active_name(), "Default MCQ");
        assert!(report.repaired.contains(&"active_profile".to_string()));
    }

    #[test]
    fn test_unknown_keys_are_kept() {
        let mut doc = roundtrip(&Config::default());
        doc["future_setting"] = json!({"nested": true});
        let (config, report) = migrate(Some(doc));
        assert!(!report.changed());
        assert_eq!(config.extra["future_setting"], json!({"nested": true}));
        assert_eq!(config.profiles, Config::default().profiles);
        assert_eq!(roundtrip(&config)["future_setting"]["nested"], true);
    }

    #[test]
    fn test_garbage_text() {
        let (config, report) = migrate_str("not json at all");
        assert!(report.reset);
        assert_eq!(config, Config::default());
    }
}
