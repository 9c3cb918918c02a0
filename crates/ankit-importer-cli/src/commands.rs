//! Command implementations.

use std::path::Path;

use ankit::AnkiClient;
use ankit_gemini::GeminiClient;
use ankit_importer::{
    AnkiHost, Config, ConfigFile, FieldMap, ImageOutcome, ImportEvent, ImportOptions,
    ImportRequest, ImportSummary, Importer, Profile, ProfileUpdate, RunState, prompts,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{ConfigCommand, ImportArgs, ProfileCommand};

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Loaded configuration and where it lives.
pub struct Session {
    pub file: ConfigFile,
    pub config: Config,
    pub anki_url: String,
}

impl Session {
    pub fn load(path: Option<&Path>, anki_url: String) -> CliResult<Self> {
        let file = match path {
            Some(path) => ConfigFile::new(path),
            None => ConfigFile::new(
                ConfigFile::default_path().ok_or("no configuration directory on this system")?,
            ),
        };
        let (config, report) = file.load()?;
        if report.changed() {
            info!(
                path = %file.path().display(),
                from_version = report.from_version,
                seeded = report.seeded_profiles.len(),
                backfilled = report.backfilled.len(),
                "Configuration migrated"
            );
        }
        Ok(Self {
            file,
            config,
            anki_url,
        })
    }

    fn save(&self) -> CliResult {
        self.file.save(&self.config)?;
        Ok(())
    }

    fn anki(&self) -> AnkiClient {
        AnkiClient::builder().url(&self.anki_url).build()
    }

    /// A generation client, checked against the API when so configured.
    async fn gemini(&self) -> CliResult<GeminiClient> {
        let key = self.config.effective_api_key();
        ankit_gemini::validate_api_key(&key)?;
        let client = GeminiClient::builder()
            .api_key(key)
            .model(&self.config.model)
            .retry(self.config.retry.policy())
            .build();
        if self.config.validate_api_on_startup {
            client.test_connection().await?;
            info!(model = client.model(), "API key validated");
        }
        Ok(client)
    }
}

pub async fn import(session: &mut Session, args: ImportArgs) -> CliResult {
    let host = AnkiHost::new(session.anki()).allow_duplicates(session.config.allow_duplicates);
    if args.note_type.is_none() && session.config.needs_note_type_resolution() {
        resolve_legacy_note_type(session, &host).await?;
    }

    let config = &session.config;
    let profile = match args.profile.as_deref() {
        Some(name) => config.profiles.get(name)?,
        None => config.profiles.active()?,
    }
    .clone();
    let note_type = args
        .note_type
        .or_else(|| config.note_type_for(&profile))
        .ok_or("no note type configured; pass --note-type or set note-type")?;

    let gemini = session.gemini().await?;
    let model = gemini.resolve_model(args.model.as_deref()).await?;
    info!(model = %model, note_type = %note_type, "Using model");
    let importer = Importer::new(gemini, host);

    let mut request = ImportRequest::new(args.folder, args.deck, note_type, profile);
    request.model = Some(model);
    request.tags = args.tags;

    let mut options = ImportOptions::from_config(config);
    options.attach_source_image |= args.attach_image;
    if args.no_open_media {
        options.open_media = false;
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the current image");
            on_signal.cancel();
        }
    });

    let summary = importer.run(&request, &options, &cancel, print_event).await?;
    print_summary(&summary);
    Ok(())
}

/// Name the note type a pre-profile configuration stored by id, and keep
/// the name.
async fn resolve_legacy_note_type(session: &mut Session, host: &AnkiHost) -> CliResult {
    let Some(id) = session.config.note_type_id else {
        return Ok(());
    };
    match host.note_type_name(id).await {
        Ok(Some(name)) => {
            info!(note_type_id = id, note_type = %name, "Resolved legacy note type");
            session.config.note_type = Some(name);
            session.save()?;
        }
        Ok(None) => warn!(note_type_id = id, "Legacy note type no longer exists in Anki"),
        Err(e) => warn!(error = %e, note_type_id = id, "Could not resolve legacy note type"),
    }
    Ok(())
}

fn print_event(event: &ImportEvent) {
    match event {
        ImportEvent::ImageStarted {
            position,
            total,
            filename,
        } => eprintln!("[{}/{}] {}", position, total, filename),
        ImportEvent::ImageFinished { report, .. } => match &report.outcome {
            ImageOutcome::Succeeded {
                cards,
                failed_rows,
                warnings,
            } => eprintln!(
                "      {} card(s), {} rejected, {} warning(s)",
                cards, failed_rows, warnings
            ),
            ImageOutcome::Failed { reason, warnings: 0 } => eprintln!("      failed: {}", reason),
            ImageOutcome::Failed { reason, warnings } => {
                eprintln!("      failed: {} ({} warning(s))", reason, warnings)
            }
        },
        ImportEvent::State(_) => {}
    }
}

fn print_summary(summary: &ImportSummary) {
    if summary.state == RunState::Cancelled {
        println!(
            "Cancelled after {} of {} images.",
            summary.processed, summary.total_images
        );
    }
    if let Some(reason) = &summary.aborted {
        println!("Stopped early: {}", reason);
    }
    println!(
        "Created {} card(s) from {} image(s); {} failed, {} warning(s).",
        summary.cards_created, summary.succeeded, summary.failed, summary.warnings
    );
    if !summary.unknown_fields.is_empty() {
        println!(
            "Not on the note type, left empty: {}",
            summary.unknown_fields.join(", ")
        );
    }
    for deck in &summary.subdecks {
        println!("  {}", deck);
    }
    for failure in &summary.failures {
        println!(
            "  ! {} ({}): {}",
            failure.filename, failure.position, failure.reason
        );
    }
}

pub fn profiles(session: &mut Session, command: ProfileCommand) -> CliResult {
    let store = &mut session.config.profiles;
    match command {
        ProfileCommand::List { format } => {
            let active = store.active_name().to_string();
            for profile in store.list(format) {
                let marker = if profile.name == active { "*" } else { " " };
                let kind = if profile.builtin { "built-in" } else { "custom" };
                println!("{} {} [{}, {}]", marker, profile.name, profile.format, kind);
            }
            return Ok(());
        }
        ProfileCommand::Show { name } => {
            print_profile(store.get(&name)?);
            return Ok(());
        }
        ProfileCommand::Create {
            name,
            format,
            prompt_file,
            mappings,
        } => {
            let prompt = match prompt_file {
                Some(path) => std::fs::read_to_string(path)?,
                None => prompts::factory_prompt(format).to_string(),
            };
            let field_map = if mappings.is_empty() {
                FieldMap::defaults(format)
            } else {
                apply_mappings(FieldMap::new(), format, &mappings)?
            };
            let profile = store.create(&name, format, prompt, field_map)?;
            println!("Created profile '{}'", profile.name);
        }
        ProfileCommand::Update {
            name,
            prompt_file,
            mappings,
            note_type,
            clear_note_type,
        } => {
            let current = store.get(&name)?;
            let field_map = if mappings.is_empty() {
                None
            } else {
                Some(apply_mappings(
                    current.field_map.clone(),
                    current.format,
                    &mappings,
                )?)
            };
            let update = ProfileUpdate {
                prompt: prompt_file.map(std::fs::read_to_string).transpose()?,
                field_map,
                note_type: if clear_note_type {
                    Some(None)
                } else {
                    note_type.map(Some)
                },
            };
            store.update(&name, update)?;
            println!("Updated profile '{}'", name);
        }
        ProfileCommand::Delete { name } => {
            store.delete(&name)?;
            println!(
                "Deleted profile '{}'; active profile is '{}'",
                name,
                store.active_name()
            );
        }
        ProfileCommand::Duplicate { name, new_name } => {
            let profile = store.duplicate(&name, &new_name)?;
            println!("Copied '{}' to '{}'", name, profile.name);
        }
        ProfileCommand::Reset { name } => {
            store.reset_to_default(&name)?;
            println!("Restored the stock prompt of '{}'", name);
        }
        ProfileCommand::Use { name } => {
            store.set_active(&name)?;
            println!("Active profile is now '{}'", name);
        }
    }
    session.save()
}

fn apply_mappings(
    mut field_map: FieldMap,
    format: ankit_importer::Format,
    mappings: &[(String, String)],
) -> CliResult<FieldMap> {
    for (slot, field) in mappings {
        let slot = format.slot(slot)?;
        if field.is_empty() {
            field_map.remove(slot);
        } else {
            field_map.set(slot, field.as_str());
        }
    }
    Ok(field_map)
}

fn print_profile(profile: &Profile) {
    println!("Name:      {}", profile.name);
    println!("Format:    {}", profile.format);
    println!("Built-in:  {}", profile.builtin);
    if let Some(note_type) = &profile.note_type {
        println!("Note type: {}", note_type);
    }
    println!("Fields:");
    for (slot, field) in profile.field_map.iter() {
        println!("  {} -> {}", slot, field);
    }
    println!();
    println!("{}", profile.prompt);
}

pub async fn models(session: &Session) -> CliResult {
    let client = session.gemini().await?;
    let configured = session.config.model.as_str();
    for model in client.list_models().await? {
        let marker = if model == configured { "*" } else { " " };
        println!("{} {}", marker, model);
    }
    Ok(())
}

pub async fn check(session: &Session) -> CliResult {
    let anki = session.anki();
    match anki.misc().version().await {
        Ok(version) => {
            println!("Anki: AnkiConnect version {}", version);
            check_note_type(&session.config, &anki).await;
        }
        Err(e) if e.is_unreachable() => {
            println!("Anki: not reachable at {} ({})", session.anki_url, e)
        }
        Err(e) => println!("Anki: {}", e),
    }

    let client = session.gemini().await?;
    let model = client.resolve_model(None).await?;
    client.test_connection().await?;
    println!("Gemini: OK ({})", model);
    Ok(())
}

async fn check_note_type(config: &Config, anki: &AnkiClient) {
    let Ok(profile) = config.profiles.active() else {
        return;
    };
    let Some(note_type) = config.note_type_for(profile) else {
        if config.needs_note_type_resolution() {
            println!("Note type: stored by id, named on the next import");
        } else {
            println!("Note type: none set for profile '{}'", profile.name);
        }
        return;
    };
    match anki.models().names().await {
        Ok(names) if names.contains(&note_type) => println!("Note type: {}", note_type),
        Ok(_) => println!("Note type: '{}' does not exist in Anki", note_type),
        Err(e) => println!("Note type: {}", e),
    }
}

pub fn config(session: &mut Session, command: ConfigCommand) -> CliResult {
    let config = &mut session.config;
    match command {
        ConfigCommand::Show => {
            let mut value = serde_json::to_value(&*config)?;
            if !config.api_key.is_empty() {
                value["api_key"] = serde_json::Value::from(mask(&config.api_key));
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }
        ConfigCommand::Path => {
            println!("{}", session.file.path().display());
            return Ok(());
        }
        ConfigCommand::Set { key, value } => match key.as_str() {
            "api-key" => {
                ankit_gemini::validate_api_key(value.trim())?;
                config.api_key = value.trim().to_string();
            }
            "model" => config.model = value.trim().trim_start_matches("models/").to_string(),
            "note-type" => {
                let value = value.trim();
                config.note_type = (!value.is_empty()).then(|| value.to_string());
            }
            "auto-open-media" => config.auto_open_media = value.parse()?,
            "batch-size" => config.batch_size = value.parse()?,
            "validate-api-on-startup" => config.validate_api_on_startup = value.parse()?,
            "attach-source-image" => config.attach_source_image = value.parse()?,
            "allow-duplicates" => config.allow_duplicates = value.parse()?,
            "max-image-mb" => config.max_image_mb = value.parse()?,
            "max-retries" => config.retry.max_retries = value.parse()?,
            "backoff-ms" => config.retry.backoff_ms = value.parse()?,
            other => return Err(format!("unknown setting '{}'", other).into()),
        },
    }
    session.save()?;
    println!("Saved {}", session.file.path().display());
    Ok(())
}

fn mask(key: &str) -> String {
    let start = key.char_indices().rev().nth(3).map_or(0, |(i, _)| i);
    format!("****{}", &key[start..])
}
