//! Command definitions and argument parsing.

use std::path::PathBuf;

use ankit_importer::Format;
use clap::{Parser, Subcommand};

/// Turn folders of study images into Anki notes.
#[derive(Debug, Parser)]
#[command(name = "ankit-import")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(long, env = "ANKIT_IMPORT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// AnkiConnect URL
    #[arg(long, default_value = ankit::client::DEFAULT_URL, global = true)]
    pub anki_url: String,

    /// Enable verbose logging (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate notes from every image in a folder
    Import(ImportArgs),

    /// Manage prompt profiles
    Profiles {
        #[command(subcommand)]
        command: ProfileCommand,
    },

    /// List generation models available to the API key
    Models,

    /// Check the connection to Anki and to the generation API
    Check,

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Parser)]
pub struct ImportArgs {
    /// Folder holding the images
    pub folder: PathBuf,

    /// Root deck; subtopics become subdecks below it
    #[arg(short, long)]
    pub deck: String,

    /// Profile to use instead of the active one
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Note type to create
    #[arg(long)]
    pub note_type: Option<String>,

    /// Generation model to use for this run
    #[arg(long)]
    pub model: Option<String>,

    /// Tag added to every note (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Store each source image and link it in the extra field
    #[arg(long)]
    pub attach_image: bool,

    /// Do not open the media folder afterwards
    #[arg(long)]
    pub no_open_media: bool,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// List profiles
    List {
        /// Only profiles of this format
        #[arg(long)]
        format: Option<Format>,
    },

    /// Show one profile, including its prompt
    Show { name: String },

    /// Create a custom profile
    Create {
        name: String,

        /// Output format: mcq, cloze or basic
        #[arg(long)]
        format: Format,

        /// Read the prompt from a file (defaults to the format's stock prompt)
        #[arg(long)]
        prompt_file: Option<PathBuf>,

        /// Route a slot to a note field, as slot=Field (repeatable)
        #[arg(long = "map", value_parser = parse_mapping)]
        mappings: Vec<(String, String)>,
    },

    /// Change a profile's prompt, field map or note type
    Update {
        name: String,

        /// Read the new prompt from a file
        #[arg(long)]
        prompt_file: Option<PathBuf>,

        /// Route a slot to a note field, as slot=Field; slot= unmaps it
        #[arg(long = "map", value_parser = parse_mapping)]
        mappings: Vec<(String, String)>,

        /// Note type override for this profile
        #[arg(long, conflicts_with = "clear_note_type")]
        note_type: Option<String>,

        /// Remove the note type override
        #[arg(long)]
        clear_note_type: bool,
    },

    /// Delete a custom profile
    Delete { name: String },

    /// Copy a profile under a new name
    Duplicate { name: String, new_name: String },

    /// Restore a built-in profile's stock prompt
    Reset { name: String },

    /// Make a profile the active one
    Use { name: String },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the configuration (API key masked)
    Show,

    /// Print the configuration file path
    Path,

    /// Change one setting
    Set {
        /// api-key, model, note-type, auto-open-media, batch-size,
        /// validate-api-on-startup, attach-source-image, allow-duplicates,
        /// max-image-mb, max-retries or backoff-ms
        key: String,
        value: String,
    },
}

fn parse_mapping(s: &str) -> Result<(String, String), String> {
    let (slot, field) = s
        .split_once('=')
        .ok_or_else(|| format!("expected slot=Field, got '{}'", s))?;
    let slot = slot.trim();
    if slot.is_empty() {
        return Err(format!("missing slot in '{}'", s));
    }
    Ok((slot.to_string(), field.trim().to_string()))
}
