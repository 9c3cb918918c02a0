//! Persisted configuration.
//!
//! The configuration is one JSON document. Loading always goes through
//! [`crate::migrate`], so a document from any earlier release, or a damaged
//! one, still yields a usable [`Config`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ankit_gemini::RetryPolicy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::Result;
use crate::migrate::{self, MigrationReport};
use crate::profile::{Profile, ProfileStore};
use crate::prompts;

/// Version written by this release.
pub const CURRENT_VERSION: u32 = 4;

/// Environment variable overriding the stored API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Process-wide settings plus all profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub config_version: u32,
    pub api_key: String,
    pub model: String,
    /// Note type used when the active profile has no override.
    pub note_type: Option<String>,
    /// Note type chosen by id in releases before note types were named.
    /// Resolved to [`Config::note_type`] once the host can be asked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_type_id: Option<i64>,
    /// Open the media folder after an import that created cards.
    pub auto_open_media: bool,
    /// Log a progress checkpoint every this many images.
    pub batch_size: u32,
    pub validate_api_on_startup: bool,
    /// Store each source image and link it in the extra field.
    pub attach_source_image: bool,
    /// Add notes even when Anki considers them duplicates.
    pub allow_duplicates: bool,
    pub max_image_mb: u32,
    pub retry: RetrySettings,
    #[serde(flatten)]
    pub profiles: ProfileStore,
    /// Keys this release does not know, written back unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: CURRENT_VERSION,
            api_key: String::new(),
            model: ankit_gemini::DEFAULT_MODEL.to_string(),
            note_type: None,
            note_type_id: None,
            auto_open_media: true,
            batch_size: 10,
            validate_api_on_startup: false,
            attach_source_image: false,
            allow_duplicates: false,
            max_image_mb: 20,
            retry: RetrySettings::default(),
            profiles: ProfileStore::with_builtins(),
            extra: Map::new(),
        }
    }
}

impl Config {
    /// Note type for a profile: the profile's override, then the configured
    /// note type, then the stock type of its format.
    pub fn note_type_for(&self, profile: &Profile) -> Option<String> {
        profile
            .note_type
            .as_deref()
            .or(self.note_type.as_deref())
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .or(prompts::default_note_type(profile.format))
            .map(str::to_string)
    }

    /// Whether a legacy note type id is waiting to be resolved to a name.
    pub fn needs_note_type_resolution(&self) -> bool {
        self.note_type_id.is_some() && self.note_type.as_deref().is_none_or(|n| n.trim().is_empty())
    }

    /// Largest accepted image, in bytes.
    pub fn max_image_bytes(&self) -> u64 {
        u64::from(self.max_image_mb) * 1024 * 1024
    }

    /// The API key, with the environment taking precedence over the file.
    pub fn effective_api_key(&self) -> String {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| self.api_key.clone())
            .trim()
            .to_string()
    }
}

/// Retry settings for generation calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff_ms: 1000,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

/// A configuration document on disk.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    /// Use the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/ankit-importer/config.json`, if the platform has a
    /// config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("ankit-importer").join("config.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and migrate the document, writing it back if migration changed
    /// anything.
    ///
    /// A missing file yields the default configuration. Only I/O failures
    /// other than "not found" are errors; unreadable content is replaced.
    pub fn load(&self) -> Result<(Config, MigrationReport)> {
        let (config, report) = match std::fs::read_to_string(&self.path) {
            Ok(text) => migrate::migrate_str(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No configuration found, creating defaults");
                migrate::migrate(None)
            }
            Err(e) => return Err(e.into()),
        };

        if report.changed() {
            self.save(&config)?;
        }
        Ok((config, report))
    }

    /// Write the document atomically: a temp file next to it, then a rename.
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut text = serde_json::to_string_pretty(config)?;
        text.push('\n');

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), "Configuration saved");
        Ok(())
    }
}
