//! Named prompt profiles and the store that holds them.
//!
//! A profile binds a prompt to one [`Format`] and carries the field map that
//! routes parsed slots into note fields. Names are unique across all formats so
//! the active profile can be selected by name alone.
//!
//! # Example
//!
//! ```
//! use ankit_importer::{Format, ProfileStore};
//!
//! # fn example() -> ankit_importer::Result<()> {
//! let mut store = ProfileStore::with_builtins();
//! store.duplicate("Default MCQ", "Pharm MCQ")?;
//! store.set_active("Pharm MCQ")?;
//!
//! assert_eq!(store.active()?.format, Format::Mcq);
//! assert_eq!(store.list(Some(Format::Mcq)).count(), 2);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::format::{Format, Slot};
use crate::prompts;

/// Slot name to destination field name.
///
/// An entry with an empty field name counts as unmapped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<String, String>);

impl FieldMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// The factory field map of a format.
    pub fn defaults(format: Format) -> Self {
        let mut map = Self::new();
        for m in prompts::default_mappings(format) {
            map.set(m.slot, m.field);
        }
        map
    }

    /// Destination field for a slot, if mapped.
    pub fn get(&self, slot: Slot) -> Option<&str> {
        self.0
            .get(slot.as_str())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Map a slot to a field.
    pub fn set(&mut self, slot: Slot, field: impl Into<String>) {
        self.0.insert(slot.as_str().to_string(), field.into());
    }

    /// Unmap a slot. Returns the field it was mapped to.
    pub fn remove(&mut self, slot: Slot) -> Option<String> {
        self.0.remove(slot.as_str())
    }

    /// Iterate over raw entries in slot-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether at least one content slot of `format` is mapped.
    pub fn is_usable_for(&self, format: Format) -> bool {
        format
            .schema()
            .slots
            .iter()
            .any(|s| s.is_content() && self.get(*s).is_some())
    }

    /// Check that every key names a slot of `format`.
    pub fn validate(&self, format: Format) -> Result<()> {
        for key in self.0.keys() {
            format.slot(key)?;
        }
        Ok(())
    }
}

impl FromIterator<(Slot, String)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (Slot, String)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (slot, field) in iter {
            map.set(slot, field);
        }
        map
    }
}

/// A named prompt bound to one format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Unique name.
    pub name: String,
    /// Output format; fixed at creation.
    pub format: Format,
    /// Prompt text sent ahead of each image.
    pub prompt: String,
    /// Slot to note-field routing.
    pub field_map: FieldMap,
    /// Factory profile; cannot be deleted.
    pub builtin: bool,
    /// Note type override for this profile.
    pub note_type: Option<String>,
}

impl Profile {
    /// The factory profile of a format.
    pub fn factory(format: Format) -> Self {
        Self {
            name: prompts::builtin_name(format).to_string(),
            format,
            prompt: prompts::factory_prompt(format).to_string(),
            field_map: FieldMap::defaults(format),
            builtin: true,
            note_type: None,
        }
    }
}

/// Partial update of a profile. `None` leaves a value unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub prompt: Option<String>,
    pub field_map: Option<FieldMap>,
    /// `Some(None)` clears the override.
    pub note_type: Option<Option<String>>,
}

/// Registry of profiles plus the active selection.
///
/// Profiles keep insertion order. Serialized as a `profiles` object keyed by
/// name next to an `active_profile` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStore {
    #[serde(default, with = "profile_map")]
    profiles: Vec<Profile>,
    #[serde(default, rename = "active_profile")]
    active: String,
}

impl ProfileStore {
    /// A store with the three factory profiles, `Default MCQ` active.
    pub fn with_builtins() -> Self {
        Self {
            profiles: Format::ALL.into_iter().map(Profile::factory).collect(),
            active: prompts::DEFAULT_MCQ.to_string(),
        }
    }

    /// Get a profile by name.
    pub fn get(&self, name: &str) -> Result<&Profile> {
        self.position(name)
            .map(|i| &self.profiles[i])
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// Whether a profile with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Profiles in insertion order, optionally restricted to one format.
    pub fn list(&self, format: Option<Format>) -> impl Iterator<Item = &Profile> {
        self.profiles
            .iter()
            .filter(move |p| format.is_none_or(|f| p.format == f))
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the store has no profiles.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Create a custom profile.
    pub fn create(
        &mut self,
        name: &str,
        format: Format,
        prompt: impl Into<String>,
        field_map: FieldMap,
    ) -> Result<&Profile> {
        let name = self.check_new_name(name)?;
        field_map.validate(format)?;
        self.profiles.push(Profile {
            name,
            format,
            prompt: prompt.into(),
            field_map,
            builtin: false,
            note_type: None,
        });
        Ok(&self.profiles[self.profiles.len() - 1])
    }

    /// Update prompt, field map or note type. The format cannot change.
    pub fn update(&mut self, name: &str, update: ProfileUpdate) -> Result<&Profile> {
        let index = self
            .position(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        let profile = &mut self.profiles[index];

        if let Some(field_map) = update.field_map {
            field_map.validate(profile.format)?;
            profile.field_map = field_map;
        }
        if let Some(prompt) = update.prompt {
            profile.prompt = prompt;
        }
        if let Some(note_type) = update.note_type {
            profile.note_type = note_type.filter(|n| !n.trim().is_empty());
        }
        Ok(&self.profiles[index])
    }

    /// Delete a custom profile.
    ///
    /// If it was active, the built-in profile of the same format becomes
    /// active.
    pub fn delete(&mut self, name: &str) -> Result<Profile> {
        let index = self
            .position(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        if self.profiles[index].builtin {
            return Err(Error::ProtectedProfile(name.to_string()));
        }

        let removed = self.profiles.remove(index);
        if self.active == removed.name {
            self.active = self
                .builtin_for(removed.format)
                .or_else(|| self.profiles.first())
                .map(|p| p.name.clone())
                .unwrap_or_default();
        }
        Ok(removed)
    }

    /// Restore a built-in profile's factory prompt. The field map is kept.
    pub fn reset_to_default(&mut self, name: &str) -> Result<&Profile> {
        let index = self
            .position(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        let profile = &mut self.profiles[index];
        if !profile.builtin {
            return Err(Error::NotApplicable(name.to_string()));
        }
        profile.prompt = prompts::factory_prompt(profile.format).to_string();
        Ok(&self.profiles[index])
    }

    /// Copy a profile's format, prompt, field map and note type under a new
    /// name. The copy is always custom.
    pub fn duplicate(&mut self, name: &str, new_name: &str) -> Result<&Profile> {
        let source = self.get(name)?.clone();
        let new_name = self.check_new_name(new_name)?;
        self.profiles.push(Profile {
            name: new_name,
            builtin: false,
            ..source
        });
        Ok(&self.profiles[self.profiles.len() - 1])
    }

    /// The active profile.
    pub fn active(&self) -> Result<&Profile> {
        self.get(&self.active)
    }

    /// Name of the active profile.
    pub fn active_name(&self) -> &str {
        &self.active
    }

    /// Select the active profile, of any format.
    pub fn set_active(&mut self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::InvalidName(name.to_string()));
        }
        let profile = self.get(name)?;
        self.active = profile.name.clone();
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.profiles.iter().position(|p| p.name == name)
    }

    fn builtin_for(&self, format: Format) -> Option<&Profile> {
        self.profiles
            .iter()
            .find(|p| p.builtin && p.format == format)
    }

    fn check_new_name(&self, name: &str) -> Result<String> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidName(name.to_string()));
        }
        if self.contains(trimmed) {
            return Err(Error::DuplicateName(trimmed.to_string()));
        }
        Ok(trimmed.to_string())
    }
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// A profile as stored under its name in the `profiles` object.
#[derive(Serialize, Deserialize)]
struct ProfileEntry {
    format: Format,
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    field_map: FieldMap,
    #[serde(default)]
    builtin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    note_type: Option<String>,
}

mod profile_map {
    use super::*;

    pub fn serialize<S: Serializer>(profiles: &[Profile], serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(profiles.len()))?;
        for p in profiles {
            let entry = ProfileEntry {
                format: p.format,
                prompt: p.prompt.clone(),
                field_map: p.field_map.clone(),
                builtin: p.builtin,
                note_type: p.note_type.clone(),
            };
            map.serialize_entry(&p.name, &entry)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<Profile>, D::Error> {
        deserializer.deserialize_map(ProfileMapVisitor)
    }

    struct ProfileMapVisitor;

    impl<'de> Visitor<'de> for ProfileMapVisitor {
        type Value = Vec<Profile>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an object of profiles keyed by name")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
            let mut profiles: Vec<Profile> = Vec::new();
            while let Some((name, entry)) = access.next_entry::<String, ProfileEntry>()? {
                let profile = Profile {
                    name,
                    format: entry.format,
                    prompt: entry.prompt,
                    field_map: entry.field_map,
                    builtin: entry.builtin,
                    note_type: entry.note_type,
                };
                match profiles.iter_mut().find(|p| p.name == profile.name) {
                    Some(existing) => *existing = profile,
                    None => profiles.push(profile),
                }
            }
            Ok(profiles)
        }
    }
}
