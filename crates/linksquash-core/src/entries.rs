//! Editable entry list backing the alias editor.
//!
//! Entries carry an identifier that is generated once and never derived from
//! their content, so two entries may share an empty or duplicate path while
//! being edited without the UI losing track of which one has focus.

use crate::aliases::AliasMap;

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EntryIdError {
    #[error("Invalid entry ID: {0}")]
    InvalidFormat(#[from] uuid::Error),
}

/// Stable identity of one editable entry.
///
/// Displays as a hyphenated UUID, which is also its JSON form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for EntryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for EntryId {
    type Err = EntryIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Serialize for EntryId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EntryId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Which input of an entry is being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryField {
    Path,
    Url,
}

impl FromStr for EntryField {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "path" => Ok(Self::Path),
            "url" => Ok(Self::Url),
            other => Err(EntryError::UnknownField(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum EntryError {
    #[error("No entry with id {0}")]
    NotFound(EntryId),

    #[error("Unknown field: {0} (expected 'path' or 'url')")]
    UnknownField(String),
}

/// One editable (path, url) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub id: EntryId,
    pub path: String,
    pub url: String,
}

impl Entry {
    fn new(path: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: EntryId::generate(),
            path: path.into(),
            url: url.into(),
        }
    }

    /// Blank paths are left out of the persisted mapping.
    pub fn is_blank(&self) -> bool {
        self.path.trim().is_empty()
    }
}

/// Whether a keydown in the path input should be swallowed.
///
/// Aliases are single path segments; `/` would create nested-looking routes.
pub fn is_suppressed_path_key(key: &str) -> bool {
    key == "/"
}

/// Whether a keydown commits the field (treated as blur).
pub fn is_commit_key(key: &str) -> bool {
    key == "Enter"
}

/// Drop any `/` that reached a path value without a keystroke (paste, autofill).
pub fn sanitize_path(value: &str) -> String {
    value.chars().filter(|c| *c != '/').collect()
}

/// Insertion-ordered collection of entries.
#[derive(Debug, Clone, Default)]
pub struct EntryList {
    entries: Vec<Entry>,
}

impl EntryList {
    pub fn new() -> Self {
        Self::default()
    }

    /// One entry per alias, each with a fresh identifier.
    pub fn seeded(aliases: &AliasMap) -> Self {
        let mut list = Self::new();
        list.replace_all(aliases);
        list
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Append an empty entry and return its id.
    pub fn add(&mut self) -> EntryId {
        let entry = Entry::new("", "");
        let id = entry.id;
        self.entries.push(entry);
        id
    }

    /// Overwrite one field of an entry in place.
    pub fn update_field(&mut self, id: EntryId, field: EntryField, value: &str) -> Result<(), EntryError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(EntryError::NotFound(id))?;
        match field {
            EntryField::Path => entry.path = sanitize_path(value),
            EntryField::Url => entry.url = value.to_string(),
        }
        Ok(())
    }

    /// Remove the entry with this id, leaving every other entry in place.
    pub fn remove(&mut self, id: EntryId) -> Result<Entry, EntryError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(EntryError::NotFound(id))?;
        Ok(self.entries.remove(index))
    }

    /// Discard every entry and reseed from `aliases` with fresh identifiers.
    pub fn replace_all(&mut self, aliases: &AliasMap) {
        self.entries = aliases
            .iter()
            .map(|(path, url)| Entry::new(path.as_str(), url.as_str()))
            .collect();
    }

    /// Project into the persisted mapping shape.
    ///
    /// Blank paths are skipped; for duplicate paths the later entry wins.
    pub fn project(&self) -> AliasMap {
        let mut aliases = AliasMap::new();
        for entry in self.entries.iter().filter(|e| !e.is_blank()) {
            aliases.insert(entry.path.clone(), entry.url.clone());
        }
        aliases
    }
}
