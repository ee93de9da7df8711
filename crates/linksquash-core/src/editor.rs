//! Editor: the state container behind the alias editing page.
//!
//! Owns one `EntryList`, one `AliasStore` handle and one `SyncEngine`. All
//! state changes go through `apply`, so structural changes (add, remove) and
//! field edits follow one path:
//!
//! ```text
//! EditorAction ──apply──> EntryList ──SyncEngine──> AliasStore ──> KeyValueStore
//!                                         │
//!                             debounced (Edit) / immediate (Blur, Remove)
//! ```
//!
//! The entry list is seeded from the store once, at construction. Store
//! changes made elsewhere are not observed; call `reseed` to pick them up.

use crate::aliases::{AliasMap, AliasStore};
use crate::config::LinksquashConfig;
use crate::csv::{self, CsvExport, ExportError, ImportError, ImportMode, ImportReport};
use crate::entries::{Entry, EntryError, EntryField, EntryId, EntryList};
use crate::kv::KeyValueStore;
use crate::persistence::PersistenceError;
use crate::sync::{SyncEngine, SyncStats, SyncTrigger};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::info;
use web_time::Instant;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Entry(#[from] EntryError),

    #[error("Failed to save aliases: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Error importing CSV: {0}")]
    Import(#[from] ImportError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

pub type Result<T> = std::result::Result<T, EditorError>;

/// Something the user did in the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    /// "Add new alias"
    Add,
    /// Keystroke-level change of one field
    Edit {
        id: EntryId,
        field: EntryField,
        value: String,
    },
    /// A field lost focus (or Enter was pressed)
    Blur,
    /// Delete button of an entry
    Remove { id: EntryId },
    /// Timer tick; writes debounced edits that are due
    Tick,
}

pub struct Editor<S> {
    entries: EntryList,
    aliases: AliasStore<S>,
    sync: SyncEngine,
    export_prefix: String,
}

impl<S: KeyValueStore> Editor<S> {
    /// Create an editor seeded from the current contents of `aliases`.
    pub fn new(aliases: AliasStore<S>, config: &LinksquashConfig) -> Self {
        let entries = EntryList::seeded(&aliases.get());
        Self {
            entries,
            aliases,
            sync: SyncEngine::new(config.debounce()),
            export_prefix: config.export_file_prefix.clone(),
        }
    }

    /// Apply one action. Returns the id of the entry the action created, if any.
    pub fn apply(&mut self, action: EditorAction, now: Instant) -> Result<Option<EntryId>> {
        match action {
            EditorAction::Add => return Ok(Some(self.add())),
            EditorAction::Edit { id, field, value } => self.edit(id, field, &value, now)?,
            EditorAction::Blur => self.blur()?,
            EditorAction::Remove { id } => {
                self.remove(id)?;
            }
            EditorAction::Tick => {
                self.poll(now)?;
            }
        }
        Ok(None)
    }

    /// Append an empty entry. Nothing is written until it gets content.
    pub fn add(&mut self) -> EntryId {
        self.entries.add()
    }

    /// Change a field and start (or restart) its debounce timer.
    pub fn edit(&mut self, id: EntryId, field: EntryField, value: &str, now: Instant) -> Result<()> {
        self.entries.update_field(id, field, value)?;
        self.sync.field_edited(id, field, now);
        Ok(())
    }

    /// Commit every pending edit immediately.
    pub fn blur(&mut self) -> Result<()> {
        self.sync
            .sync_now(&self.entries, &self.aliases, SyncTrigger::Blur)?;
        Ok(())
    }

    /// Delete an entry by identity and write immediately.
    pub fn remove(&mut self, id: EntryId) -> Result<Entry> {
        let removed = self.entries.remove(id)?;
        self.sync.forget(id);
        self.sync
            .sync_now(&self.entries, &self.aliases, SyncTrigger::Remove)?;
        Ok(removed)
    }

    /// Write debounced edits that are due. Returns whether a write happened.
    pub fn poll(&mut self, now: Instant) -> Result<bool> {
        Ok(self.sync.poll(&self.entries, &self.aliases, now)?)
    }

    /// Render the current aliases as a CSV download, syncing first.
    pub fn export(&mut self, date: NaiveDate) -> Result<CsvExport> {
        let aliases = self
            .sync
            .sync_now(&self.entries, &self.aliases, SyncTrigger::Export)?;
        let export = csv::render_export(&aliases, &self.export_prefix, date)?;
        info!("Exported {} alias(es) to {}", aliases.len(), export.file_name);
        Ok(export)
    }

    /// Import CSV text.
    ///
    /// `choose_mode` is asked for merge or replace (given the number of
    /// existing aliases) only when the store is non-empty. Nothing is written
    /// unless the whole file parses into at least one alias.
    pub fn import(
        &mut self,
        content: &str,
        choose_mode: impl FnOnce(usize) -> ImportMode,
    ) -> Result<ImportReport> {
        let imported = csv::parse_csv(content)?;
        let existing = self.aliases.get();
        let mode = if existing.is_empty() {
            ImportMode::Replace
        } else {
            choose_mode(existing.len())
        };

        let count = imported.len();
        let combined = csv::combine(&existing, imported, mode);
        self.aliases.set(&combined)?;
        self.entries.replace_all(&combined);
        self.sync.discard_pending();
        info!("Imported {} alias(es) ({:?}), {} total", count, mode, combined.len());

        Ok(ImportReport {
            imported: count,
            total: combined.len(),
            mode,
        })
    }

    /// Discard the working entries and reseed from the store.
    pub fn reseed(&mut self) {
        self.sync.discard_pending();
        self.entries.replace_all(&self.aliases.get());
    }

    pub fn entries(&self) -> &[Entry] {
        self.entries.entries()
    }

    pub fn aliases(&self) -> &AliasStore<S> {
        &self.aliases
    }

    /// Projection of the working entries (what the next sync would write).
    pub fn projection(&self) -> AliasMap {
        self.entries.project()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.sync.next_deadline()
    }

    pub fn time_until_due(&self, now: Instant) -> Option<std::time::Duration> {
        self.sync.time_until_due(now)
    }

    pub fn has_pending(&self) -> bool {
        self.sync.has_pending()
    }

    pub fn sync_stats(&self) -> SyncStats {
        self.sync.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryStore;
    use crate::persistence::Persistence;
    use std::time::Duration;

    fn editor_with(pairs: &[(&str, &str)]) -> Editor<InMemoryStore> {
        let store = AliasStore::with_default_key(Persistence::new(InMemoryStore::new()));
        let mapping: AliasMap = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if !mapping.is_empty() {
            store.set(&mapping).unwrap();
        }
        Editor::new(store, &LinksquashConfig::default())
    }

    fn writes(editor: &Editor<InMemoryStore>) -> usize {
        editor.aliases().persistence().store().write_count()
    }

    #[test]
    fn test_seeds_from_store() {
        let editor = editor_with(&[("a", "u1"), ("b", "u2")]);
        assert_eq!(editor.entries().len(), 2);
        assert_eq!(editor.projection(), editor.aliases().get());
    }

    #[test]
    fn test_add_then_edit_is_debounced() {
        let mut editor = editor_with(&[]);
        let start = Instant::now();

        let id = editor.apply(EditorAction::Add, start).unwrap().unwrap();
        assert_eq!(writes(&editor), 0);

        editor
            .apply(
                EditorAction::Edit {
                    id,
                    field: EntryField::Path,
                    value: "gh".into(),
                },
                start,
            )
            .unwrap();
        editor
            .apply(EditorAction::Tick, start + Duration::from_millis(100))
            .unwrap();
        assert_eq!(writes(&editor), 0);

        editor
            .apply(EditorAction::Tick, start + Duration::from_millis(500))
            .unwrap();
        assert_eq!(writes(&editor), 1);
        assert!(editor.aliases().get().contains_key("gh"));
    }

    #[test]
    fn test_blur_writes_immediately() {
        let mut editor = editor_with(&[]);
        let now = Instant::now();
        let id = editor.add();
        editor.edit(id, EntryField::Path, "gh", now).unwrap();
        editor.edit(id, EntryField::Url, "https://github.com", now).unwrap();

        editor.apply(EditorAction::Blur, now).unwrap();

        assert_eq!(
            editor.aliases().get().get("gh").map(String::as_str),
            Some("https://github.com")
        );
        assert!(!editor.has_pending());
    }

    #[test]
    fn test_remove_writes_immediately_and_keeps_same_path_sibling() {
        let mut editor = editor_with(&[]);
        let now = Instant::now();
        let first = editor.add();
        let second = editor.add();
        editor.edit(first, EntryField::Path, "dup", now).unwrap();
        editor.edit(first, EntryField::Url, "one", now).unwrap();
        editor.edit(second, EntryField::Path, "dup", now).unwrap();
        editor.edit(second, EntryField::Url, "two", now).unwrap();
        editor.blur().unwrap();
        assert_eq!(editor.aliases().get()["dup"], "two");

        editor.apply(EditorAction::Remove { id: second }, now).unwrap();

        assert_eq!(editor.entries().len(), 1);
        assert_eq!(editor.entries()[0].id, first);
        assert_eq!(editor.aliases().get()["dup"], "one");
    }

    #[test]
    fn test_remove_unknown_entry_fails_without_write() {
        let mut editor = editor_with(&[("a", "u1")]);
        let before = writes(&editor);
        let result = editor.remove(EntryId::generate());
        assert!(matches!(result, Err(EditorError::Entry(EntryError::NotFound(_)))));
        assert_eq!(writes(&editor), before);
    }

    #[test]
    fn test_export_syncs_pending_edits_first() {
        let mut editor = editor_with(&[("a", "u1")]);
        let id = editor.entries()[0].id;
        editor.edit(id, EntryField::Url, "u2", Instant::now()).unwrap();

        let export = editor
            .export(NaiveDate::from_ymd_opt(2026, 10, 17).unwrap())
            .unwrap();

        assert_eq!(export.file_name, "linksquash-aliases-2026-10-17.csv");
        assert_eq!(export.content, "alias,url\na,u2\n");
        assert_eq!(editor.aliases().get()["a"], "u2");
    }

    #[test]
    fn test_export_empty_fails() {
        let mut editor = editor_with(&[]);
        let result = editor.export(NaiveDate::from_ymd_opt(2026, 10, 17).unwrap());
        assert!(matches!(result, Err(EditorError::Export(ExportError::NothingToExport))));
    }

    #[test]
    fn test_import_into_empty_store_replaces_without_asking() {
        let mut editor = editor_with(&[]);
        let report = editor
            .import("alias,url\nb,u2\n", |_| panic!("should not ask"))
            .unwrap();

        assert_eq!(report.mode, ImportMode::Replace);
        assert_eq!(report.imported, 1);
        assert_eq!(editor.entries().len(), 1);
        assert_eq!(editor.entries()[0].path, "b");
    }

    #[test]
    fn test_import_merge_and_replace() {
        let mut merged = editor_with(&[("a", "u1")]);
        let report = merged
            .import("alias,url\nb,u2\n", |existing| {
                assert_eq!(existing, 1);
                ImportMode::Merge
            })
            .unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(merged.aliases().get().len(), 2);

        let mut replaced = editor_with(&[("a", "u1")]);
        replaced
            .import("alias,url\nb,u2\n", |_| ImportMode::Replace)
            .unwrap();
        let stored = replaced.aliases().get();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored["b"], "u2");
        assert_eq!(replaced.entries().len(), 1);
    }

    #[test]
    fn test_failed_import_leaves_everything_untouched() {
        let mut editor = editor_with(&[("a", "u1")]);
        let ids: Vec<_> = editor.entries().iter().map(|e| e.id).collect();
        let before = writes(&editor);

        let err = editor.import("alias\nfoo", |_| ImportMode::Replace).unwrap_err();

        assert!(matches!(err, EditorError::Import(ImportError::MissingColumns)));
        assert_eq!(writes(&editor), before);
        assert_eq!(editor.entries().iter().map(|e| e.id).collect::<Vec<_>>(), ids);
    }

    #[test]
    fn test_import_drops_pending_edits() {
        let mut editor = editor_with(&[]);
        let now = Instant::now();
        let id = editor.add();
        editor.edit(id, EntryField::Path, "typing", now).unwrap();

        editor.import("alias,url\nb,u2\n", |_| ImportMode::Merge).unwrap();

        assert!(!editor.has_pending());
        assert!(!editor.poll(now + Duration::from_secs(5)).unwrap());
        assert!(!editor.aliases().get().contains_key("typing"));
    }

    #[test]
    fn test_reseed_picks_up_external_changes() {
        let mut editor = editor_with(&[("a", "u1")]);
        let external = editor.aliases().clone();
        external
            .set(&AliasMap::from([("z".to_string(), "u9".to_string())]))
            .unwrap();

        assert_eq!(editor.entries()[0].path, "a");
        editor.reseed();
        assert_eq!(editor.entries()[0].path, "z");
    }
}
