//! Sync engine: writes the entry list's projection through the alias store.
//!
//! Two triggers:
//!
//! 1. Keystroke edits touch a per-stream debounce timer (stream = entry id +
//!    field). Once a stream has been idle for the debounce delay, `poll` writes
//!    the projection. All streams due at the same poll share one write.
//! 2. Blur, deletion and export call `sync_now`, which writes synchronously
//!    and cancels every pending stream (their edits are part of that write).
//!
//! Import writes the store directly and then discards pending streams.
//!
//! The engine owns no timer. The host calls `poll` from its own timer, armed
//! from `next_deadline`, which keeps the engine deterministic under test.

use crate::aliases::{AliasMap, AliasStore};
use crate::entries::{EntryField, EntryId, EntryList};
use crate::kv::KeyValueStore;
use crate::persistence::Result;

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tracing::{debug, warn};
use web_time::Instant;

/// Idle time after the last keystroke before a debounced write
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// A debounced edit stream: one field of one entry.
pub type StreamKey = (EntryId, EntryField);

/// Per-key trailing-edge debounce timers.
#[derive(Debug, Clone)]
pub struct Debouncer<K> {
    delay: Duration,
    deadlines: HashMap<K, Instant>,
}

impl<K: Eq + Hash + Clone> Debouncer<K> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadlines: HashMap::new(),
        }
    }

    /// Restart the timer for `key`.
    pub fn touch(&mut self, key: K, now: Instant) {
        self.deadlines.insert(key, now + self.delay);
    }

    /// Stop the timer for `key` without firing it.
    pub fn cancel(&mut self, key: &K) -> bool {
        self.deadlines.remove(key).is_some()
    }

    /// Stop every timer.
    pub fn clear(&mut self) {
        self.deadlines.clear();
    }

    /// Remove and return every key whose deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Vec<K> {
        let due: Vec<K> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &due {
            self.deadlines.remove(key);
        }
        due
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.deadlines.contains_key(key)
    }

    pub fn pending(&self) -> usize {
        self.deadlines.len()
    }
}

/// Why an immediate sync was performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Blur,
    Remove,
    Export,
}

/// Write counters, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    /// Writes issued by `poll`
    pub debounced_writes: u64,
    /// Writes issued by `sync_now`
    pub immediate_writes: u64,
}

impl SyncStats {
    pub fn total(&self) -> u64 {
        self.debounced_writes + self.immediate_writes
    }
}

/// Reconciles an `EntryList` into an `AliasStore`.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    debouncer: Debouncer<StreamKey>,
    stats: SyncStats,
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl SyncEngine {
    pub fn new(delay: Duration) -> Self {
        Self {
            debouncer: Debouncer::new(delay),
            stats: SyncStats::default(),
        }
    }

    /// Record a keystroke-level edit; the write happens on a later `poll`.
    pub fn field_edited(&mut self, id: EntryId, field: EntryField, now: Instant) {
        self.debouncer.touch((id, field), now);
    }

    /// Drop the timers of an entry that no longer exists.
    pub fn forget(&mut self, id: EntryId) {
        self.debouncer.cancel(&(id, EntryField::Path));
        self.debouncer.cancel(&(id, EntryField::Url));
    }

    /// Drop every pending timer without writing.
    pub fn discard_pending(&mut self) {
        self.debouncer.clear();
    }

    /// Write if any stream has been idle long enough. Returns whether a
    /// write happened.
    pub fn poll<S: KeyValueStore>(
        &mut self,
        entries: &EntryList,
        store: &AliasStore<S>,
        now: Instant,
    ) -> Result<bool> {
        let due = self.debouncer.take_due(now);
        if due.is_empty() {
            return Ok(false);
        }
        debug!("Debounced sync for {} stream(s)", due.len());
        write(entries, store)?;
        self.stats.debounced_writes += 1;
        Ok(true)
    }

    /// Write the projection now and cancel pending streams.
    ///
    /// On failure the pending streams are kept so a later poll retries them.
    pub fn sync_now<S: KeyValueStore>(
        &mut self,
        entries: &EntryList,
        store: &AliasStore<S>,
        trigger: SyncTrigger,
    ) -> Result<AliasMap> {
        let aliases = write(entries, store)?;
        debug!("Immediate sync ({:?}): {} alias(es)", trigger, aliases.len());
        self.debouncer.clear();
        self.stats.immediate_writes += 1;
        Ok(aliases)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.next_deadline()
    }

    /// Time until the next debounced write is due, if one is pending.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    pub fn has_pending(&self) -> bool {
        self.debouncer.pending() > 0
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }
}

fn write<S: KeyValueStore>(entries: &EntryList, store: &AliasStore<S>) -> Result<AliasMap> {
    let aliases = entries.project();
    store
        .set(&aliases)
        .inspect_err(|e| warn!("Failed to save aliases: {}", e))?;
    Ok(aliases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryStore;
    use crate::persistence::Persistence;

    fn store() -> AliasStore<InMemoryStore> {
        AliasStore::with_default_key(Persistence::new(InMemoryStore::new()))
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_debouncer_fires_after_idle_delay() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(500));

        debouncer.touch("a", start);
        assert!(debouncer.take_due(start + ms(499)).is_empty());
        assert_eq!(debouncer.take_due(start + ms(500)), vec!["a"]);
        assert!(debouncer.take_due(start + ms(1000)).is_empty());
    }

    #[test]
    fn test_debouncer_touch_resets_deadline() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(500));

        debouncer.touch("a", start);
        debouncer.touch("a", start + ms(400));
        assert!(debouncer.take_due(start + ms(600)).is_empty());
        assert_eq!(debouncer.next_deadline(), Some(start + ms(900)));
        assert_eq!(debouncer.take_due(start + ms(900)), vec!["a"]);
    }

    #[test]
    fn test_debouncer_cancel() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(500));

        debouncer.touch("a", start);
        assert!(debouncer.is_pending(&"a"));
        assert!(debouncer.cancel(&"a"));
        assert!(!debouncer.cancel(&"a"));
        assert!(debouncer.take_due(start + ms(500)).is_empty());
    }

    #[test]
    fn test_three_quick_edits_make_one_write_with_final_value() {
        let store = store();
        let mut entries = EntryList::new();
        let mut engine = SyncEngine::default();
        let id = entries.add();
        let start = Instant::now();

        for (offset, value) in [(0, "g"), (100, "gh"), (200, "ghx")] {
            let now = start + ms(offset);
            entries.update_field(id, EntryField::Path, value).unwrap();
            engine.field_edited(id, EntryField::Path, now);
            assert!(!engine.poll(&entries, &store, now).unwrap());
        }

        assert!(!engine.poll(&entries, &store, start + ms(699)).unwrap());
        assert!(engine.poll(&entries, &store, start + ms(700)).unwrap());
        assert!(!engine.poll(&entries, &store, start + ms(2000)).unwrap());

        assert_eq!(store.persistence().store().write_count(), 1);
        assert!(store.get().contains_key("ghx"));
        assert_eq!(engine.stats().debounced_writes, 1);
    }

    #[test]
    fn test_streams_due_together_share_one_write() {
        let store = store();
        let mut entries = EntryList::new();
        let mut engine = SyncEngine::default();
        let a = entries.add();
        let b = entries.add();
        let start = Instant::now();

        entries.update_field(a, EntryField::Path, "a").unwrap();
        engine.field_edited(a, EntryField::Path, start);
        entries.update_field(b, EntryField::Path, "b").unwrap();
        engine.field_edited(b, EntryField::Path, start + ms(10));

        assert!(engine.poll(&entries, &store, start + ms(600)).unwrap());
        assert_eq!(store.persistence().store().write_count(), 1);
        assert_eq!(store.get().len(), 2);
    }

    #[test]
    fn test_sync_now_writes_and_cancels_pending() {
        let store = store();
        let mut entries = EntryList::new();
        let mut engine = SyncEngine::default();
        let id = entries.add();
        let start = Instant::now();

        entries.update_field(id, EntryField::Path, "gh").unwrap();
        engine.field_edited(id, EntryField::Path, start);
        assert!(engine.has_pending());

        let written = engine.sync_now(&entries, &store, SyncTrigger::Blur).unwrap();

        assert!(written.contains_key("gh"));
        assert!(!engine.has_pending());
        assert!(!engine.poll(&entries, &store, start + ms(1000)).unwrap());
        assert_eq!(store.persistence().store().write_count(), 1);
    }

    #[test]
    fn test_new_empty_entry_does_not_write() {
        let store = store();
        let mut entries = EntryList::new();
        let mut engine = SyncEngine::default();
        entries.add();

        assert!(!engine.poll(&entries, &store, Instant::now() + ms(10_000)).unwrap());
        assert_eq!(store.persistence().store().write_count(), 0);
    }

    #[test]
    fn test_failed_sync_keeps_pending_streams() {
        let store = store();
        let mut entries = EntryList::new();
        let mut engine = SyncEngine::default();
        let id = entries.add();
        entries.update_field(id, EntryField::Path, "gh").unwrap();
        engine.field_edited(id, EntryField::Path, Instant::now());

        store.persistence().store().set_fail_writes(true);
        assert!(engine.sync_now(&entries, &store, SyncTrigger::Blur).is_err());
        assert!(engine.has_pending());
    }

    #[test]
    fn test_time_until_due() {
        let mut engine = SyncEngine::new(ms(500));
        let start = Instant::now();
        assert_eq!(engine.time_until_due(start), None);

        engine.field_edited(EntryId::generate(), EntryField::Url, start);
        assert_eq!(engine.time_until_due(start + ms(200)), Some(ms(300)));
        assert_eq!(engine.time_until_due(start + ms(800)), Some(Duration::ZERO));
    }
}
