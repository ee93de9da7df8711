//! Alias store: the persisted alias-path → destination-URL mapping.

use crate::events::{Listener, Subscription};
use crate::kv::KeyValueStore;
use crate::persistence::{Persistence, Result};
use crate::redirect::find_alias;

use serde_json::Value;
use std::collections::BTreeMap;

/// Storage key the mapping lives under
pub const DEFAULT_STORAGE_KEY: &str = "aliases";

/// Alias path (no leading slash) → destination URL.
///
/// Ordered only so that exports are deterministic; order carries no meaning.
pub type AliasMap = BTreeMap<String, String>;

/// Typed view over the persistence adapter, fixed to one key.
///
/// Performs no validation; blank paths are filtered out before they get here.
pub struct AliasStore<S> {
    persistence: Persistence<S>,
    key: String,
}

impl<S> Clone for AliasStore<S> {
    fn clone(&self) -> Self {
        Self {
            persistence: self.persistence.clone(),
            key: self.key.clone(),
        }
    }
}

impl<S: KeyValueStore> AliasStore<S> {
    pub fn new(persistence: Persistence<S>, key: impl Into<String>) -> Self {
        Self {
            persistence,
            key: key.into(),
        }
    }

    /// Store under the default `"aliases"` key.
    pub fn with_default_key(persistence: Persistence<S>) -> Self {
        Self::new(persistence, DEFAULT_STORAGE_KEY)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn persistence(&self) -> &Persistence<S> {
        &self.persistence
    }

    /// Current mapping (empty when nothing usable is stored).
    pub fn get(&self) -> AliasMap {
        self.persistence.read(&self.key, AliasMap::new())
    }

    /// Replace the stored mapping.
    pub fn set(&self, aliases: &AliasMap) -> Result<()> {
        self.persistence.write(&self.key, aliases)
    }

    pub fn len(&self) -> usize {
        self.get().len()
    }

    pub fn is_empty(&self) -> bool {
        self.get().is_empty()
    }

    /// Destination URL for an alias name, using the resolver's matching rule.
    pub fn lookup(&self, name: &str) -> Option<String> {
        find_alias(&self.get(), name).map(str::to_string)
    }

    /// Subscribe to mapping writes. Values that are not a mapping arrive as
    /// an empty map.
    pub fn subscribe(&self, callback: impl Listener<AliasMap>) -> Subscription {
        self.persistence.subscribe(&self.key, move |value: Value| {
            callback(serde_json::from_value(value).unwrap_or_default())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryStore;
    use std::sync::{Arc, Mutex};

    fn store() -> AliasStore<InMemoryStore> {
        AliasStore::with_default_key(Persistence::new(InMemoryStore::new()))
    }

    fn aliases(pairs: &[(&str, &str)]) -> AliasMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_by_default() {
        let store = store();
        assert!(store.get().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let store = store();
        let mapping = aliases(&[
            ("gh", "https://github.com"),
            ("mail", "https://mail.example.com/inbox?x=1,2"),
            ("Docs", "https://docs.rs"),
        ]);

        store.set(&mapping).unwrap();
        assert_eq!(store.get(), mapping);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_persists_under_aliases_key_as_json_object() {
        let store = store();
        store.set(&aliases(&[("gh", "https://github.com")])).unwrap();

        let raw = store.persistence().store().get_item("aliases").unwrap();
        assert_eq!(raw.as_deref(), Some(r#"{"gh":"https://github.com"}"#));
    }

    #[test]
    fn test_subscribe_receives_written_mapping() {
        let store = store();
        let received = Arc::new(Mutex::new(None));
        let received_clone = Arc::clone(&received);

        let _sub = store.subscribe(move |map: AliasMap| {
            *received_clone.lock().unwrap() = Some(map);
        });
        store.set(&aliases(&[("a", "u1")])).unwrap();

        assert_eq!(received.lock().unwrap().clone(), Some(aliases(&[("a", "u1")])));
    }

    #[test]
    fn test_lookup() {
        let store = store();
        store.set(&aliases(&[("foo", "https://example.com")])).unwrap();

        assert_eq!(store.lookup("foo").as_deref(), Some("https://example.com"));
        assert_eq!(store.lookup("missing"), None);
    }
}
