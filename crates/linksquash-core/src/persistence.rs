//! Persistence adapter: structured values over a string key-value store.
//!
//! Values are stored the way a browser page stores them in `localStorage`:
//! objects and arrays as JSON text, primitives as their plain string form.
//! Reads are forgiving and fall back to a caller-supplied default instead of
//! failing. Every successful write is announced to subscribers of that key.

use crate::events::{EventBus, Listener, Shared, Subscription};
use crate::kv::{KeyValueStore, KvError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage error: {0}")]
    Store(#[from] KvError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Structured view over a `KeyValueStore`.
///
/// Cloning is cheap: clones share the underlying store and event bus, so a
/// write through one clone notifies subscribers registered through another.
pub struct Persistence<S> {
    store: Shared<S>,
    bus: Shared<EventBus<Value>>,
}

impl<S> Clone for Persistence<S> {
    fn clone(&self) -> Self {
        Self {
            store: Shared::clone(&self.store),
            bus: Shared::clone(&self.bus),
        }
    }
}

impl<S: KeyValueStore> Persistence<S> {
    pub fn new(store: S) -> Self {
        Self::from_shared(Shared::new(store))
    }

    /// Build an adapter over a store that is already shared elsewhere.
    pub fn from_shared(store: Shared<S>) -> Self {
        Self {
            store,
            bus: Shared::new(EventBus::new()),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read the value stored under `key`, or `fallback` when the key is
    /// missing, holds `"null"`, cannot be parsed, or does not fit `T`.
    pub fn read<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        let Some(value) = self.read_value(key) else {
            return fallback;
        };
        match serde_json::from_value(value) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Stored value for {} has unexpected shape: {}", key, e);
                fallback
            }
        }
    }

    /// Read and parse the raw value under `key` without a target type.
    pub fn read_value(&self, key: &str) -> Option<Value> {
        match self.store.get_item(key) {
            Ok(Some(raw)) => parse_stored(key, &raw),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read {} from storage: {}", key, e);
                None
            }
        }
    }

    /// Serialize `value`, store it under `key`, then notify subscribers of `key`.
    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let raw = stringify(&value)?;
        self.store.set_item(key, &raw)?;
        debug!("Stored {} ({} bytes)", key, raw.len());
        self.bus.emit(key, value);
        Ok(())
    }

    /// Subscribe to writes of `key`. The callback receives the written value.
    pub fn subscribe(&self, key: &str, callback: impl Listener<Value>) -> Subscription {
        self.bus.subscribe(key, callback)
    }

    /// Number of live subscriptions for `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.bus.subscriber_count(key)
    }
}

/// Interpret a raw stored string.
///
/// `"null"` counts as absent, `"true"`/`"false"` become booleans, text that
/// starts like a JSON object or array is parsed as JSON, and anything else is
/// kept as a plain string.
fn parse_stored(key: &str, raw: &str) -> Option<Value> {
    match raw {
        "null" => None,
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ if raw.starts_with('{') || raw.starts_with('[') => match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Ignoring unparseable value for {}: {}", key, e);
                None
            }
        },
        _ => Some(Value::String(raw.to_string())),
    }
}

/// Render a value in its stored string form.
fn stringify(value: &Value) -> serde_json::Result<String> {
    match value {
        Value::Object(_) | Value::Array(_) => serde_json::to_string(value),
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok("null".to_string()),
    }
}
