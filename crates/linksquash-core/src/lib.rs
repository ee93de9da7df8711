//! linksquash-core: Browser-local URL aliases.
//!
//! This crate provides the core functionality for:
//! - Persisting the alias mapping in a `localStorage`-shaped key-value store
//! - Editing aliases through an identity-stable entry list with debounced sync
//! - CSV import/export of the mapping
//! - Resolving visited paths and fragments to redirects
//!
//! Platform access (storage, navigation) goes through the `KeyValueStore` and
//! `Navigator` traits, so the same code runs natively and in the browser.

pub mod aliases;
pub mod config;
pub mod csv;
pub mod editor;
pub mod entries;
pub mod events;
pub mod kv;
pub mod persistence;
pub mod redirect;
pub mod sync;

pub use aliases::{AliasMap, AliasStore};
pub use config::{ConfigError, LinksquashConfig};
pub use csv::{CsvExport, ImportMode, ImportReport};
pub use editor::{Editor, EditorAction, EditorError};
pub use entries::{Entry, EntryField, EntryId};
pub use events::{EventBus, Subscription};
pub use kv::{InMemoryStore, KeyValueStore, KvError};
pub use persistence::Persistence;
pub use redirect::{Navigator, RedirectResolver, Resolution};
pub use sync::SyncEngine;
