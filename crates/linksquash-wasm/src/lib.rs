//! WASM bindings for linksquash-core.
//!
//! Provides the bridge between the web page (TypeScript) and Rust.
//!
//! # Architecture
//!
//! The page creates a `JsStorageBridge` with callbacks over `localStorage`.
//! The bridge implements the `KeyValueStore` trait, so the Rust editor and
//! resolver read and write aliases through JavaScript.
//!
//! ```text
//! TypeScript                    WASM (Rust)
//! ──────────                    ───────────
//! localStorage ──callbacks──> JsStorageBridge
//!                                   │
//!                                   ▼
//!                           impl KeyValueStore
//!                                   │
//!                                   ▼
//!                           Editor<JsStorageBridge>
//!                                   │
//!                                   ▼
//!                           WasmLinksquash (exposed to JS)
//! ```
//!
//! The page owns the timer: after each `editField` it arms `setTimeout` with
//! `nextDelayMs()` and calls `poll()` when it fires.
//!
//! **Note**: This crate only compiles for `wasm32` targets. When building for
//! native targets, this crate provides no exports.

#[cfg(target_arch = "wasm32")]
mod storage_bridge;

#[cfg(target_arch = "wasm32")]
pub use storage_bridge::JsStorageBridge;

#[cfg(target_arch = "wasm32")]
mod wasm_impl {
    use super::*;
    use linksquash_core::aliases::{AliasMap, AliasStore};
    use linksquash_core::csv::{self, ImportMode};
    use linksquash_core::entries::{self, EntryField, EntryId};
    use linksquash_core::persistence::Persistence;
    use linksquash_core::redirect::{RedirectResolver, Resolution};
    use linksquash_core::{ConfigError, Editor, LinksquashConfig};
    use serde::Serialize;
    use std::cell::{RefCell, RefMut};
    use std::str::FromStr;
    use tracing_subscriber::layer::SubscriberExt;
    use wasm_bindgen::prelude::*;
    use web_time::Instant;

    // ========== Callback Logger Layer ==========

    thread_local! {
        static LOGGER_CALLBACK: RefCell<Option<js_sys::Function>> = const { RefCell::new(None) };
    }

    /// A tracing layer that invokes a JavaScript callback for each log event.
    struct JsCallbackLayer {
        max_level: tracing::Level,
    }

    impl<S> tracing_subscriber::Layer<S> for JsCallbackLayer
    where
        S: tracing::Subscriber,
    {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
            let metadata = event.metadata();
            if *metadata.level() > self.max_level {
                return;
            }

            LOGGER_CALLBACK.with(|cb| {
                let Some(callback) = cb.borrow().clone() else {
                    return;
                };

                let mut visitor = MessageVisitor::default();
                event.record(&mut visitor);

                let timestamp = web_time::SystemTime::now()
                    .duration_since(web_time::UNIX_EPOCH)
                    .map(|d| d.as_millis() as f64)
                    .unwrap_or(0.0);

                let js_event = js_sys::Object::new();
                let _ = js_sys::Reflect::set(&js_event, &"level".into(), &metadata.level().as_str().into());
                let _ = js_sys::Reflect::set(&js_event, &"target".into(), &metadata.target().into());
                let _ = js_sys::Reflect::set(&js_event, &"message".into(), &visitor.message.into());
                let _ = js_sys::Reflect::set(&js_event, &"timestamp".into(), &timestamp.into());

                let _ = callback.call1(&JsValue::NULL, &js_event);
            });
        }
    }

    /// Collects the `message` field, with any other fields appended as `k=v`.
    #[derive(Default)]
    struct MessageVisitor {
        message: String,
    }

    impl MessageVisitor {
        fn push_field(&mut self, name: &str, value: String) {
            if name == "message" {
                self.message.insert_str(0, &value);
            } else {
                if !self.message.is_empty() {
                    self.message.push(' ');
                }
                self.message.push_str(&format!("{}={}", name, value));
            }
        }
    }

    impl tracing::field::Visit for MessageVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            self.push_field(field.name(), format!("{:?}", value));
        }

        fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
            self.push_field(field.name(), value.to_string());
        }
    }

    /// Errors raised by the bridge itself. Core errors are passed through
    /// `js_error` with their `Display` text.
    #[derive(Debug, thiserror::Error)]
    enum BridgeError {
        #[error("Invalid config: {0}")]
        ConfigShape(#[from] serde_wasm_bindgen::Error),

        #[error(transparent)]
        Config(#[from] ConfigError),

        #[error("Editor is busy; call it again outside of a subscriber")]
        Busy,
    }

    fn js_error(e: impl std::fmt::Display) -> JsError {
        JsError::new(&e.to_string())
    }

    /// `undefined`/`null` give the defaults; anything else must deserialize
    /// and validate.
    fn parse_config(config: JsValue) -> Result<LinksquashConfig, BridgeError> {
        if config.is_undefined() || config.is_null() {
            return Ok(LinksquashConfig::default());
        }
        let config: LinksquashConfig = serde_wasm_bindgen::from_value(config)?;
        config.validate()?;
        Ok(config)
    }

    fn alias_store(storage: JsStorageBridge, config: &LinksquashConfig) -> AliasStore<JsStorageBridge> {
        AliasStore::new(Persistence::new(storage), config.storage_key.clone())
    }

    /// Navigator that performs a full page load through a JS callback
    /// (typically `(url) => location.assign(url)`).
    fn js_navigator(navigate: js_sys::Function) -> impl Fn(&str) {
        move |url: &str| {
            if let Err(e) = navigate.call1(&JsValue::NULL, &url.into()) {
                tracing::warn!("Navigation to {} failed: {:?}", url, e);
            }
        }
    }

    /// Initialize the WASM module (panic hook and tracing).
    ///
    /// - `init()` - console-only logging at debug level
    /// - `init({ logLevel: "info" })` - console-only logging at info level
    /// - `init({ logger: (event) => {...} })` - callback + console logging
    ///
    /// The logger callback receives events with: `{ level, target, message, timestamp }`
    #[wasm_bindgen]
    pub fn init(config: Option<js_sys::Object>) {
        console_error_panic_hook::set_once();

        let max_level = config
            .as_ref()
            .and_then(|cfg| js_sys::Reflect::get(cfg, &"logLevel".into()).ok())
            .and_then(|v| v.as_string())
            .and_then(|s| tracing::Level::from_str(&s).ok())
            .unwrap_or(tracing::Level::DEBUG);

        let callback = config
            .as_ref()
            .and_then(|cfg| js_sys::Reflect::get(cfg, &"logger".into()).ok())
            .and_then(|v| v.dyn_into::<js_sys::Function>().ok());

        let console_config = tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(max_level)
            .build();

        if let Some(cb) = callback {
            LOGGER_CALLBACK.with(|cell| *cell.borrow_mut() = Some(cb));
        }

        // Repeated init keeps the first subscriber
        let subscriber = tracing_subscriber::registry()
            .with(JsCallbackLayer { max_level })
            .with(tracing_wasm::WASMLayer::new(console_config));
        tracing::subscriber::set_global_default(subscriber).ok();

        tracing::debug!("linksquash-wasm {} initialized", env!("CARGO_PKG_VERSION"));
    }

    /// Get version string
    #[wasm_bindgen]
    pub fn version() -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    /// Whether a keydown `key` in a path input should be prevented.
    #[wasm_bindgen(js_name = isSuppressedPathKey)]
    pub fn is_suppressed_path_key(key: &str) -> bool {
        entries::is_suppressed_path_key(key)
    }

    /// Whether a keydown `key` should commit the field (blur it).
    #[wasm_bindgen(js_name = isCommitKey)]
    pub fn is_commit_key(key: &str) -> bool {
        entries::is_commit_key(key)
    }

    /// Page-load routing.
    ///
    /// Redirects through `navigate` when an alias matches and returns the
    /// resolution as `{ kind: "redirect" | "editor" | "privacy" | "notFound", ... }`.
    #[wasm_bindgen(js_name = resolveLocation)]
    pub fn resolve_location(
        storage: &JsStorageBridge,
        navigate: js_sys::Function,
        pathname: &str,
        hash: &str,
        config: JsValue,
    ) -> Result<JsValue, JsError> {
        let config = parse_config(config)?;
        let resolver = RedirectResolver::new(
            alias_store(storage.clone(), &config),
            js_navigator(navigate),
            config.privacy_path.clone(),
        );
        let resolution: Resolution = resolver.resolve_location(pathname, hash);
        serde_wasm_bindgen::to_value(&resolution).map_err(js_error)
    }

    // ========== WASM Subscription Handle ==========

    /// Subscription handle exposed to JavaScript.
    ///
    /// Call `dispose()` to unsubscribe, or let the JS garbage collector
    /// collect it (the Rust Drop will run via FinalizationRegistry).
    #[wasm_bindgen]
    pub struct WasmSubscription {
        inner: RefCell<Option<linksquash_core::Subscription>>,
    }

    #[wasm_bindgen]
    impl WasmSubscription {
        /// Unsubscribe. Safe to call multiple times.
        pub fn dispose(&self) {
            self.inner.borrow_mut().take();
        }
    }

    /// Alias editor exposed to TypeScript.
    ///
    /// Entry ids cross the boundary as hyphenated UUID strings and fields as
    /// `"path"` or `"url"`.
    #[wasm_bindgen]
    pub struct WasmLinksquash {
        editor: RefCell<Editor<JsStorageBridge>>,
        // Separate handle so reads work while a write is notifying subscribers
        aliases: AliasStore<JsStorageBridge>,
        privacy_path: String,
    }

    impl WasmLinksquash {
        fn editor_mut(&self) -> Result<RefMut<'_, Editor<JsStorageBridge>>, BridgeError> {
            self.editor.try_borrow_mut().map_err(|_| BridgeError::Busy)
        }
    }

    #[wasm_bindgen]
    impl WasmLinksquash {
        /// Create the editor over `storage`, seeded once from its contents.
        #[wasm_bindgen(constructor)]
        pub fn new(storage: JsStorageBridge, config: JsValue) -> Result<WasmLinksquash, JsError> {
            let config = parse_config(config)?;
            let aliases = alias_store(storage, &config);
            let editor = Editor::new(aliases.clone(), &config);
            Ok(WasmLinksquash {
                editor: RefCell::new(editor),
                aliases,
                privacy_path: config.privacy_path,
            })
        }

        /// Working entries as `[{ id, path, url }]`, in display order.
        #[wasm_bindgen]
        pub fn entries(&self) -> Result<JsValue, JsError> {
            let editor = self
                .editor
                .try_borrow()
                .map_err(|_| BridgeError::Busy)?;
            serde_wasm_bindgen::to_value(editor.entries()).map_err(js_error)
        }

        /// Append an empty entry and return its id.
        #[wasm_bindgen(js_name = addEntry)]
        pub fn add_entry(&self) -> Result<String, JsError> {
            Ok(self.editor_mut()?.add().to_string())
        }

        /// Keystroke-level change; the write is debounced.
        #[wasm_bindgen(js_name = editField)]
        pub fn edit_field(&self, id: &str, field: &str, value: &str) -> Result<(), JsError> {
            let id = EntryId::from_str(id).map_err(js_error)?;
            let field = EntryField::from_str(field).map_err(js_error)?;
            self.editor_mut()?
                .edit(id, field, value, Instant::now())
                .map_err(js_error)
        }

        /// A field lost focus (or Enter was pressed): write now.
        #[wasm_bindgen(js_name = blurField)]
        pub fn blur_field(&self) -> Result<(), JsError> {
            self.editor_mut()?.blur().map_err(js_error)
        }

        /// Delete an entry by id and write now.
        #[wasm_bindgen(js_name = removeEntry)]
        pub fn remove_entry(&self, id: &str) -> Result<(), JsError> {
            let id = EntryId::from_str(id).map_err(js_error)?;
            self.editor_mut()?.remove(id).map_err(js_error)?;
            Ok(())
        }

        /// Write debounced edits that are due. Returns whether a write happened.
        #[wasm_bindgen]
        pub fn poll(&self) -> Result<bool, JsError> {
            self.editor_mut()?.poll(Instant::now()).map_err(js_error)
        }

        /// Milliseconds until `poll` has work, or `undefined` when idle.
        #[wasm_bindgen(js_name = nextDelayMs)]
        pub fn next_delay_ms(&self) -> Option<f64> {
            let editor = self.editor.try_borrow().ok()?;
            editor
                .time_until_due(Instant::now())
                .map(|d| d.as_millis() as f64)
        }

        /// Write pending edits, if any. Meant for `pagehide`.
        #[wasm_bindgen]
        pub fn flush(&self) -> Result<bool, JsError> {
            let mut editor = self.editor_mut()?;
            if !editor.has_pending() {
                return Ok(false);
            }
            editor.blur().map_err(js_error)?;
            Ok(true)
        }

        /// Render the aliases as `{ fileName, content, mimeType }`.
        #[wasm_bindgen(js_name = exportCsv)]
        pub fn export_csv(&self) -> Result<JsValue, JsError> {
            let export = self.editor_mut()?.export(csv::today_utc()).map_err(js_error)?;
            serde_wasm_bindgen::to_value(&export).map_err(js_error)
        }

        /// Import CSV text.
        ///
        /// `confirm_merge(existingCount)` is called only when aliases already
        /// exist; a truthy return merges, anything else replaces. Returns
        /// `{ imported, total, mode }`.
        #[wasm_bindgen(js_name = importCsv)]
        pub fn import_csv(&self, content: &str, confirm_merge: js_sys::Function) -> Result<JsValue, JsError> {
            let report = self
                .editor_mut()?
                .import(content, |existing| {
                    let merge = confirm_merge
                        .call1(&JsValue::NULL, &JsValue::from(existing as f64))
                        .map(|v| v.is_truthy())
                        .unwrap_or(false);
                    if merge { ImportMode::Merge } else { ImportMode::Replace }
                })
                .map_err(js_error)?;
            serde_wasm_bindgen::to_value(&report).map_err(js_error)
        }

        /// Persisted mapping as a plain object.
        #[wasm_bindgen]
        pub fn aliases(&self) -> Result<JsValue, JsError> {
            let aliases: AliasMap = self.aliases.get();
            aliases
                .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
                .map_err(js_error)
        }

        /// In-page `hashchange`: navigate if the fragment names an alias.
        /// Returns the destination URL, or `undefined`.
        #[wasm_bindgen(js_name = onHashChange)]
        pub fn on_hash_change(&self, hash: &str, navigate: js_sys::Function) -> Option<String> {
            RedirectResolver::new(self.aliases.clone(), js_navigator(navigate), self.privacy_path.clone())
                .resolve_fragment(hash)
        }

        /// Subscribe to alias writes. The callback receives the new mapping.
        #[wasm_bindgen]
        pub fn subscribe(&self, callback: js_sys::Function) -> WasmSubscription {
            let rust_closure = move |aliases: AliasMap| {
                let serializer = serde_wasm_bindgen::Serializer::json_compatible();
                if let Ok(js_aliases) = aliases.serialize(&serializer) {
                    let _ = callback.call1(&JsValue::NULL, &js_aliases);
                }
            };

            WasmSubscription {
                inner: RefCell::new(Some(self.aliases.subscribe(rust_closure))),
            }
        }
    }

}

// Re-export wasm_impl contents at crate root for wasm32 targets
#[cfg(target_arch = "wasm32")]
pub use wasm_impl::*;
