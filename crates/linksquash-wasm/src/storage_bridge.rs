//! JavaScript storage bridge for WASM.
//!
//! Implements the `KeyValueStore` trait by calling JavaScript callback
//! functions provided by the page. Web Storage is synchronous, so unlike a
//! filesystem bridge no Promises are involved.

use linksquash_core::kv::{KeyValueStore, KvError, Result};
use wasm_bindgen::prelude::*;

/// JavaScript storage bridge.
///
/// Holds JS callback functions for storage operations. The page creates this
/// with callbacks that wrap `window.localStorage`.
///
/// # Example (TypeScript side)
///
/// ```typescript
/// const storage = new JsStorageBridge(
///   (key) => localStorage.getItem(key),
///   (key, value) => localStorage.setItem(key, value),
///   (key) => localStorage.removeItem(key),
/// );
/// ```
#[wasm_bindgen]
#[derive(Clone)]
pub struct JsStorageBridge {
    get_fn: js_sys::Function,
    set_fn: js_sys::Function,
    remove_fn: js_sys::Function,
}

#[wasm_bindgen]
impl JsStorageBridge {
    #[wasm_bindgen(constructor)]
    pub fn new(get_fn: js_sys::Function, set_fn: js_sys::Function, remove_fn: js_sys::Function) -> Self {
        Self {
            get_fn,
            set_fn,
            remove_fn,
        }
    }
}

/// Convert a thrown JS value to our KvError type.
fn js_err_to_kv_err(err: JsValue) -> KvError {
    let name = js_sys::Reflect::get(&err, &"name".into())
        .ok()
        .and_then(|v| v.as_string())
        .unwrap_or_default();
    let msg = err
        .as_string()
        .or_else(|| {
            js_sys::Reflect::get(&err, &"message".into())
                .ok()
                .and_then(|v| v.as_string())
        })
        .unwrap_or_else(|| format!("{:?}", err));

    // DOMException names, see the Web Storage standard
    match name.as_str() {
        "QuotaExceededError" | "NS_ERROR_DOM_QUOTA_REACHED" => KvError::QuotaExceeded(msg),
        "SecurityError" => KvError::Unavailable(msg),
        _ => KvError::Other(msg),
    }
}

impl KeyValueStore for JsStorageBridge {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let result = self
            .get_fn
            .call1(&JsValue::NULL, &key.into())
            .map_err(js_err_to_kv_err)?;

        // getItem returns null for missing keys
        Ok(result.as_string())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.set_fn
            .call2(&JsValue::NULL, &key.into(), &value.into())
            .map_err(js_err_to_kv_err)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.remove_fn
            .call1(&JsValue::NULL, &key.into())
            .map_err(js_err_to_kv_err)?;
        Ok(())
    }
}
