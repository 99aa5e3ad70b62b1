//! window-backed host services

use async_trait::async_trait;
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use superteach::host::{Clock, Navigator, Notifier};
use superteach::storage::{KeyValueStore, StoreError};

fn window() -> Option<web_sys::Window> {
    web_sys::window()
}

fn millis(duration: Duration) -> i32 {
    duration.as_millis().min(i32::MAX as u128) as i32
}

/// `window.localStorage`
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalStorage;

impl LocalStorage {
    fn storage(&self) -> Result<web_sys::Storage, StoreError> {
        window()
            .and_then(|w| w.local_storage().ok().flatten())
            .ok_or(StoreError::Unavailable)
    }
}

impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.storage()?
            .get_item(key)
            .map_err(|_| StoreError::Unavailable)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        // quota errors surface here
        self.storage()?
            .set_item(key, value)
            .map_err(|e| StoreError::Write(format!("{:?}", e)))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.storage()?
            .remove_item(key)
            .map_err(|e| StoreError::Write(format!("{:?}", e)))
    }
}

/// toasts and navigation.
///
/// `toast` is called as `toast(kind, message)` with kind `"success"` or
/// `"error"`; without one, messages only go to the console.
pub struct BrowserHost {
    toast: Option<js_sys::Function>,
}

impl BrowserHost {
    pub fn new(toast: Option<js_sys::Function>) -> Self {
        Self { toast }
    }

    fn show(&self, kind: &str, message: &str) {
        if let Some(toast) = &self.toast {
            if let Err(e) = toast.call2(&JsValue::NULL, &JsValue::from_str(kind), &JsValue::from_str(message)) {
                web_sys::console::warn_2(&"toast callback failed".into(), &e);
            }
        }
    }
}

impl Notifier for BrowserHost {
    fn success(&self, message: &str) {
        self.show("success", message);
    }

    fn error(&self, message: &str) {
        web_sys::console::error_1(&JsValue::from_str(message));
        self.show("error", message);
    }
}

impl Navigator for BrowserHost {
    fn open_after(&self, url: &str, delay: Duration) {
        let Some(window) = window() else {
            tracing::warn!(url, "no window, cannot open page");
            return;
        };
        let url = url.to_string();
        let open = Closure::once_into_js(move || {
            if let Some(w) = web_sys::window() {
                let _ = w.open_with_url_and_target(&url, "_blank");
            }
        });
        if let Err(e) = window
            .set_timeout_with_callback_and_timeout_and_arguments_0(open.unchecked_ref(), millis(delay))
        {
            web_sys::console::error_2(&"could not schedule navigation".into(), &e);
        }
    }

    fn reload(&self) {
        if let Some(window) = window() {
            if let Err(e) = window.location().reload() {
                web_sys::console::error_2(&"reload failed".into(), &e);
            }
        }
    }
}

/// `setTimeout` wrapped in a promise
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserClock;

#[async_trait(?Send)]
impl Clock for BrowserClock {
    async fn sleep(&self, duration: Duration) {
        let ms = millis(duration);
        let promise = js_sys::Promise::new(&mut |resolve, _| {
            let scheduled = web_sys::window()
                .map(|w| w.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms).is_ok())
                .unwrap_or(false);
            if !scheduled {
                let _ = resolve.call0(&JsValue::NULL);
            }
        });
        JsFuture::from(promise).await.ok();
    }
}
