//! superteach-web: browser host for the starter page
//!
//! wires the flow components to the browser:
//! - phantom injected provider as the wallet
//! - `localStorage` for the session keys
//! - a js toast callback plus `console.error`
//! - `setTimeout` for the install redirect and rpc polling
//!
//! every async method returns a promise that resolves to a value or `null`;
//! failures have already been toasted by the time it settles.

use std::rc::Rc;
use std::sync::Arc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use superteach::upload::{HttpSource, StorageUploader};
use superteach::{Home, HomeServices, JsonRpcClient, StarterConfig};

mod browser;
mod phantom;

pub use browser::{BrowserClock, BrowserHost, LocalStorage};
pub use phantom::PhantomWallet;

/// initialize panic hook for better error messages
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

#[wasm_bindgen]
pub struct StarterPage {
    home: Rc<Home>,
}

#[wasm_bindgen]
impl StarterPage {
    /// `config_toml` empty or absent means devnet defaults. the upload
    /// secret comes from the host's secret store, never from the bundle.
    #[wasm_bindgen(constructor)]
    pub fn new(
        config_toml: Option<String>,
        upload_secret: String,
        toast: Option<js_sys::Function>,
    ) -> Result<StarterPage, JsError> {
        let config = match config_toml.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                StarterConfig::from_toml_str(raw).map_err(|e| JsError::new(&e.to_string()))?
            }
            _ => StarterConfig::devnet(),
        };

        let host = Arc::new(BrowserHost::new(toast));
        let services = HomeServices {
            wallet: Arc::new(PhantomWallet::new()),
            store: Arc::new(LocalStorage),
            rpc: Arc::new(JsonRpcClient::from_config(&config, Arc::new(BrowserClock))),
            navigator: host.clone(),
            notifier: host,
            source: Arc::new(HttpSource::new()),
            uploader: Arc::new(StorageUploader::new(&config.upload, upload_secret)),
        };

        Ok(StarterPage {
            home: Rc::new(Home::new(&config, services)),
        })
    }

    /// stored session on page load, no network; the address or null.
    /// call `refreshBalance` afterwards to show the balance
    pub fn restore(&self) -> Option<String> {
        self.home.restore().map(|a| a.to_string())
    }

    #[wasm_bindgen(js_name = signIn)]
    pub fn sign_in(&self) -> js_sys::Promise {
        let home = self.home.clone();
        future_to_promise(async move {
            Ok(home
                .sign_in()
                .await
                .map(|a| JsValue::from_str(&a.to_string()))
                .unwrap_or(JsValue::NULL))
        })
    }

    #[wasm_bindgen(js_name = signOut)]
    pub fn sign_out(&self) -> js_sys::Promise {
        let home = self.home.clone();
        future_to_promise(async move {
            home.sign_out().await;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// resolves to the balance in SOL or null
    #[wasm_bindgen(js_name = refreshBalance)]
    pub fn refresh_balance(&self) -> js_sys::Promise {
        let home = self.home.clone();
        future_to_promise(async move {
            Ok(home
                .refresh_balance()
                .await
                .map(|b| JsValue::from_f64(b.as_sol()))
                .unwrap_or(JsValue::NULL))
        })
    }

    /// resolves to the explorer link or null
    #[wasm_bindgen(js_name = sendTransaction)]
    pub fn send_transaction(&self) -> js_sys::Promise {
        let home = self.home.clone();
        future_to_promise(async move {
            Ok(home
                .submit_transfer()
                .await
                .map(|r| JsValue::from_str(&r.explorer_url))
                .unwrap_or(JsValue::NULL))
        })
    }

    /// resolves to the content url or null
    #[wasm_bindgen(js_name = uploadFromUrl)]
    pub fn upload_from_url(&self) -> js_sys::Promise {
        let home = self.home.clone();
        future_to_promise(async move {
            Ok(home
                .upload_from_url()
                .await
                .map(|r| JsValue::from_str(&r.content_url))
                .unwrap_or(JsValue::NULL))
        })
    }

    #[wasm_bindgen(js_name = setReceiver)]
    pub fn set_receiver(&self, value: &str) {
        self.home.set_receiver(value);
    }

    #[wasm_bindgen(js_name = setAmount)]
    pub fn set_amount(&self, value: &str) {
        self.home.set_amount(value);
    }

    #[wasm_bindgen(js_name = setUrl)]
    pub fn set_url(&self, value: &str) {
        self.home.set_url(value);
    }

    #[wasm_bindgen(getter, js_name = publicKey)]
    pub fn public_key(&self) -> Option<String> {
        self.home.state().account_address.map(|a| a.to_string())
    }

    /// whole units, 0 until the first successful fetch
    #[wasm_bindgen(getter)]
    pub fn balance(&self) -> f64 {
        self.home.state().balance.map(|b| b.as_sol()).unwrap_or(0.0)
    }

    #[wasm_bindgen(getter)]
    pub fn receiver(&self) -> String {
        self.home.state().receiver
    }

    #[wasm_bindgen(getter)]
    pub fn amount(&self) -> String {
        self.home.state().amount
    }

    #[wasm_bindgen(getter, js_name = statusText)]
    pub fn status_text(&self) -> String {
        self.home.state().status_text
    }

    #[wasm_bindgen(getter, js_name = lastSignature)]
    pub fn last_signature(&self) -> Option<String> {
        self.home.state().last_signature.map(|s| s.to_string())
    }
}
