//! phantom injected provider
//!
//! talks to `window.phantom.solana` through `Reflect`. signing goes through
//! the provider's `request` api with the base58 message, so no js solana
//! sdk is needed on the page.

use async_trait::async_trait;
use js_sys::{Array, Function, Object, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use superteach::pubkey::{Pubkey, Signature};
use superteach::tx::Transaction;
use superteach::wallet::{WalletError, WalletProvider};

/// eip-1193 style "user rejected the request"
const USER_REJECTED_CODE: f64 = 4001.0;

fn get(target: &JsValue, key: &str) -> Option<JsValue> {
    Reflect::get(target, &JsValue::from_str(key))
        .ok()
        .filter(|v| !v.is_undefined() && !v.is_null())
}

fn is_phantom(target: &JsValue) -> bool {
    get(target, "isPhantom").map(|v| v.is_truthy()).unwrap_or(false)
}

fn js_string(value: &JsValue) -> Option<String> {
    value
        .as_string()
        .or_else(|| value.dyn_ref::<Object>().map(|o| String::from(o.to_string())))
}

fn to_wallet_error(err: JsValue) -> WalletError {
    if get(&err, "code").and_then(|c| c.as_f64()) == Some(USER_REJECTED_CODE) {
        return WalletError::Rejected;
    }
    let message = get(&err, "message")
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{:?}", err));
    WalletError::Provider(message)
}

/// the injected provider handle
#[derive(Clone, Copy, Debug, Default)]
pub struct PhantomWallet;

impl PhantomWallet {
    pub fn new() -> Self {
        Self
    }

    /// `window.phantom.solana`, only when both injection points report phantom
    fn provider(&self) -> Option<JsValue> {
        let window: JsValue = web_sys::window()?.into();
        let provider = get(&window, "phantom").and_then(|p| get(&p, "solana"))?;
        let legacy = get(&window, "solana")?;
        (is_phantom(&provider) && is_phantom(&legacy)).then_some(provider)
    }

    /// call `provider[method](...args)` and await it if it returns a promise
    async fn call(&self, method: &str, args: &Array) -> Result<JsValue, WalletError> {
        let provider = self.provider().ok_or(WalletError::Unavailable)?;
        let function: Function = get(&provider, method)
            .and_then(|f| f.dyn_into().ok())
            .ok_or_else(|| WalletError::Provider(format!("provider has no {}()", method)))?;

        let returned = function.apply(&provider, args).map_err(to_wallet_error)?;
        match returned.dyn_into::<Promise>() {
            Ok(promise) => JsFuture::from(promise).await.map_err(to_wallet_error),
            Err(value) => Ok(value),
        }
    }
}

#[async_trait(?Send)]
impl WalletProvider for PhantomWallet {
    fn is_available(&self) -> bool {
        self.provider().is_some()
    }

    async fn connect(&self) -> Result<Pubkey, WalletError> {
        let response = self.call("connect", &Array::new()).await?;
        let key = get(&response, "publicKey")
            .and_then(|k| js_string(&k))
            .ok_or_else(|| WalletError::Provider("connect returned no publicKey".into()))?;
        key.parse()
            .map_err(|e| WalletError::Provider(format!("bad publicKey: {}", e)))
    }

    async fn sign_transaction(&self, mut tx: Transaction) -> Result<Transaction, WalletError> {
        let payer = *tx
            .message
            .fee_payer()
            .ok_or_else(|| WalletError::Provider("transaction has no fee payer".into()))?;

        let params = Object::new();
        Reflect::set(
            &params,
            &"message".into(),
            &JsValue::from_str(&bs58::encode(tx.message_data()).into_string()),
        )
        .map_err(to_wallet_error)?;
        let request = Object::new();
        Reflect::set(&request, &"method".into(), &"signTransaction".into()).map_err(to_wallet_error)?;
        Reflect::set(&request, &"params".into(), &params).map_err(to_wallet_error)?;

        let response = self.call("request", &Array::of1(&request)).await?;
        let signature: Signature = get(&response, "signature")
            .and_then(|s| s.as_string())
            .ok_or_else(|| WalletError::Provider("signTransaction returned no signature".into()))?
            .parse()
            .map_err(|e| WalletError::Provider(format!("bad signature: {}", e)))?;

        tx.add_signature(&payer, signature)
            .map_err(|e| WalletError::Provider(e.to_string()))?;
        Ok(tx)
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        self.call("disconnect", &Array::new()).await.map(|_| ())
    }
}
