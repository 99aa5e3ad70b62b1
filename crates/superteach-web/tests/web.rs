//! browser tests: wasm-pack test --headless --firefox crates/superteach-web
#![cfg(target_arch = "wasm32")]

use wasm_bindgen_test::*;

use superteach::storage::{KeyValueStore, KEY_PUBLIC_KEY};
use superteach::wallet::{WalletError, WalletProvider};
use superteach_web::{LocalStorage, PhantomWallet};

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn local_storage_roundtrip() {
    let store = LocalStorage;
    store.set(KEY_PUBLIC_KEY, "11111111111111111111111111111111").unwrap();
    assert_eq!(
        store.get(KEY_PUBLIC_KEY).unwrap().as_deref(),
        Some("11111111111111111111111111111111")
    );
    store.remove(KEY_PUBLIC_KEY).unwrap();
    store.remove(KEY_PUBLIC_KEY).unwrap();
    assert_eq!(store.get(KEY_PUBLIC_KEY).unwrap(), None);
}

#[wasm_bindgen_test]
async fn phantom_absent_in_test_browser() {
    let wallet = PhantomWallet::new();
    assert!(!wallet.is_available());
    assert_eq!(wallet.connect().await, Err(WalletError::Unavailable));
}
