//! wallet session: connect, restore on reload, disconnect

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::WalletConfig;
use crate::error::{Result, StarterError};
use crate::host::Navigator;
use crate::pubkey::{Pubkey, Signature};
use crate::storage::{KeyValueStore, KEY_PUBLIC_KEY, KEY_SIGNATURE};
use crate::wallet::{WalletError, WalletProvider};

/// page-owned link to the user's wallet
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub account_address: Option<Pubkey>,
    pub last_signature: Option<Signature>,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        self.account_address.is_some()
    }
}

pub struct SessionManager {
    wallet: Arc<dyn WalletProvider>,
    store: Arc<dyn KeyValueStore>,
    navigator: Arc<dyn Navigator>,
    config: WalletConfig,
    session: Mutex<Session>,
}

impl SessionManager {
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
        config: WalletConfig,
    ) -> Self {
        Self {
            wallet,
            store,
            navigator,
            config,
            session: Mutex::new(Session::default()),
        }
    }

    pub fn session(&self) -> Session {
        self.session.lock().clone()
    }

    pub fn address(&self) -> Option<Pubkey> {
        self.session.lock().account_address
    }

    /// request the wallet handshake and persist the address.
    ///
    /// with no provider injected this schedules the install page and fails
    /// with `ProviderUnavailable` without waiting for the redirect.
    pub async fn connect(&self) -> Result<Pubkey> {
        if !self.wallet.is_available() {
            self.navigator
                .open_after(&self.config.install_url, self.config.install_redirect_delay());
            return Err(StarterError::ProviderUnavailable);
        }

        let address = self.wallet.connect().await.map_err(|e| match e {
            WalletError::Unavailable => StarterError::ProviderUnavailable,
            other => StarterError::ConnectionRejected(other.to_string()),
        })?;

        self.session.lock().account_address = Some(address);
        if let Err(e) = self.store.set(KEY_PUBLIC_KEY, &address.to_string()) {
            warn!(error = %e, "could not persist connected address");
        }

        info!(address = %address, "wallet connected");
        Ok(address)
    }

    /// load the stored session, no network. absent or unreadable values
    /// leave the session disconnected.
    pub fn restore(&self) -> Session {
        let account_address = self.read_key::<Pubkey>(KEY_PUBLIC_KEY);
        let last_signature = self.read_key::<Signature>(KEY_SIGNATURE);

        let restored = Session {
            account_address,
            last_signature,
        };
        *self.session.lock() = restored.clone();
        restored
    }

    /// remember the last confirmed transfer
    pub fn record_signature(&self, signature: Signature) {
        self.session.lock().last_signature = Some(signature);
        if let Err(e) = self.store.set(KEY_SIGNATURE, &signature.to_string()) {
            warn!(error = %e, "could not persist last signature");
        }
    }

    /// clear state and storage, drop the provider session, reload the page
    pub async fn disconnect(&self) {
        *self.session.lock() = Session::default();

        for key in [KEY_PUBLIC_KEY, KEY_SIGNATURE] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "could not clear stored session key");
            }
        }

        if self.wallet.is_available() {
            if let Err(e) = self.wallet.disconnect().await {
                warn!(error = %e, "provider disconnect failed");
            }
        }

        info!("wallet disconnected");
        self.navigator.reload();
    }

    fn read_key<T: std::str::FromStr>(&self, key: &str) -> Option<T>
    where
        T::Err: std::fmt::Display,
    {
        let raw = match self.store.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, error = %e, "could not read stored session key");
                return None;
            }
        };
        match raw.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "ignoring unreadable stored value");
                None
            }
        }
    }
}
