//! wallet provider seam
//!
//! the page only ever asks a wallet to connect, sign one transaction and
//! disconnect. keys never leave the provider.

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use parking_lot::RwLock;
use thiserror::Error;

use crate::pubkey::Pubkey;
use crate::tx::Transaction;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("provider not available")]
    Unavailable,
    #[error("wallet not connected")]
    NotConnected,
    #[error("user rejected the request")]
    Rejected,
    #[error("provider error: {0}")]
    Provider(String),
}

pub type Result<T> = std::result::Result<T, WalletError>;

#[async_trait(?Send)]
pub trait WalletProvider {
    /// whether an injected provider is present
    fn is_available(&self) -> bool;

    /// authorization handshake, returns the account address
    async fn connect(&self) -> Result<Pubkey>;

    /// ask the user to sign; suspends until approved or rejected
    async fn sign_transaction(&self, tx: Transaction) -> Result<Transaction>;

    async fn disconnect(&self) -> Result<()>;
}

/// in-process ed25519 signer, for local development against devnet
pub struct KeypairWallet {
    key: SigningKey,
    connected: RwLock<bool>,
}

impl KeypairWallet {
    pub fn new(key: SigningKey) -> Self {
        Self {
            key,
            connected: RwLock::new(false),
        }
    }

    /// deterministic key from a 32-byte seed
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self::new(SigningKey::from_bytes(&seed))
    }

    pub fn pubkey(&self) -> Pubkey {
        Pubkey::from(self.key.verifying_key())
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.read()
    }
}

#[async_trait(?Send)]
impl WalletProvider for KeypairWallet {
    fn is_available(&self) -> bool {
        true
    }

    async fn connect(&self) -> Result<Pubkey> {
        *self.connected.write() = true;
        Ok(self.pubkey())
    }

    async fn sign_transaction(&self, mut tx: Transaction) -> Result<Transaction> {
        if !self.is_connected() {
            return Err(WalletError::NotConnected);
        }
        tx.sign(&self.key)
            .map_err(|e| WalletError::Provider(e.to_string()))?;
        Ok(tx)
    }

    async fn disconnect(&self) -> Result<()> {
        *self.connected.write() = false;
        Ok(())
    }
}
