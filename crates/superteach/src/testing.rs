//! in-memory fakes for the host and network seams
//!
//! used by the unit tests and by `tests/`; nothing here touches the network.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use crate::host::{Clock, Navigator, Notifier};
use crate::pubkey::{Blockhash, Pubkey, Signature};
use crate::rpc::{ChainRpc, Commitment, Confirmation, LatestBlockhash, RpcError};
use crate::tx::Transaction;
use crate::upload::{ContentSource, FetchedContent, UploadError, UploadFile, UploadOptions, Uploader};
use crate::wallet::{WalletError, WalletProvider};

/// scripted cluster
#[derive(Default)]
pub struct MockRpc {
    balances: Mutex<HashMap<Pubkey, u64>>,
    fail_balance: bool,
    fail_submission: bool,
    confirm_slot: Option<u64>,
    balance_calls: Mutex<usize>,
    blockhash_calls: Mutex<usize>,
    submitted: Mutex<Vec<Vec<u8>>>,
}

impl MockRpc {
    pub const BLOCKHASH: Blockhash = Blockhash([7u8; 32]);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(self, address: Pubkey, lamports: u64) -> Self {
        self.balances.lock().insert(address, lamports);
        self
    }

    pub fn failing_balance(mut self) -> Self {
        self.fail_balance = true;
        self
    }

    pub fn failing_submission(mut self) -> Self {
        self.fail_submission = true;
        self
    }

    /// confirm every submission at `slot`; without this confirmation times out
    pub fn confirming_at(mut self, slot: u64) -> Self {
        self.confirm_slot = Some(slot);
        self
    }

    pub fn set_balance(&self, address: Pubkey, lamports: u64) {
        self.balances.lock().insert(address, lamports);
    }

    pub fn blockhash(&self) -> Blockhash {
        Self::BLOCKHASH
    }

    pub fn balance_calls(&self) -> usize {
        *self.balance_calls.lock()
    }

    pub fn blockhash_calls(&self) -> usize {
        *self.blockhash_calls.lock()
    }

    pub fn submitted(&self) -> Vec<Vec<u8>> {
        self.submitted.lock().clone()
    }
}

#[async_trait(?Send)]
impl ChainRpc for MockRpc {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        *self.balance_calls.lock() += 1;
        if self.fail_balance {
            return Err(RpcError::Transport("connection refused".into()));
        }
        Ok(self.balances.lock().get(address).copied().unwrap_or(0))
    }

    async fn get_latest_blockhash(&self) -> Result<LatestBlockhash, RpcError> {
        *self.blockhash_calls.lock() += 1;
        Ok(LatestBlockhash {
            blockhash: Self::BLOCKHASH,
            last_valid_block_height: 1_000,
        })
    }

    async fn send_raw_transaction(&self, tx: &[u8]) -> Result<Signature, RpcError> {
        if self.fail_submission {
            return Err(RpcError::Rpc {
                code: -32002,
                message: "Transaction simulation failed: Blockhash not found".into(),
            });
        }
        let decoded = Transaction::deserialize(tx).map_err(|e| RpcError::Rpc {
            code: -32602,
            message: e.to_string(),
        })?;
        let signature = decoded
            .id()
            .ok_or_else(|| RpcError::Decode("no signatures".into()))?;
        self.submitted.lock().push(tx.to_vec());
        Ok(signature)
    }

    async fn confirm_transaction(&self, _signature: &Signature, _commitment: Commitment) -> Result<Confirmation, RpcError> {
        match self.confirm_slot {
            Some(slot) => Ok(Confirmation { slot }),
            None => Err(RpcError::Timeout(Duration::from_secs(60))),
        }
    }
}

/// provider double; hands transactions back untouched
pub struct MockWallet {
    address: Pubkey,
    available: bool,
    reject_connect: bool,
    reject_signatures: bool,
    disconnects: Mutex<usize>,
}

impl MockWallet {
    pub fn new(address: Pubkey) -> Self {
        Self {
            address,
            available: true,
            reject_connect: false,
            reject_signatures: false,
            disconnects: Mutex::new(0),
        }
    }

    /// no injected provider at all
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Pubkey::default())
        }
    }

    pub fn rejecting_connect(mut self) -> Self {
        self.reject_connect = true;
        self
    }

    pub fn rejecting_signatures(mut self) -> Self {
        self.reject_signatures = true;
        self
    }

    pub fn disconnects(&self) -> usize {
        *self.disconnects.lock()
    }
}

#[async_trait(?Send)]
impl WalletProvider for MockWallet {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn connect(&self) -> Result<Pubkey, WalletError> {
        if !self.available {
            return Err(WalletError::Unavailable);
        }
        if self.reject_connect {
            return Err(WalletError::Rejected);
        }
        Ok(self.address)
    }

    async fn sign_transaction(&self, tx: Transaction) -> Result<Transaction, WalletError> {
        if self.reject_signatures {
            return Err(WalletError::Rejected);
        }
        Ok(tx)
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        *self.disconnects.lock() += 1;
        Ok(())
    }
}

/// records navigation instead of performing it
#[derive(Default)]
pub struct RecordingNavigator {
    opened: Mutex<Vec<(String, Duration)>>,
    reloads: Mutex<usize>,
}

impl RecordingNavigator {
    pub fn opened(&self) -> Vec<(String, Duration)> {
        self.opened.lock().clone()
    }

    pub fn reloads(&self) -> usize {
        *self.reloads.lock()
    }
}

impl Navigator for RecordingNavigator {
    fn open_after(&self, url: &str, delay: Duration) {
        self.opened.lock().push((url.to_string(), delay));
    }

    fn reload(&self) {
        *self.reloads.lock() += 1;
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    successes: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn successes(&self) -> Vec<String> {
        self.successes.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.successes.lock().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }
}

/// returns immediately, counting the requested sleeps
#[derive(Default)]
pub struct InstantClock {
    slept: Mutex<Vec<Duration>>,
}

impl InstantClock {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().clone()
    }
}

#[async_trait(?Send)]
impl Clock for InstantClock {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().push(duration);
    }
}

pub struct MockSource {
    content: Option<FetchedContent>,
    fetched: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn returning(bytes: Vec<u8>, content_type: Option<&str>) -> Self {
        Self {
            content: Some(FetchedContent {
                bytes,
                content_type: content_type.map(str::to_string),
            }),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            content: None,
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

#[async_trait(?Send)]
impl ContentSource for MockSource {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, UploadError> {
        self.fetched.lock().push(url.to_string());
        self.content
            .clone()
            .ok_or_else(|| UploadError::Fetch(format!("404 Not Found for {}", url)))
    }
}

pub struct MockUploader {
    urls: Option<Vec<String>>,
    batches: Mutex<Vec<(Vec<UploadFile>, UploadOptions)>>,
}

impl MockUploader {
    pub fn returning(urls: Vec<String>) -> Self {
        Self {
            urls: Some(urls),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            urls: None,
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn batches(&self) -> Vec<(Vec<UploadFile>, UploadOptions)> {
        self.batches.lock().clone()
    }
}

#[async_trait(?Send)]
impl Uploader for MockUploader {
    async fn upload(&self, files: Vec<UploadFile>, options: UploadOptions) -> Result<Vec<String>, UploadError> {
        self.batches.lock().push((files, options));
        self.urls
            .clone()
            .ok_or_else(|| UploadError::Request("401 Unauthorized".into()))
    }
}
