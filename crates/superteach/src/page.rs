//! the single starter page
//!
//! `Home` owns the form fields and display state and wires the flow
//! components together. handlers never return errors: failures are logged,
//! toasted, and reported as `None`.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info};

use crate::balance::{Balance, BalanceReader};
use crate::config::StarterConfig;
use crate::error::StarterError;
use crate::host::{Navigator, Notifier};
use crate::pubkey::{Pubkey, Signature};
use crate::rpc::ChainRpc;
use crate::session::SessionManager;
use crate::storage::KeyValueStore;
use crate::transfer::{TransferExecutor, TransferRequest, TransferResult};
use crate::upload::{ContentSource, UploadExecutor, UploadRequest, UploadResult, Uploader};
use crate::wallet::WalletProvider;

pub const TOAST_CONNECTED: &str = "Your wallet is connected";
pub const TOAST_TRANSFER_SENT: &str = "Transaction sent successfully!";

/// what the page renders
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageState {
    pub account_address: Option<Pubkey>,
    /// last successfully fetched balance
    pub balance: Option<Balance>,
    pub last_signature: Option<Signature>,
    pub receiver: String,
    pub amount: String,
    pub url: String,
    pub status_text: String,
}

/// host-provided collaborators
pub struct HomeServices {
    pub wallet: Arc<dyn WalletProvider>,
    pub store: Arc<dyn KeyValueStore>,
    pub rpc: Arc<dyn ChainRpc>,
    pub navigator: Arc<dyn Navigator>,
    pub notifier: Arc<dyn Notifier>,
    pub source: Arc<dyn ContentSource>,
    pub uploader: Arc<dyn Uploader>,
}

pub struct Home {
    sessions: SessionManager,
    balances: BalanceReader,
    transfers: TransferExecutor,
    uploads: UploadExecutor,
    notifier: Arc<dyn Notifier>,
    state: Mutex<PageState>,
}

impl Home {
    pub fn new(config: &StarterConfig, services: HomeServices) -> Self {
        Self {
            sessions: SessionManager::new(
                services.wallet.clone(),
                services.store,
                services.navigator,
                config.wallet.clone(),
            ),
            balances: BalanceReader::new(services.rpc.clone()),
            transfers: TransferExecutor::new(services.rpc, services.wallet, config),
            uploads: UploadExecutor::new(services.source, services.uploader),
            notifier: services.notifier,
            state: Mutex::new(PageState::default()),
        }
    }

    pub fn state(&self) -> PageState {
        self.state.lock().clone()
    }

    pub fn set_receiver(&self, value: &str) {
        self.state.lock().receiver = value.to_string();
    }

    pub fn set_amount(&self, value: &str) {
        self.state.lock().amount = value.to_string();
    }

    pub fn set_url(&self, value: &str) {
        self.state.lock().url = value.to_string();
    }

    pub fn transfers(&self) -> &TransferExecutor {
        &self.transfers
    }

    /// page load: pick up a stored session. storage only, the balance is
    /// fetched by `refresh_balance`
    pub fn restore(&self) -> Option<Pubkey> {
        let session = self.sessions.restore();
        let mut state = self.state.lock();
        state.account_address = session.account_address;
        state.last_signature = session.last_signature;
        session.account_address
    }

    pub async fn sign_in(&self) -> Option<Pubkey> {
        match self.sessions.connect().await {
            Ok(address) => {
                self.state.lock().account_address = Some(address);
                self.notifier.success(TOAST_CONNECTED);
                self.refresh_balance().await;
                Some(address)
            }
            Err(e) => {
                self.fail("sign in", &e);
                None
            }
        }
    }

    /// drops everything; the host reloads the page afterwards
    pub async fn sign_out(&self) {
        self.sessions.disconnect().await;
        *self.state.lock() = PageState::default();
    }

    /// on failure the previous balance stays on screen
    pub async fn refresh_balance(&self) -> Option<Balance> {
        let address = self.state.lock().account_address?;
        match self.balances.get_balance(&address).await {
            Ok(balance) => {
                self.state.lock().balance = Some(balance);
                Some(balance)
            }
            Err(e) => {
                self.fail("balance refresh", &e);
                None
            }
        }
    }

    pub async fn submit_transfer(&self) -> Option<TransferResult> {
        let (sender, receiver, amount) = {
            let state = self.state.lock();
            (state.account_address, state.receiver.clone(), state.amount.clone())
        };

        let request = match TransferRequest::from_form(sender, &receiver, &amount) {
            Ok(request) => request,
            Err(e) => {
                self.fail("transfer", &e);
                return None;
            }
        };

        match self.transfers.execute(&request).await {
            Ok(result) => {
                info!(
                    signature = %result.transaction_id,
                    slot = result.confirmed_slot,
                    explorer = %result.explorer_url,
                    "transfer confirmed"
                );
                let signature = result.transaction_id.parse::<Signature>().ok();
                {
                    let mut state = self.state.lock();
                    state.receiver.clear();
                    state.amount.clear();
                    state.last_signature = signature;
                }
                if let Some(signature) = signature {
                    self.sessions.record_signature(signature);
                }
                self.notifier.success(TOAST_TRANSFER_SENT);
                self.refresh_balance().await;
                Some(result)
            }
            Err(e) => {
                self.fail("transfer", &e);
                None
            }
        }
    }

    pub async fn upload_from_url(&self) -> Option<UploadResult> {
        let request = UploadRequest {
            source_url: self.state.lock().url.clone(),
        };
        let set_status = |text: &str| self.state.lock().status_text = text.to_string();

        match self.uploads.upload_from_url(&request, &set_status).await {
            Ok(result) => Some(result),
            Err(e) => {
                self.fail("upload", &e);
                None
            }
        }
    }

    fn fail(&self, flow: &str, e: &StarterError) {
        error!(flow, error = %e, "flow failed");
        self.notifier.error(&e.user_message());
    }
}
