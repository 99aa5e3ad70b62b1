//! single-instruction native transfer
//!
//! ```text
//! Idle ─► BalanceChecked ─► Built ─► Signed ─► Submitted ─► Confirmed
//!   └──────────┴──────────────┴────────┴──────────┴─► Failed
//! ```
//!
//! the balance check happens before anything is built, so a rejected
//! transfer never fetches a blockhash, asks for a signature or submits.
//! one transfer per sender may be in flight at a time.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::balance::BalanceReader;
use crate::config::{Cluster, StarterConfig};
use crate::error::{Result, StarterError};
use crate::pubkey::Pubkey;
use crate::rpc::{ChainRpc, Commitment};
use crate::tx::Transaction;
use crate::units::parse_sol;
use crate::wallet::WalletProvider;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferStage {
    Idle,
    BalanceChecked,
    Built,
    Signed,
    Submitted,
    Confirmed,
    Failed,
}

/// one submission, rebuilt from the form every time
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRequest {
    pub sender: Pubkey,
    pub recipient: Pubkey,
    pub amount_lamports: u64,
}

impl TransferRequest {
    /// build from form text; `sender` is the connected account, if any
    pub fn from_form(sender: Option<Pubkey>, recipient: &str, amount: &str) -> Result<Self> {
        let sender = sender.ok_or(StarterError::NotConnected)?;
        let recipient = recipient.parse().map_err(|e| {
            StarterError::TransactionBuildFailed(format!("invalid recipient address: {}", e))
        })?;
        let amount_lamports = parse_sol(amount)
            .map_err(|e| StarterError::TransactionBuildFailed(e.to_string()))?;

        Ok(Self {
            sender,
            recipient,
            amount_lamports,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferResult {
    pub transaction_id: String,
    pub explorer_url: String,
    pub confirmed_slot: u64,
}

/// single-slot lock per sender address
#[derive(Clone, Default)]
pub struct InFlightGuard {
    active: Arc<Mutex<HashSet<Pubkey>>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another transfer from `sender` is outstanding
    pub fn try_acquire(&self, sender: Pubkey) -> Option<InFlightPermit> {
        if !self.active.lock().insert(sender) {
            return None;
        }
        Some(InFlightPermit {
            active: self.active.clone(),
            sender,
        })
    }

    pub fn is_busy(&self, sender: &Pubkey) -> bool {
        self.active.lock().contains(sender)
    }
}

/// released on drop, whichever way the flow ends
pub struct InFlightPermit {
    active: Arc<Mutex<HashSet<Pubkey>>>,
    sender: Pubkey,
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.active.lock().remove(&self.sender);
    }
}

pub struct TransferExecutor {
    rpc: Arc<dyn ChainRpc>,
    wallet: Arc<dyn WalletProvider>,
    balances: BalanceReader,
    cluster: Cluster,
    commitment: Commitment,
    in_flight: InFlightGuard,
    stage: Mutex<TransferStage>,
}

impl TransferExecutor {
    pub fn new(rpc: Arc<dyn ChainRpc>, wallet: Arc<dyn WalletProvider>, config: &StarterConfig) -> Self {
        Self {
            balances: BalanceReader::new(rpc.clone()),
            rpc,
            wallet,
            cluster: config.cluster,
            commitment: config.commitment,
            in_flight: InFlightGuard::new(),
            stage: Mutex::new(TransferStage::Idle),
        }
    }

    pub fn in_flight(&self) -> &InFlightGuard {
        &self.in_flight
    }

    /// stage reached by the most recent transfer
    pub fn last_stage(&self) -> TransferStage {
        *self.stage.lock()
    }

    /// run the whole flow for one request
    pub async fn execute(&self, request: &TransferRequest) -> Result<TransferResult> {
        let _permit = self
            .in_flight
            .try_acquire(request.sender)
            .ok_or_else(|| StarterError::TransferInProgress(request.sender.to_string()))?;

        self.advance(TransferStage::Idle);
        self.run(request).await.inspect_err(|e| {
            debug!(from = ?self.last_stage(), error = %e, "transfer failed");
            self.advance(TransferStage::Failed);
        })
    }

    async fn run(&self, request: &TransferRequest) -> Result<TransferResult> {
        // balance is re-read just in time; competing transfers from the same
        // account outside this page can still race it
        let balance = self.balances.get_balance(&request.sender).await?;
        if request.amount_lamports >= balance.lamports {
            return Err(StarterError::InsufficientFunds {
                balance: balance.lamports,
                requested: request.amount_lamports,
            });
        }
        self.advance(TransferStage::BalanceChecked);

        // fetch the blockhash as late as possible so it is fresh at signing
        let latest = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| StarterError::TransactionBuildFailed(e.to_string()))?;
        let tx = Transaction::transfer(
            &request.sender,
            &request.recipient,
            request.amount_lamports,
            latest.blockhash,
        )
        .map_err(|e| StarterError::TransactionBuildFailed(e.to_string()))?;
        debug!(
            blockhash = %latest.blockhash,
            last_valid_block_height = latest.last_valid_block_height,
            "transaction built"
        );
        self.advance(TransferStage::Built);

        let signed = self
            .wallet
            .sign_transaction(tx)
            .await
            .map_err(|e| StarterError::UserRejectedSigning(e.to_string()))?;
        if signed.message.fee_payer() != Some(&request.sender) {
            return Err(StarterError::UserRejectedSigning(
                "wallet returned a transaction with a different fee payer".into(),
            ));
        }
        signed
            .verify()
            .map_err(|e| StarterError::UserRejectedSigning(e.to_string()))?;
        self.advance(TransferStage::Signed);

        let signature = self
            .rpc
            .send_raw_transaction(&signed.serialize())
            .await
            .map_err(|e| StarterError::SubmissionFailed(e.to_string()))?;
        if signed.id() != Some(signature) {
            warn!(signature = %signature, "node reported a signature other than the fee payer's");
        }
        info!(signature = %signature, "transaction sent");
        self.advance(TransferStage::Submitted);

        let explorer_url = self.cluster.explorer_tx_url(&signature.to_string());
        let confirmation = self
            .rpc
            .confirm_transaction(&signature, self.commitment)
            .await
            .map_err(|e| StarterError::ConfirmationFailed {
                signature: signature.to_string(),
                explorer_url: explorer_url.clone(),
                reason: e.to_string(),
            })?;
        self.advance(TransferStage::Confirmed);

        Ok(TransferResult {
            transaction_id: signature.to_string(),
            explorer_url,
            confirmed_slot: confirmation.slot,
        })
    }

    fn advance(&self, stage: TransferStage) {
        *self.stage.lock() = stage;
        debug!(stage = ?stage, "transfer stage");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockRpc, MockWallet};
    use crate::units::LAMPORTS_PER_SOL;
    use crate::wallet::KeypairWallet;

    fn executor(rpc: Arc<MockRpc>, wallet: Arc<dyn WalletProvider>) -> TransferExecutor {
        TransferExecutor::new(rpc, wallet, &StarterConfig::devnet())
    }

    #[test]
    fn test_request_from_form() {
        let sender = Pubkey([1u8; 32]);
        let recipient = Pubkey([2u8; 32]).to_string();

        let req = TransferRequest::from_form(Some(sender), &recipient, "1.5").unwrap();
        assert_eq!(req.amount_lamports, 1_500_000_000);
        assert_eq!(req.recipient, Pubkey([2u8; 32]));

        assert_eq!(
            TransferRequest::from_form(None, &recipient, "1"),
            Err(StarterError::NotConnected)
        );
        assert!(matches!(
            TransferRequest::from_form(Some(sender), "nope", "1"),
            Err(StarterError::TransactionBuildFailed(_))
        ));
        assert!(matches!(
            TransferRequest::from_form(Some(sender), &recipient, "abc"),
            Err(StarterError::TransactionBuildFailed(_))
        ));
    }

    #[test]
    fn test_in_flight_guard() {
        let guard = InFlightGuard::new();
        let a = Pubkey([1u8; 32]);
        let b = Pubkey([2u8; 32]);

        let permit = guard.try_acquire(a).unwrap();
        assert!(guard.try_acquire(a).is_none());
        assert!(guard.try_acquire(b).is_some());
        assert!(guard.is_busy(&a));

        drop(permit);
        assert!(!guard.is_busy(&a));
        assert!(guard.try_acquire(a).is_some());
    }

    #[tokio::test]
    async fn test_insufficient_funds_builds_nothing() {
        let wallet = Arc::new(KeypairWallet::from_seed([1u8; 32]));
        wallet.connect().await.unwrap();
        let sender = wallet.pubkey();
        let rpc = Arc::new(MockRpc::new().with_balance(sender, 2 * LAMPORTS_PER_SOL));
        let exec = executor(rpc.clone(), wallet);

        let req = TransferRequest::from_form(Some(sender), &Pubkey([9u8; 32]).to_string(), "5").unwrap();
        let err = exec.execute(&req).await.unwrap_err();

        assert_eq!(
            err,
            StarterError::InsufficientFunds {
                balance: 2 * LAMPORTS_PER_SOL,
                requested: 5 * LAMPORTS_PER_SOL,
            }
        );
        assert_eq!(rpc.blockhash_calls(), 0);
        assert!(rpc.submitted().is_empty());
        assert!(!exec.in_flight().is_busy(&sender));
        assert_eq!(exec.last_stage(), TransferStage::Failed);
    }

    #[tokio::test]
    async fn test_amount_equal_to_balance_is_rejected() {
        let wallet = Arc::new(KeypairWallet::from_seed([1u8; 32]));
        let sender = wallet.pubkey();
        let rpc = Arc::new(MockRpc::new().with_balance(sender, LAMPORTS_PER_SOL));
        let exec = executor(rpc.clone(), wallet);

        let req = TransferRequest {
            sender,
            recipient: Pubkey([9u8; 32]),
            amount_lamports: LAMPORTS_PER_SOL,
        };
        assert!(matches!(
            exec.execute(&req).await,
            Err(StarterError::InsufficientFunds { .. })
        ));
        assert_eq!(rpc.blockhash_calls(), 0);
    }

    #[tokio::test]
    async fn test_successful_transfer() {
        let wallet = Arc::new(KeypairWallet::from_seed([1u8; 32]));
        wallet.connect().await.unwrap();
        let sender = wallet.pubkey();
        let rpc = Arc::new(
            MockRpc::new()
                .with_balance(sender, 10 * LAMPORTS_PER_SOL)
                .confirming_at(4242),
        );
        let exec = executor(rpc.clone(), wallet);

        let req = TransferRequest::from_form(Some(sender), &Pubkey([9u8; 32]).to_string(), "1.5").unwrap();
        let result = exec.execute(&req).await.unwrap();

        let submitted = rpc.submitted();
        assert_eq!(submitted.len(), 1);
        let tx = Transaction::deserialize(&submitted[0]).unwrap();
        tx.verify().unwrap();
        assert_eq!(tx.message.transfer_lamports(), Some(1_500_000_000));
        assert_eq!(tx.message.fee_payer(), Some(&sender));
        assert_eq!(tx.message.recent_blockhash, rpc.blockhash());

        assert_eq!(result.confirmed_slot, 4242);
        assert_eq!(exec.last_stage(), TransferStage::Confirmed);
        assert_eq!(result.transaction_id, tx.signatures[0].to_string());
        assert_eq!(
            result.explorer_url,
            format!(
                "https://explorer.solana.com/tx/{}?cluster=devnet",
                result.transaction_id
            )
        );
    }

    #[tokio::test]
    async fn test_rejected_signature() {
        let wallet = Arc::new(MockWallet::new(Pubkey([1u8; 32])).rejecting_signatures());
        let rpc = Arc::new(MockRpc::new().with_balance(Pubkey([1u8; 32]), 10 * LAMPORTS_PER_SOL));
        let exec = executor(rpc.clone(), wallet);

        let req = TransferRequest {
            sender: Pubkey([1u8; 32]),
            recipient: Pubkey([9u8; 32]),
            amount_lamports: 1,
        };
        let err = exec.execute(&req).await.unwrap_err();
        assert!(matches!(err, StarterError::UserRejectedSigning(_)));
        assert_eq!(err.failed_stage(), Some(TransferStage::Built));
        assert_eq!(exec.last_stage(), TransferStage::Failed);
        assert_eq!(rpc.blockhash_calls(), 1);
        assert!(rpc.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_unsigned_return_is_rejected() {
        // a provider that hands back the transaction without signing it
        let wallet = Arc::new(MockWallet::new(Pubkey([1u8; 32])));
        let rpc = Arc::new(MockRpc::new().with_balance(Pubkey([1u8; 32]), 10 * LAMPORTS_PER_SOL));
        let exec = executor(rpc.clone(), wallet);

        let req = TransferRequest {
            sender: Pubkey([1u8; 32]),
            recipient: Pubkey([9u8; 32]),
            amount_lamports: 1,
        };
        assert!(matches!(
            exec.execute(&req).await,
            Err(StarterError::UserRejectedSigning(_))
        ));
        assert!(rpc.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_submission_failure() {
        let wallet = Arc::new(KeypairWallet::from_seed([1u8; 32]));
        wallet.connect().await.unwrap();
        let sender = wallet.pubkey();
        let rpc = Arc::new(
            MockRpc::new()
                .with_balance(sender, 10 * LAMPORTS_PER_SOL)
                .failing_submission(),
        );
        let exec = executor(rpc, wallet);

        let req = TransferRequest {
            sender,
            recipient: Pubkey([9u8; 32]),
            amount_lamports: 1,
        };
        assert!(matches!(
            exec.execute(&req).await,
            Err(StarterError::SubmissionFailed(_))
        ));
        assert!(!exec.in_flight().is_busy(&sender));
        assert_eq!(exec.last_stage(), TransferStage::Failed);
    }

    #[tokio::test]
    async fn test_confirmation_timeout_is_ambiguous() {
        let wallet = Arc::new(KeypairWallet::from_seed([1u8; 32]));
        wallet.connect().await.unwrap();
        let sender = wallet.pubkey();
        let rpc = Arc::new(MockRpc::new().with_balance(sender, 10 * LAMPORTS_PER_SOL));
        let exec = executor(rpc.clone(), wallet);

        let req = TransferRequest {
            sender,
            recipient: Pubkey([9u8; 32]),
            amount_lamports: 1,
        };
        match exec.execute(&req).await {
            Err(StarterError::ConfirmationFailed {
                signature,
                explorer_url,
                ..
            }) => {
                // it was submitted, the user gets the link to check
                assert_eq!(rpc.submitted().len(), 1);
                assert!(explorer_url.contains(&signature));
            }
            other => panic!("expected ConfirmationFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_submission_while_busy() {
        let wallet = Arc::new(KeypairWallet::from_seed([1u8; 32]));
        let sender = wallet.pubkey();
        let rpc = Arc::new(MockRpc::new().with_balance(sender, 10 * LAMPORTS_PER_SOL));
        let exec = executor(rpc.clone(), wallet);

        let _held = exec.in_flight().try_acquire(sender).unwrap();
        let req = TransferRequest {
            sender,
            recipient: Pubkey([9u8; 32]),
            amount_lamports: 1,
        };
        assert!(matches!(
            exec.execute(&req).await,
            Err(StarterError::TransferInProgress(_))
        ));
        assert_eq!(rpc.balance_calls(), 0);
        // a rejected duplicate leaves the running transfer's stage alone
        assert_eq!(exec.last_stage(), TransferStage::Idle);
    }
}
