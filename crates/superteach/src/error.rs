//! error types for the starter flows
//!
//! every flow failure maps onto one of these kinds. the page handlers log
//! and toast them; nothing propagates past the handler that started the flow.

use thiserror::Error;

use crate::transfer::TransferStage;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StarterError {
    #[error("wallet provider not available")]
    ProviderUnavailable,

    #[error("wallet connection rejected: {0}")]
    ConnectionRejected(String),

    #[error("no wallet connected")]
    NotConnected,

    #[error("balance fetch failed: {0}")]
    BalanceFetchFailed(String),

    #[error("insufficient funds: have {balance} lamports, need more than {requested}")]
    InsufficientFunds { balance: u64, requested: u64 },

    #[error("transfer already in flight for {0}")]
    TransferInProgress(String),

    #[error("transaction build failed: {0}")]
    TransactionBuildFailed(String),

    #[error("signing rejected: {0}")]
    UserRejectedSigning(String),

    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    #[error("confirmation failed for {signature}: {reason}")]
    ConfirmationFailed {
        signature: String,
        explorer_url: String,
        reason: String,
    },

    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, StarterError>;

impl StarterError {
    /// short message suitable for a toast
    pub fn user_message(&self) -> String {
        match self {
            StarterError::ProviderUnavailable => "Phantom is not installed".into(),
            StarterError::ConnectionRejected(_) => "Wallet connection was rejected".into(),
            StarterError::NotConnected => "Connect your wallet first".into(),
            StarterError::BalanceFetchFailed(_) => "Could not fetch the account balance".into(),
            StarterError::InsufficientFunds { .. } => "You don't have enough balance".into(),
            StarterError::TransferInProgress(_) => {
                "A transaction from this wallet is already in progress".into()
            }
            StarterError::TransactionBuildFailed(reason) => {
                format!("Could not build the transaction: {}", reason)
            }
            StarterError::UserRejectedSigning(_) => "Transaction signing was rejected".into(),
            StarterError::SubmissionFailed(_) => "Could not send the transaction".into(),
            StarterError::ConfirmationFailed { explorer_url, .. } => format!(
                "Transaction sent but not confirmed yet, check {}",
                explorer_url
            ),
            StarterError::UploadFailed(_) => "Could not upload the file".into(),
            StarterError::Config(_) | StarterError::Storage(_) => self.to_string(),
        }
    }

    /// transfer stage the error aborted, if it came from the transfer flow
    pub fn failed_stage(&self) -> Option<TransferStage> {
        match self {
            StarterError::BalanceFetchFailed(_)
            | StarterError::InsufficientFunds { .. }
            | StarterError::TransferInProgress(_) => Some(TransferStage::Idle),
            StarterError::TransactionBuildFailed(_) => Some(TransferStage::BalanceChecked),
            StarterError::UserRejectedSigning(_) => Some(TransferStage::Built),
            StarterError::SubmissionFailed(_) => Some(TransferStage::Signed),
            StarterError::ConfirmationFailed { .. } => Some(TransferStage::Submitted),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StarterError {
    fn from(e: std::io::Error) -> Self {
        StarterError::Config(e.to_string())
    }
}

impl From<toml::de::Error> for StarterError {
    fn from(e: toml::de::Error) -> Self {
        StarterError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_message_points_at_explorer() {
        let err = StarterError::ConfirmationFailed {
            signature: "abc".into(),
            explorer_url: "https://explorer.solana.com/tx/abc?cluster=devnet".into(),
            reason: "timeout".into(),
        };
        assert!(err.user_message().contains("https://explorer.solana.com/tx/abc"));
        assert_eq!(err.failed_stage(), Some(TransferStage::Submitted));
    }

    #[test]
    fn test_non_transfer_errors_have_no_stage() {
        assert_eq!(StarterError::ProviderUnavailable.failed_stage(), None);
        assert_eq!(StarterError::UploadFailed("x".into()).failed_stage(), None);
    }
}
