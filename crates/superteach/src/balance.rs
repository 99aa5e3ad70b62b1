//! spendable balance of the active account

use std::sync::Arc;

use crate::error::{Result, StarterError};
use crate::pubkey::Pubkey;
use crate::rpc::ChainRpc;
use crate::units::{format_sol, lamports_to_sol};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Balance {
    pub lamports: u64,
}

impl Balance {
    pub fn from_lamports(lamports: u64) -> Self {
        Self { lamports }
    }

    /// whole-unit view
    pub fn as_sol(&self) -> f64 {
        lamports_to_sol(self.lamports)
    }
}

impl std::fmt::Display for Balance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_sol(self.lamports))
    }
}

pub struct BalanceReader {
    rpc: Arc<dyn ChainRpc>,
}

impl BalanceReader {
    pub fn new(rpc: Arc<dyn ChainRpc>) -> Self {
        Self { rpc }
    }

    /// single query, no retry
    pub async fn get_balance(&self, address: &Pubkey) -> Result<Balance> {
        tracing::debug!(address = %address, "fetching balance");
        self.rpc
            .get_balance(address)
            .await
            .map(Balance::from_lamports)
            .map_err(|e| StarterError::BalanceFetchFailed(e.to_string()))
    }
}
