//! cluster json-rpc client
//!
//! only the four calls the page needs: balance, latest blockhash, raw
//! submission and signature status polling.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::StarterConfig;
use crate::host::Clock;
use crate::pubkey::{Blockhash, Pubkey, Signature};

/// durability requested when reading or confirming state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("transaction failed on chain: {0}")]
    TransactionFailed(String),

    #[error("not confirmed after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, RpcError>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LatestBlockhash {
    pub blockhash: Blockhash,
    pub last_valid_block_height: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Confirmation {
    pub slot: u64,
}

/// chain operations used by the flows
#[async_trait(?Send)]
pub trait ChainRpc {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64>;

    async fn get_latest_blockhash(&self) -> Result<LatestBlockhash>;

    /// submit serialized transaction bytes, returns the signature the node reports
    async fn send_raw_transaction(&self, tx: &[u8]) -> Result<Signature>;

    /// wait until `signature` reaches `commitment`
    async fn confirm_transaction(&self, signature: &Signature, commitment: Commitment) -> Result<Confirmation>;
}

/// one entry of `getSignatureStatuses`
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmations: Option<u64>,
    #[serde(default)]
    pub err: Option<Value>,
    pub confirmation_status: Option<Commitment>,
}

impl SignatureStatus {
    /// commitment reached; nodes report `confirmations: null` once rooted
    pub fn reached(&self) -> Commitment {
        match (self.confirmation_status, self.confirmations) {
            (Some(c), _) => c,
            (None, None) => Commitment::Finalized,
            (None, Some(_)) => Commitment::Processed,
        }
    }
}

/// what one poll tells us
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Pending,
    Confirmed(Confirmation),
    Failed(String),
}

pub fn poll_outcome(status: Option<&SignatureStatus>, commitment: Commitment) -> PollOutcome {
    match status {
        None => PollOutcome::Pending,
        Some(s) => match &s.err {
            Some(err) if !err.is_null() => PollOutcome::Failed(err.to_string()),
            _ if s.reached() >= commitment => PollOutcome::Confirmed(Confirmation { slot: s.slot }),
            _ => PollOutcome::Pending,
        },
    }
}

/// how long and how often to poll for a signature status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollBudget {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollBudget {
    /// polls that fit in the timeout, at least one
    pub fn max_polls(&self) -> u32 {
        let interval = self.interval.as_millis().max(1);
        let polls = self.timeout.as_millis().div_ceil(interval);
        polls.clamp(1, u32::MAX as u128) as u32
    }
}

/// fetch the status until it reaches `commitment`, fails on chain, or the
/// budget runs out. sleeps `budget.interval` between fetches, not before
/// the first. transport errors end the loop straight away.
pub async fn poll_until<F, Fut>(
    clock: &dyn Clock,
    budget: PollBudget,
    commitment: Commitment,
    mut fetch_status: F,
) -> Result<Confirmation>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<SignatureStatus>>>,
{
    for attempt in 0..budget.max_polls() {
        if attempt > 0 {
            clock.sleep(budget.interval).await;
        }
        let status = fetch_status().await?;
        match poll_outcome(status.as_ref(), commitment) {
            PollOutcome::Pending => continue,
            PollOutcome::Confirmed(confirmation) => return Ok(confirmation),
            PollOutcome::Failed(err) => return Err(RpcError::TransactionFailed(err)),
        }
    }
    Err(RpcError::Timeout(budget.timeout))
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// `{ context, value }` envelope used by most read calls
#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockhashValue {
    blockhash: String,
    last_valid_block_height: u64,
}

/// unwrap a json-rpc 2.0 response body
pub fn decode_response(body: Value) -> Result<Value> {
    let response: RpcResponse =
        serde_json::from_value(body).map_err(|e| RpcError::Decode(e.to_string()))?;

    if let Some(error) = response.error {
        return Err(RpcError::Rpc {
            code: error.code,
            message: error.message,
        });
    }

    response
        .result
        .ok_or_else(|| RpcError::Decode("no result in response".into()))
}

fn from_value<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| RpcError::Decode(e.to_string()))
}

/// reqwest-backed client for a cluster endpoint
#[derive(Clone)]
pub struct JsonRpcClient {
    url: String,
    client: Client,
    commitment: Commitment,
    confirm_timeout: Duration,
    poll_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl JsonRpcClient {
    pub fn new(url: &str, commitment: Commitment, clock: Arc<dyn Clock>) -> Self {
        Self {
            url: url.to_string(),
            client: Client::new(),
            commitment,
            confirm_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            clock,
        }
    }

    pub fn from_config(config: &StarterConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            confirm_timeout: config.rpc.confirm_timeout(),
            poll_interval: config.rpc.poll_interval(),
            ..Self::new(config.rpc_url(), config.commitment, clock)
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        tracing::debug!(method, url = %self.url, "rpc call");

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        decode_response(body)
    }

    pub async fn get_signature_status(&self, signature: &Signature) -> Result<Option<SignatureStatus>> {
        let result = self
            .call(
                "getSignatureStatuses",
                json!([[signature.to_string()], { "searchTransactionHistory": false }]),
            )
            .await?;
        let statuses: WithContext<Vec<Option<SignatureStatus>>> = from_value(result)?;
        Ok(statuses.value.into_iter().next().flatten())
    }

    pub fn budget(&self) -> PollBudget {
        PollBudget {
            interval: self.poll_interval,
            timeout: self.confirm_timeout,
        }
    }
}

#[async_trait(?Send)]
impl ChainRpc for JsonRpcClient {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        let result = self
            .call(
                "getBalance",
                json!([address.to_string(), { "commitment": self.commitment.as_str() }]),
            )
            .await?;
        let balance: WithContext<u64> = from_value(result)?;
        Ok(balance.value)
    }

    async fn get_latest_blockhash(&self) -> Result<LatestBlockhash> {
        let result = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": self.commitment.as_str() }]),
            )
            .await?;
        let latest: WithContext<BlockhashValue> = from_value(result)?;
        let blockhash = latest
            .value
            .blockhash
            .parse()
            .map_err(|e| RpcError::Decode(format!("blockhash: {}", e)))?;
        Ok(LatestBlockhash {
            blockhash,
            last_valid_block_height: latest.value.last_valid_block_height,
        })
    }

    async fn send_raw_transaction(&self, tx: &[u8]) -> Result<Signature> {
        let encoded = STANDARD.encode(tx);
        let result = self
            .call(
                "sendTransaction",
                json!([encoded, {
                    "encoding": "base64",
                    "skipPreflight": false,
                    "preflightCommitment": self.commitment.as_str(),
                }]),
            )
            .await?;
        let signature: String = from_value(result)?;
        signature
            .parse()
            .map_err(|e| RpcError::Decode(format!("signature: {}", e)))
    }

    async fn confirm_transaction(&self, signature: &Signature, commitment: Commitment) -> Result<Confirmation> {
        poll_until(self.clock.as_ref(), self.budget(), commitment, || {
            self.get_signature_status(signature)
        })
        .await
    }
}
