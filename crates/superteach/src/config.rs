//! cluster and client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, StarterError};
use crate::rpc::Commitment;

/// public solana clusters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    #[default]
    Devnet,
    Testnet,
    MainnetBeta,
}

impl Cluster {
    /// cluster name as used by explorers and `clusterApiUrl`
    pub fn name(&self) -> &'static str {
        match self {
            Cluster::Devnet => "devnet",
            Cluster::Testnet => "testnet",
            Cluster::MainnetBeta => "mainnet-beta",
        }
    }

    /// public rpc endpoint for the cluster
    pub fn api_url(&self) -> &'static str {
        match self {
            Cluster::Devnet => "https://api.devnet.solana.com",
            Cluster::Testnet => "https://api.testnet.solana.com",
            Cluster::MainnetBeta => "https://api.mainnet-beta.solana.com",
        }
    }

    /// explorer link for a transaction signature
    pub fn explorer_tx_url(&self, signature: &str) -> String {
        format!(
            "https://explorer.solana.com/tx/{}?cluster={}",
            signature,
            self.name()
        )
    }
}

impl std::str::FromStr for Cluster {
    type Err = StarterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "devnet" => Ok(Cluster::Devnet),
            "testnet" => Ok(Cluster::Testnet),
            "mainnet-beta" | "mainnet" => Ok(Cluster::MainnetBeta),
            other => Err(StarterError::Config(format!("unknown cluster: {}", other))),
        }
    }
}

/// rpc endpoint settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// overrides the cluster endpoint when set
    pub url: Option<String>,
    /// upper bound on confirmation polling
    pub confirm_timeout_secs: u64,
    /// delay between signature status polls
    pub poll_interval_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: None,
            confirm_timeout_secs: 60,
            poll_interval_ms: 500,
        }
    }
}

impl RpcConfig {
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// wallet extension settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// opened when no provider is injected
    pub install_url: String,
    /// delay before the install page opens
    pub install_redirect_delay_ms: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            install_url: "https://phantom.app/".into(),
            install_redirect_delay_ms: 2000,
        }
    }
}

impl WalletConfig {
    pub fn install_redirect_delay(&self) -> Duration {
        Duration::from_millis(self.install_redirect_delay_ms)
    }
}

/// ipfs storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// multipart upload endpoint
    pub endpoint: String,
    /// gateway base that replaces `ipfs://`
    pub gateway_url: String,
    /// environment variable holding the storage secret key
    pub secret_key_env: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://storage.thirdweb.com/ipfs/upload".into(),
            gateway_url: "https://ipfs.io/ipfs/".into(),
            secret_key_env: "THIRDWEB_SECRET_KEY".into(),
        }
    }
}

impl UploadConfig {
    /// read the storage secret from the environment
    pub fn resolve_secret(&self) -> Result<String> {
        std::env::var(&self.secret_key_env).map_err(|_| {
            StarterError::Config(format!("{} is not set", self.secret_key_env))
        })
    }
}

/// top-level configuration, passed into every component constructor
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StarterConfig {
    pub cluster: Cluster,
    pub commitment: Commitment,
    pub rpc: RpcConfig,
    pub wallet: WalletConfig,
    pub upload: UploadConfig,
}

impl StarterConfig {
    /// devnet with confirmed commitment
    pub fn devnet() -> Self {
        Self::default()
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// rpc url, explicit override first
    pub fn rpc_url(&self) -> &str {
        self.rpc.url.as_deref().unwrap_or_else(|| self.cluster.api_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_devnet_defaults() {
        let config = StarterConfig::devnet();
        assert_eq!(config.cluster, Cluster::Devnet);
        assert_eq!(config.commitment, Commitment::Confirmed);
        assert_eq!(config.rpc_url(), "https://api.devnet.solana.com");
        assert_eq!(config.wallet.install_redirect_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_toml_overrides() {
        let config = StarterConfig::from_toml_str(
            r#"
            cluster = "testnet"

            [rpc]
            url = "http://127.0.0.1:8899"
            poll_interval_ms = 100

            [upload]
            secret_key_env = "MY_STORAGE_KEY"
            "#,
        )
        .unwrap();

        assert_eq!(config.cluster, Cluster::Testnet);
        assert_eq!(config.rpc_url(), "http://127.0.0.1:8899");
        assert_eq!(config.rpc.poll_interval(), Duration::from_millis(100));
        // untouched fields keep their defaults
        assert_eq!(config.rpc.confirm_timeout_secs, 60);
        assert_eq!(config.upload.secret_key_env, "MY_STORAGE_KEY");
        assert_eq!(config.upload.gateway_url, "https://ipfs.io/ipfs/");
    }

    #[test]
    fn test_unknown_cluster_rejected() {
        assert!(StarterConfig::from_toml_str("cluster = \"localnet\"").is_err());
        assert!("localnet".parse::<Cluster>().is_err());
        assert_eq!("mainnet".parse::<Cluster>().unwrap(), Cluster::MainnetBeta);
    }

    #[test]
    fn test_explorer_url() {
        assert_eq!(
            Cluster::Devnet.explorer_tx_url("5sig"),
            "https://explorer.solana.com/tx/5sig?cluster=devnet"
        );
    }

    #[test]
    fn test_missing_secret_is_config_error() {
        let upload = UploadConfig {
            secret_key_env: "SUPERTEACH_TEST_SECRET_THAT_IS_NOT_SET".into(),
            ..Default::default()
        };
        assert!(matches!(upload.resolve_secret(), Err(StarterError::Config(_))));
    }
}
