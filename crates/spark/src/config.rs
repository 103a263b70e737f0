//! Wallet configuration
//!
//! An explicit record handed to [`crate::SparkWallet::connect`]. Two fields
//! have no default (API key and mnemonic); everything else does.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Working directory used when none is configured.
pub const DEFAULT_WORKING_DIR: &str = ".tiny-spark-data";

/// How long to wait for the initial sync after connecting.
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_SYNC_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Upper bound on every individual runtime call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Bitcoin network to use for the wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Bitcoin mainnet
    #[default]
    Mainnet,
    /// Bitcoin testnet
    Testnet,
    /// Bitcoin signet (staging)
    Signet,
    /// Bitcoin regtest (local development)
    Regtest,
}

impl Network {
    /// Parse a network name.
    ///
    /// Unknown names resolve to [`Network::Regtest`]; a typo must never land
    /// a wallet on mainnet.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "bitcoin" => Network::Mainnet,
            "testnet" => Network::Testnet,
            "signet" => Network::Signet,
            "regtest" => Network::Regtest,
            other => {
                tracing::warn!(network = other, "Unknown network, using regtest");
                Network::Regtest
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Signet => "signet",
            Network::Regtest => "regtest",
        }
    }

    pub fn is_mainnet(&self) -> bool {
        matches!(self, Network::Mainnet)
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for connecting a wallet
///
/// # Examples
///
/// ```
/// use tiny_spark::{Network, WalletConfig};
///
/// let config = WalletConfig::new("api-key", "abandon abandon about");
/// assert_eq!(config.network, Network::Mainnet);
/// assert_eq!(config.working_dir.to_str(), Some(".tiny-spark-data"));
/// ```
#[derive(Clone)]
pub struct WalletConfig {
    /// Breez API key
    pub api_key: String,
    /// BIP39 recovery phrase
    pub mnemonic: String,
    /// Network to operate on
    pub network: Network,
    /// Storage directory for runtime data, created on connect
    pub working_dir: PathBuf,
    /// Ceiling on the post-connect sync wait
    pub sync_timeout: Duration,
    pub sync_poll_interval: Duration,
    /// Bound applied to each runtime call
    pub request_timeout: Duration,
}

impl WalletConfig {
    pub fn new(api_key: impl Into<String>, mnemonic: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            mnemonic: mnemonic.into(),
            network: Network::default(),
            working_dir: PathBuf::from(DEFAULT_WORKING_DIR),
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
            sync_poll_interval: DEFAULT_SYNC_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = working_dir.into();
        self
    }

    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Check the required fields. Runs before any connection attempt.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.trim().is_empty() {
            return Err("API key is required".to_string());
        }
        if self.mnemonic.trim().is_empty() {
            return Err("Mnemonic is required".to_string());
        }
        if self.working_dir.as_os_str().is_empty() {
            return Err("Working directory path cannot be empty".to_string());
        }
        Ok(())
    }
}

impl std::fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletConfig")
            .field("api_key", &"<redacted>")
            .field("mnemonic", &"<redacted>")
            .field("network", &self.network)
            .field("working_dir", &self.working_dir)
            .field("sync_timeout", &self.sync_timeout)
            .field("sync_poll_interval", &self.sync_poll_interval)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_network_is_not_mainnet() {
        assert_eq!(Network::from_name("mainnet"), Network::Mainnet);
        assert_eq!(Network::from_name("MAINNET"), Network::Mainnet);
        assert_eq!(Network::from_name("testnet"), Network::Testnet);
        assert_eq!(Network::from_name("mainet"), Network::Regtest);
        assert_eq!(Network::from_name(""), Network::Regtest);
    }

    #[test]
    fn test_validate_required_fields() {
        assert!(WalletConfig::new("key", "words").validate().is_ok());
        assert!(WalletConfig::new("", "words").validate().is_err());
        assert!(WalletConfig::new("key", "  ").validate().is_err());
        let no_dir = WalletConfig::new("key", "words").with_working_dir("");
        assert!(no_dir.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = WalletConfig::new("secret-key", "secret words");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret-key"));
        assert!(!rendered.contains("secret words"));
    }
}
