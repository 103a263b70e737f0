//! Wallet configuration from flags and environment
//!
//! Flags win over environment variables (clap `env`), which may come from a
//! `.env` file loaded at startup.

use anyhow::{Result, bail};
use std::path::PathBuf;
use std::time::Duration;
use tiny_spark::config::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_SYNC_TIMEOUT, DEFAULT_WORKING_DIR};
use tiny_spark::{Network, WalletConfig};

use crate::cli::WalletOptions;

const MOCK_API_KEY: &str = "mock-api-key";
const MOCK_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// Build the wallet configuration for this invocation.
pub fn wallet_config(options: &WalletOptions) -> Result<WalletConfig> {
    let (api_key, mnemonic) = if options.mock {
        (
            non_empty(options.api_key.as_deref()).unwrap_or(MOCK_API_KEY),
            non_empty(options.mnemonic.as_deref()).unwrap_or(MOCK_MNEMONIC),
        )
    } else {
        let Some(api_key) = non_empty(options.api_key.as_deref()) else {
            bail!(
                "BREEZ_API_KEY is required (set it in the environment or .env, or pass --api-key)"
            );
        };
        let Some(mnemonic) = non_empty(options.mnemonic.as_deref()) else {
            bail!(
                "BREEZ_MNEMONIC is required (set it in the environment or .env, or pass --mnemonic)"
            );
        };
        (api_key, mnemonic)
    };

    let network = match non_empty(options.network.as_deref()) {
        Some(name) => Network::from_name(name),
        None => Network::Mainnet,
    };

    let working_dir = options
        .working_dir
        .clone()
        .or_else(|| options.data_dir.clone())
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKING_DIR));

    let sync_timeout = options
        .sync_timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_SYNC_TIMEOUT);
    let request_timeout = options
        .request_timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

    if request_timeout.is_zero() {
        bail!("Request timeout must be at least one second");
    }

    Ok(WalletConfig::new(api_key, mnemonic)
        .with_network(network)
        .with_working_dir(working_dir)
        .with_sync_timeout(sync_timeout)
        .with_request_timeout(request_timeout))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn options() -> WalletOptions {
        WalletOptions {
            api_key: Some("key".to_string()),
            mnemonic: Some("some words".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = wallet_config(&options()).unwrap();
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.working_dir, PathBuf::from(".tiny-spark-data"));
        assert_eq!(config.sync_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_required_fields() {
        let mut missing_key = options();
        missing_key.api_key = None;
        let err = wallet_config(&missing_key).unwrap_err();
        assert!(err.to_string().contains("BREEZ_API_KEY"));

        let mut blank_mnemonic = options();
        blank_mnemonic.mnemonic = Some("  ".to_string());
        let err = wallet_config(&blank_mnemonic).unwrap_err();
        assert!(err.to_string().contains("BREEZ_MNEMONIC"));
    }

    #[test]
    fn test_mock_needs_no_credentials() {
        let options = WalletOptions {
            mock: true,
            ..Default::default()
        };
        let config = wallet_config(&options).unwrap();
        assert_eq!(config.api_key, MOCK_API_KEY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_working_dir_falls_back_to_data_dir() {
        let mut opts = options();
        opts.data_dir = Some(PathBuf::from("/tmp/legacy"));
        assert_eq!(
            wallet_config(&opts).unwrap().working_dir,
            PathBuf::from("/tmp/legacy")
        );

        opts.working_dir = Some(PathBuf::from("/tmp/current"));
        assert_eq!(
            wallet_config(&opts).unwrap().working_dir,
            PathBuf::from("/tmp/current")
        );
    }

    #[test]
    fn test_network_and_timeouts() {
        let mut opts = options();
        opts.network = Some("Testnet".to_string());
        opts.sync_timeout_secs = Some(0);
        opts.request_timeout_secs = Some(5);
        let config = wallet_config(&opts).unwrap();
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.sync_timeout, Duration::ZERO);
        assert_eq!(config.request_timeout, Duration::from_secs(5));

        opts.network = Some("prod".to_string());
        assert_eq!(wallet_config(&opts).unwrap().network, Network::Regtest);

        opts.request_timeout_secs = Some(0);
        assert!(wallet_config(&opts).is_err());
    }
}
