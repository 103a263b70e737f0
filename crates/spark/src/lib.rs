//! Payment facade for the tiny-spark wallet
//!
//! This crate puts one narrow, uniform API in front of a wallet runtime that
//! settles payments over three very different rails: Lightning invoices,
//! on-chain Bitcoin addresses and Spark (ledger-native) transfers. Callers
//! see the same records whatever rail a payment took.
//!
//! # Architecture
//!
//! ```text
//!        Caller (tiny-spark CLI, tests)
//!                     |
//!                SparkWallet            uniform records: BalanceSnapshot,
//!                     |                 PaymentRecord, ReceiveRequest, ...
//!        runtime::{Connector, WalletRuntime}
//!                     |
//!        +------------+-------------+
//!        |                          |
//!   breez::BreezConnector     mock::Backend
//!   (feature "breez")         (in-memory)
//! ```
//!
//! # Example
//!
//! ```rust
//! use tiny_spark::{PaymentMethod, SparkWallet, WalletConfig, mock};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> tiny_spark::Result<()> {
//! let dir = std::env::temp_dir().join("tiny-spark-doc");
//! let config = WalletConfig::new("api-key", "abandon abandon about").with_working_dir(&dir);
//! let backend = mock::Backend::with_balance(21_000);
//!
//! let mut wallet = SparkWallet::connect(config, &backend).await?;
//! let balance = wallet.get_balance().await?;
//! assert_eq!(balance.spendable_sats, 21_000);
//!
//! let request = wallet
//!     .create_receive_request(PaymentMethod::LedgerAddress, 0, "")
//!     .await?;
//! assert_eq!(request.description, "Spark address deposit");
//!
//! wallet.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod mock;
pub mod runtime;
pub mod types;
pub mod wallet;

#[cfg(feature = "breez")]
pub mod breez;

pub use config::{Network, WalletConfig};
pub use error::{ErrorKind, Result, SendStage, SparkError};
pub use runtime::{Connector, RuntimeError, WalletRuntime};
pub use types::{
    BalanceSnapshot, Direction, PaymentMethod, PaymentRecord, PaymentStatus, ReceiveRequest,
    SendResult, TokenBalance,
};
pub use wallet::SparkWallet;
