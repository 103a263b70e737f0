//! Contract with the wallet runtime.
//!
//! The facade in [`crate::wallet`] only ever talks to a runtime through the
//! two traits in this module. The request and response shapes here are
//! backend-neutral: the Breez adapter (feature `breez`) and the in-memory
//! [`crate::mock`] backend both translate into and out of them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::Network;

/// Failure reported by a runtime call.
///
/// The facade treats every one of these as authoritative and never retries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    /// The runtime refused the request.
    #[error("{0}")]
    Rejected(String),

    /// The requested object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The call did not complete within the configured bound.
    #[error("timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    /// The runtime could not be reached or is in a broken state.
    #[error("runtime unavailable: {0}")]
    Unavailable(String),
}

pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

/// Everything a runtime needs to open a wallet.
#[derive(Clone)]
pub struct ConnectRequest {
    pub network: Network,
    pub api_key: String,
    pub mnemonic: String,
    pub storage_dir: PathBuf,
}

impl std::fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("network", &self.network)
            .field("api_key", &"<redacted>")
            .field("mnemonic", &"<redacted>")
            .field("storage_dir", &self.storage_dir)
            .finish()
    }
}

/// Snapshot of wallet info as reported by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletInfo {
    pub balance_sats: u64,
    pub token_balances: Vec<TokenHolding>,
}

/// One token balance entry from [`WalletInfo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHolding {
    pub token_id: String,
    pub balance: u128,
    pub name: String,
    pub ticker: String,
    pub decimals: u32,
}

/// Direction tag attached to a runtime payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentKind {
    Send,
    Receive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimePaymentStatus {
    Pending,
    Completed,
    Failed,
}

/// Rail a runtime payment settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementRail {
    Lightning,
    Spark,
    Token,
    Deposit,
    Withdraw,
    Unknown,
}

impl SettlementRail {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementRail::Lightning => "lightning",
            SettlementRail::Spark => "spark",
            SettlementRail::Token => "token",
            SettlementRail::Deposit => "deposit",
            SettlementRail::Withdraw => "withdraw",
            SettlementRail::Unknown => "unknown",
        }
    }
}

/// A payment as the runtime reports it.
///
/// `amount_sats` is the raw figure; its sign only matters when `kind` is
/// absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePayment {
    pub id: String,
    pub kind: Option<PaymentKind>,
    pub amount_sats: i64,
    pub fee_sats: u64,
    pub status: RuntimePaymentStatus,
    pub timestamp: u64,
    pub rail: SettlementRail,
    pub description: Option<String>,
    pub preimage: Option<String>,
}

/// Receive method understood by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveMethod {
    Bolt11Invoice {
        description: String,
        amount_sats: Option<u64>,
    },
    BitcoinAddress,
    SparkAddress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveResponse {
    pub payment_request: String,
    pub fee_sats: u64,
    /// Unix seconds, when the runtime reports an expiry of its own.
    pub expires_at: Option<u64>,
}

/// Destination kind the runtime detected while preparing a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DestinationKind {
    Bolt11Invoice,
    BitcoinAddress,
    SparkAddress,
    Other,
}

/// Opaque quote produced by the prepare phase.
///
/// Runtimes that need to carry their own prepared object stash it in
/// `handle`; the facade never looks inside.
#[derive(Clone)]
pub struct PreparedSend {
    pub destination: String,
    pub destination_kind: DestinationKind,
    pub amount_sats: u64,
    pub fee_sats: u64,
    pub handle: Option<Arc<dyn std::any::Any + Send + Sync>>,
}

impl std::fmt::Debug for PreparedSend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedSend")
            .field("destination", &self.destination)
            .field("destination_kind", &self.destination_kind)
            .field("amount_sats", &self.amount_sats)
            .field("fee_sats", &self.fee_sats)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationSpeed {
    Fast,
    Medium,
    Slow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOptions {
    BitcoinAddress { confirmation_speed: ConfirmationSpeed },
}

/// LNURL-pay capability a Lightning address or LNURL resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayRequest {
    pub callback: String,
    pub min_sendable_msat: u64,
    pub max_sendable_msat: u64,
    pub comment_allowed: u16,
    pub domain: String,
    /// Runtime-private representation, handed back on prepare.
    pub raw: Option<String>,
}

/// What the runtime's parser made of a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    LightningAddress { address: String, pay_request: PayRequest },
    LnurlPay(PayRequest),
    Bolt11Invoice,
    BitcoinAddress,
    SparkAddress,
    Other(String),
}

impl InputKind {
    pub fn label(&self) -> &str {
        match self {
            InputKind::LightningAddress { .. } => "lightning address",
            InputKind::LnurlPay(_) => "lnurl-pay",
            InputKind::Bolt11Invoice => "bolt11 invoice",
            InputKind::BitcoinAddress => "bitcoin address",
            InputKind::SparkAddress => "spark address",
            InputKind::Other(kind) => kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareLnurlPay {
    pub amount_sats: u64,
    pub pay_request: PayRequest,
    pub comment: Option<String>,
    pub validate_success_action_url: bool,
}

#[derive(Clone)]
pub struct PreparedLnurlPay {
    pub amount_sats: u64,
    pub fee_sats: u64,
    pub handle: Option<Arc<dyn std::any::Any + Send + Sync>>,
}

impl std::fmt::Debug for PreparedLnurlPay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedLnurlPay")
            .field("amount_sats", &self.amount_sats)
            .field("fee_sats", &self.fee_sats)
            .finish_non_exhaustive()
    }
}

/// Opens a wallet runtime.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, request: ConnectRequest) -> RuntimeResult<Arc<dyn WalletRuntime>>;
}

/// Operations the facade consumes from a connected runtime.
#[async_trait]
pub trait WalletRuntime: Send + Sync {
    /// Whether the initial synchronization pass has completed.
    async fn is_synced(&self) -> RuntimeResult<bool>;

    async fn get_info(&self, ensure_synced: bool) -> RuntimeResult<WalletInfo>;

    /// Payments newest first.
    async fn list_payments(&self, offset: u32, limit: u32) -> RuntimeResult<Vec<RuntimePayment>>;

    async fn get_payment(&self, id: &str) -> RuntimeResult<RuntimePayment>;

    async fn receive_payment(&self, method: ReceiveMethod) -> RuntimeResult<ReceiveResponse>;

    async fn prepare_send_payment(
        &self,
        destination: &str,
        amount_sats: Option<u64>,
    ) -> RuntimeResult<PreparedSend>;

    async fn send_payment(
        &self,
        prepared: PreparedSend,
        options: Option<SendOptions>,
    ) -> RuntimeResult<RuntimePayment>;

    async fn parse(&self, input: &str) -> RuntimeResult<InputKind>;

    async fn prepare_lnurl_pay(&self, request: PrepareLnurlPay) -> RuntimeResult<PreparedLnurlPay>;

    async fn lnurl_pay(&self, prepared: PreparedLnurlPay) -> RuntimeResult<RuntimePayment>;

    async fn disconnect(&self) -> RuntimeResult<()>;
}
