//! Payment facade over a wallet runtime
//!
//! [`SparkWallet`] owns exactly one runtime handle between `connect` and
//! `disconnect` and turns every runtime response into the uniform records in
//! [`crate::types`].
//!
//! # Architecture
//!
//! ```text
//! SparkWallet
//!   ├─ WalletConfig (credentials, network, timeouts)
//!   ├─ Arc<dyn WalletRuntime> (Breez SDK or in-memory mock)
//!   └─ uniform records (BalanceSnapshot, PaymentRecord, ...)
//! ```

use chrono::Utc;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::{Network, WalletConfig};
use crate::error::{Result, SendStage, SparkError};
use crate::runtime::{
    ConfirmationSpeed, ConnectRequest, Connector, DestinationKind, InputKind, PrepareLnurlPay,
    ReceiveMethod, RuntimeError, RuntimeResult, SendOptions, TokenHolding, WalletInfo,
    WalletRuntime,
};
use crate::types::{
    BalanceSnapshot, PaymentMethod, PaymentRecord, ReceiveRequest, SendResult, TokenBalance,
    timestamp_from_unix,
};

/// Lists shorter than this still fetch a full page from the runtime.
pub const MIN_PAGE_THRESHOLD: u32 = 10;

/// Page size requested when the caller asks for fewer than [`MIN_PAGE_THRESHOLD`].
pub const FLOOR_PAGE_SIZE: u32 = 100;

/// Expiry given to receive requests when the runtime reports none.
pub const DEFAULT_RECEIVE_EXPIRY_HOURS: i64 = 24;

/// Wallet facade for Lightning, on-chain and Spark payments
///
/// # Examples
///
/// ```no_run
/// use tiny_spark::{PaymentMethod, SparkWallet, WalletConfig, mock};
///
/// # async fn example() -> tiny_spark::Result<()> {
/// let backend = mock::Backend::with_balance(50_000);
/// let config = WalletConfig::new("api-key", "abandon abandon about");
///
/// let mut wallet = SparkWallet::connect(config, &backend).await?;
/// let request = wallet
///     .create_receive_request(PaymentMethod::LightningInvoice, 1_000, "Coffee")
///     .await?;
/// println!("Pay this invoice: {}", request.payment_request);
///
/// wallet.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub struct SparkWallet {
    runtime: Option<Arc<dyn WalletRuntime>>,
    network: Network,
    request_timeout: Duration,
    synced: bool,
}

impl SparkWallet {
    /// Connect to a wallet runtime and wait for its initial sync.
    ///
    /// The configuration is validated and the working directory created
    /// (with parents) before the connector is contacted. The sync wait is
    /// bounded by `config.sync_timeout`; past it the wallet is returned
    /// anyway and [`SparkWallet::is_synced`] reports `false`.
    ///
    /// # Example
    /// ```rust,ignore
    /// let backend = tiny_spark::mock::Backend::new();
    /// let wallet = SparkWallet::connect(config, &backend).await?;
    /// ```
    pub async fn connect(config: WalletConfig, connector: &dyn Connector) -> Result<Self> {
        config.validate().map_err(SparkError::Connection)?;
        prepare_working_dir(&config.working_dir)?;

        tracing::info!(
            network = %config.network,
            working_dir = %config.working_dir.display(),
            "Connecting wallet"
        );

        let request = ConnectRequest {
            network: config.network,
            api_key: config.api_key.clone(),
            mnemonic: config.mnemonic.clone(),
            storage_dir: config.working_dir.clone(),
        };

        let runtime = bounded(config.request_timeout, connector.connect(request))
            .await
            .map_err(|e| SparkError::Connection(e.to_string()))?;

        let synced = wait_for_sync(
            runtime.as_ref(),
            config.sync_timeout,
            config.sync_poll_interval,
        )
        .await;

        Ok(Self {
            runtime: Some(runtime),
            network: config.network,
            request_timeout: config.request_timeout,
            synced,
        })
    }

    /// Release the runtime handle.
    ///
    /// Only the first call reaches the runtime; later calls are no-ops.
    pub async fn disconnect(&mut self) -> Result<()> {
        let Some(runtime) = self.runtime.take() else {
            return Ok(());
        };

        tracing::debug!("Disconnecting wallet");
        bounded(self.request_timeout, runtime.disconnect())
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Wallet runtime failed to disconnect cleanly");
                SparkError::query("disconnect", e)
            })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn is_connected(&self) -> bool {
        self.runtime.is_some()
    }

    /// Whether the initial sync completed before the wait ceiling.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    fn runtime(&self) -> Result<&Arc<dyn WalletRuntime>> {
        self.runtime.as_ref().ok_or(SparkError::NotConnected)
    }

    async fn call<T>(&self, call: impl Future<Output = RuntimeResult<T>>) -> RuntimeResult<T> {
        bounded(self.request_timeout, call).await
    }

    /// Get the current wallet balance
    ///
    /// # Example
    /// ```rust,ignore
    /// let balance = wallet.get_balance().await?;
    /// println!("Spendable: {} sats", balance.spendable_sats);
    /// ```
    pub async fn get_balance(&self) -> Result<BalanceSnapshot> {
        let runtime = self.runtime()?;
        let info = self
            .call(runtime.get_info(false))
            .await
            .map_err(|e| SparkError::query("get balance", e))?;

        Ok(BalanceSnapshot::uniform(effective_balance(&info)))
    }

    /// List payment history, newest first.
    ///
    /// Fewer than [`MIN_PAGE_THRESHOLD`] requested still fetches
    /// [`FLOOR_PAGE_SIZE`] entries; trimming to `limit` is up to the caller.
    pub async fn list_payments(&self, limit: u32) -> Result<Vec<PaymentRecord>> {
        let runtime = self.runtime()?;
        let page = page_size(limit);
        tracing::debug!(limit, page, "Listing payments");

        let payments = self
            .call(runtime.list_payments(0, page))
            .await
            .map_err(|e| SparkError::query("list payments", e))?;

        Ok(payments.into_iter().map(PaymentRecord::from).collect())
    }

    /// Look up one payment by id.
    pub async fn get_payment(&self, id: &str) -> Result<PaymentRecord> {
        let runtime = self.runtime()?;
        let id = id.trim();
        if id.is_empty() {
            return Err(SparkError::query(
                "get payment",
                RuntimeError::Rejected("payment id is required".to_string()),
            ));
        }

        match self.call(runtime.get_payment(id)).await {
            Ok(payment) => Ok(PaymentRecord::from(payment)),
            Err(RuntimeError::NotFound(_)) => Err(SparkError::NotFound(id.to_string())),
            Err(e) => Err(SparkError::query("get payment", e)),
        }
    }

    /// Create a payment request for receiving funds.
    ///
    /// Lightning invoices need a positive amount. Address methods ignore
    /// `amount_sats` and leave the amount to the payer.
    ///
    /// # Example
    /// ```rust,ignore
    /// let request = wallet
    ///     .create_receive_request(PaymentMethod::OnchainAddress, 0, "")
    ///     .await?;
    /// assert_eq!(request.description, "Bitcoin address deposit");
    /// ```
    pub async fn create_receive_request(
        &self,
        method: PaymentMethod,
        amount_sats: u64,
        description: &str,
    ) -> Result<ReceiveRequest> {
        let runtime = self.runtime()?;

        let description = if description.is_empty() {
            method.default_receive_description().to_string()
        } else {
            description.to_string()
        };

        let (receive_method, requested_amount_sats) = match method {
            PaymentMethod::LightningInvoice => {
                if amount_sats == 0 {
                    return Err(SparkError::Receive {
                        method,
                        reason: "amount must be greater than zero".to_string(),
                    });
                }
                let receive_method = ReceiveMethod::Bolt11Invoice {
                    description: description.clone(),
                    amount_sats: Some(amount_sats),
                };
                (receive_method, amount_sats)
            }
            PaymentMethod::OnchainAddress => (ReceiveMethod::BitcoinAddress, 0),
            PaymentMethod::LedgerAddress => (ReceiveMethod::SparkAddress, 0),
        };

        let response = self
            .call(runtime.receive_payment(receive_method))
            .await
            .map_err(|e| SparkError::Receive {
                method,
                reason: e.to_string(),
            })?;

        tracing::info!(%method, requested_amount_sats, "Created receive request");

        let expires_at = match response.expires_at {
            Some(secs) => timestamp_from_unix(secs),
            None => Utc::now() + chrono::Duration::hours(DEFAULT_RECEIVE_EXPIRY_HOURS),
        };

        Ok(ReceiveRequest {
            payment_request: response.payment_request,
            requested_amount_sats,
            fee_sats: response.fee_sats,
            description,
            expires_at,
        })
    }

    /// Send a payment in two phases (prepare, then execute).
    ///
    /// `amount_sats` may be omitted for Lightning invoices that carry their
    /// own amount; on-chain and Spark sends require it. On-chain sends use
    /// the medium confirmation speed.
    ///
    /// # Example
    /// ```rust,ignore
    /// let result = wallet
    ///     .send_payment(PaymentMethod::LedgerAddress, "spark1...", Some(1_000))
    ///     .await?;
    /// println!("Payment ID: {}", result.payment.id);
    /// ```
    pub async fn send_payment(
        &self,
        method: PaymentMethod,
        destination: &str,
        amount_sats: Option<u64>,
    ) -> Result<SendResult> {
        let runtime = self.runtime()?;

        let destination = destination.trim();
        if destination.is_empty() {
            return Err(SparkError::send(
                method,
                SendStage::Validate,
                "destination is required",
            ));
        }
        validate_send_amount(method, amount_sats)?;

        let prepared = self
            .call(runtime.prepare_send_payment(destination, amount_sats))
            .await
            .map_err(|e| SparkError::send(method, SendStage::Prepare, e))?;

        let expected = expected_destination(method);
        if prepared.destination_kind != expected {
            return Err(SparkError::send(
                method,
                SendStage::Prepare,
                format!(
                    "destination is a {}, expected a {}",
                    destination_label(prepared.destination_kind),
                    destination_label(expected)
                ),
            ));
        }

        tracing::debug!(
            %method,
            amount_sats = prepared.amount_sats,
            fee_sats = prepared.fee_sats,
            "Prepared payment"
        );

        let options = match method {
            PaymentMethod::OnchainAddress => Some(SendOptions::BitcoinAddress {
                confirmation_speed: ConfirmationSpeed::Medium,
            }),
            _ => None,
        };

        let payment = self
            .call(runtime.send_payment(prepared, options))
            .await
            .map_err(|e| SparkError::send(method, SendStage::Execute, e))?;

        tracing::info!(%method, payment_id = %payment.id, "Payment sent");
        Ok(send_result(payment))
    }

    /// Pay a Lightning address or LNURL-pay link.
    ///
    /// The alias is resolved first; anything that does not resolve to a pay
    /// request fails with [`SparkError::Resolve`] before any quote is made.
    pub async fn pay_address_alias(
        &self,
        alias: &str,
        amount_sats: u64,
        comment: &str,
    ) -> Result<SendResult> {
        let runtime = self.runtime()?;
        let method = PaymentMethod::LightningInvoice;

        let alias = alias.trim();
        if alias.is_empty() {
            return Err(SparkError::Resolve {
                alias: alias.to_string(),
                reason: "alias is required".to_string(),
            });
        }
        if amount_sats == 0 {
            return Err(SparkError::send(
                method,
                SendStage::Validate,
                "amount must be greater than zero",
            ));
        }

        let input = self
            .call(runtime.parse(alias))
            .await
            .map_err(|e| SparkError::Resolve {
                alias: alias.to_string(),
                reason: e.to_string(),
            })?;

        let pay_request = match input {
            InputKind::LightningAddress { pay_request, .. } | InputKind::LnurlPay(pay_request) => {
                pay_request
            }
            other => {
                return Err(SparkError::Resolve {
                    alias: alias.to_string(),
                    reason: format!("unsupported alias type: {}", other.label()),
                });
            }
        };

        let min_sats = pay_request.min_sendable_msat.div_ceil(1000);
        let max_sats = pay_request.max_sendable_msat / 1000;
        if amount_sats < min_sats || amount_sats > max_sats {
            return Err(SparkError::send(
                method,
                SendStage::Prepare,
                format!(
                    "amount {amount_sats} sats is outside the allowed range \
                     {min_sats}-{max_sats} sats"
                ),
            ));
        }

        let comment = match comment.trim() {
            "" => None,
            given => Some(given.to_string()),
        };

        let prepared = self
            .call(runtime.prepare_lnurl_pay(PrepareLnurlPay {
                amount_sats,
                pay_request,
                comment,
                validate_success_action_url: true,
            }))
            .await
            .map_err(|e| SparkError::send(method, SendStage::Prepare, e))?;

        let payment = self
            .call(runtime.lnurl_pay(prepared))
            .await
            .map_err(|e| SparkError::send(method, SendStage::Execute, e))?;

        tracing::info!(alias, payment_id = %payment.id, "Paid address alias");
        Ok(send_result(payment))
    }

    /// Token balances held by the wallet, in no particular order.
    pub async fn get_token_balances(&self) -> Result<Vec<TokenBalance>> {
        let runtime = self.runtime()?;
        let info = self
            .call(runtime.get_info(false))
            .await
            .map_err(|e| SparkError::query("get token balances", e))?;

        Ok(info.token_balances.into_iter().map(token_balance).collect())
    }
}

impl Drop for SparkWallet {
    fn drop(&mut self) {
        if self.runtime.is_some() {
            tracing::debug!("SparkWallet dropped while still connected");
        }
    }
}

async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = RuntimeResult<T>>,
) -> RuntimeResult<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(RuntimeError::Timeout(limit)),
    }
}

fn prepare_working_dir(path: &Path) -> Result<()> {
    if path.exists() && !path.is_dir() {
        return Err(SparkError::Connection(format!(
            "working directory {} exists but is not a directory",
            path.display()
        )));
    }
    std::fs::create_dir_all(path).map_err(|e| {
        SparkError::Connection(format!(
            "cannot create working directory {}: {e}",
            path.display()
        ))
    })
}

/// Poll the runtime's sync flag until it is set or `ceiling` elapses.
async fn wait_for_sync(runtime: &dyn WalletRuntime, ceiling: Duration, interval: Duration) -> bool {
    let started = Instant::now();
    let deadline = started + ceiling;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match bounded(remaining.max(interval), runtime.is_synced()).await {
            Ok(true) => {
                tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Wallet synced");
                return true;
            }
            Ok(false) => {}
            Err(e) => tracing::debug!(error = %e, "Sync status unavailable"),
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            tracing::warn!(
                timeout_secs = ceiling.as_secs_f64(),
                "Initial sync did not finish in time, continuing with possibly stale data"
            );
            return false;
        }
        tokio::time::sleep(interval.min(remaining)).await;
    }
}

fn page_size(limit: u32) -> u32 {
    if limit < MIN_PAGE_THRESHOLD {
        FLOOR_PAGE_SIZE
    } else {
        limit
    }
}

/// Spendable amount reported by `info`.
///
/// Compatibility shim: some runtime responses report a zero primary balance
/// while a token balance is positive. In that case the first positive token
/// balance, by token id, stands in for the primary balance.
fn effective_balance(info: &WalletInfo) -> u64 {
    if info.balance_sats > 0 {
        return info.balance_sats;
    }

    let mut tokens: Vec<&TokenHolding> = info.token_balances.iter().collect();
    tokens.sort_by(|a, b| a.token_id.cmp(&b.token_id));

    match tokens.into_iter().find(|token| token.balance > 0) {
        Some(token) => {
            tracing::debug!(
                token_id = %token.token_id,
                "Primary balance is zero, using token balance"
            );
            u64::try_from(token.balance).unwrap_or(u64::MAX)
        }
        None => 0,
    }
}

fn validate_send_amount(method: PaymentMethod, amount_sats: Option<u64>) -> Result<()> {
    match (method, amount_sats) {
        (_, Some(0)) => Err(SparkError::send(
            method,
            SendStage::Validate,
            "amount must be greater than zero",
        )),
        (PaymentMethod::LightningInvoice, _) | (_, Some(_)) => Ok(()),
        (_, None) => Err(SparkError::send(
            method,
            SendStage::Validate,
            "amount is required",
        )),
    }
}

fn expected_destination(method: PaymentMethod) -> DestinationKind {
    match method {
        PaymentMethod::LightningInvoice => DestinationKind::Bolt11Invoice,
        PaymentMethod::OnchainAddress => DestinationKind::BitcoinAddress,
        PaymentMethod::LedgerAddress => DestinationKind::SparkAddress,
    }
}

fn destination_label(kind: DestinationKind) -> &'static str {
    match kind {
        DestinationKind::Bolt11Invoice => "lightning invoice",
        DestinationKind::BitcoinAddress => "bitcoin address",
        DestinationKind::SparkAddress => "spark address",
        DestinationKind::Other => "unsupported destination",
    }
}

fn send_result(payment: crate::runtime::RuntimePayment) -> SendResult {
    let preimage = payment.preimage.clone();
    SendResult {
        payment: PaymentRecord::from(payment),
        preimage,
    }
}

fn token_balance(holding: TokenHolding) -> TokenBalance {
    TokenBalance {
        token_id: holding.token_id,
        balance: holding.balance,
        name: holding.name,
        ticker: holding.ticker,
        decimals: holding.decimals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(token_id: &str, balance: u128) -> TokenHolding {
        TokenHolding {
            token_id: token_id.to_string(),
            balance,
            name: token_id.to_uppercase(),
            ticker: token_id.to_uppercase(),
            decimals: 0,
        }
    }

    #[test]
    fn test_page_size_floor() {
        assert_eq!(page_size(0), FLOOR_PAGE_SIZE);
        assert_eq!(page_size(9), FLOOR_PAGE_SIZE);
        assert_eq!(page_size(10), 10);
        assert_eq!(page_size(250), 250);
    }

    #[test]
    fn test_primary_balance_wins() {
        let info = WalletInfo {
            balance_sats: 1_500,
            token_balances: vec![holding("a", 9_000)],
        };
        assert_eq!(effective_balance(&info), 1_500);
    }

    #[test]
    fn test_zero_balance_uses_first_positive_token() {
        let info = WalletInfo {
            balance_sats: 0,
            token_balances: vec![holding("c", 700), holding("b", 0), holding("a", 0)],
        };
        assert_eq!(effective_balance(&info), 700);

        let info = WalletInfo {
            balance_sats: 0,
            token_balances: vec![holding("z", 5), holding("m", 40)],
        };
        assert_eq!(effective_balance(&info), 40);

        assert_eq!(effective_balance(&WalletInfo::default()), 0);
    }

    #[test]
    fn test_oversized_token_balance_saturates() {
        let info = WalletInfo {
            balance_sats: 0,
            token_balances: vec![holding("big", u128::MAX)],
        };
        assert_eq!(effective_balance(&info), u64::MAX);
    }

    #[test]
    fn test_send_amount_rules() {
        assert!(validate_send_amount(PaymentMethod::LightningInvoice, None).is_ok());
        assert!(validate_send_amount(PaymentMethod::LightningInvoice, Some(1)).is_ok());
        assert!(validate_send_amount(PaymentMethod::LightningInvoice, Some(0)).is_err());
        assert!(validate_send_amount(PaymentMethod::OnchainAddress, None).is_err());
        assert!(validate_send_amount(PaymentMethod::LedgerAddress, Some(0)).is_err());
        assert!(validate_send_amount(PaymentMethod::LedgerAddress, Some(10)).is_ok());
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result: RuntimeResult<()> = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(RuntimeError::Timeout(Duration::from_millis(10))));
    }

    #[test]
    fn test_prepare_working_dir_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();
        let err = prepare_working_dir(&file).unwrap_err();
        assert!(matches!(err, SparkError::Connection(_)));

        let nested = dir.path().join("a").join("b");
        prepare_working_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
