//! Wallet runtime backed by the Breez Spark SDK
//!
//! Only compiled with the `breez` feature. Translates between the
//! backend-neutral shapes in [`crate::runtime`] and the SDK's request and
//! response types.

use async_trait::async_trait;
use breez_sdk_spark::{
    BreezSdk, EventListener, GetInfoRequest, GetPaymentRequest, InputType, LightningAddressDetails,
    ListPaymentsRequest, LnurlPayRequest, LnurlPayRequestDetails, Network as SdkNetwork,
    OnchainConfirmationSpeed, Payment, PaymentDetails, PaymentMethod as SdkPaymentMethod,
    PaymentStatus, PaymentType, PrepareLnurlPayRequest, PrepareLnurlPayResponse,
    PrepareSendPaymentRequest, PrepareSendPaymentResponse, ReceivePaymentMethod,
    ReceivePaymentRequest, SdkEvent, Seed, SendPaymentMethod, SendPaymentOptions,
    SendPaymentRequest, SyncWalletRequest, connect, default_config,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::Network;
use crate::runtime::{
    ConfirmationSpeed, ConnectRequest, Connector, DestinationKind, InputKind, PayRequest,
    PaymentKind, PrepareLnurlPay, PreparedLnurlPay, PreparedSend, ReceiveMethod, ReceiveResponse,
    RuntimeError, RuntimePayment, RuntimePaymentStatus, RuntimeResult, SendOptions,
    SettlementRail, TokenHolding, WalletInfo, WalletRuntime,
};

/// Opens wallets through `breez_sdk_spark::connect`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BreezConnector;

/// The SDK only knows mainnet and regtest; every test network maps to regtest.
fn sdk_network(network: Network) -> SdkNetwork {
    match network {
        Network::Mainnet => SdkNetwork::Mainnet,
        Network::Testnet | Network::Signet | Network::Regtest => SdkNetwork::Regtest,
    }
}

fn rejected(err: impl std::fmt::Display) -> RuntimeError {
    RuntimeError::Rejected(err.to_string())
}

#[async_trait]
impl Connector for BreezConnector {
    async fn connect(&self, request: ConnectRequest) -> RuntimeResult<Arc<dyn WalletRuntime>> {
        let mut config = default_config(sdk_network(request.network));
        config.api_key = Some(request.api_key);

        let connect_request = breez_sdk_spark::ConnectRequest {
            config,
            seed: Seed::Mnemonic {
                mnemonic: request.mnemonic,
                passphrase: None,
            },
            storage_dir: request.storage_dir.to_string_lossy().to_string(),
        };

        let sdk = connect(connect_request).await.map_err(rejected)?;

        let sync = Arc::new(SyncState::default());
        let listener_id = sdk
            .add_event_listener(Box::new(SyncListener { sync: sync.clone() }))
            .await;
        tracing::debug!(%listener_id, "Registered sync listener");

        Ok(Arc::new(BreezRuntime { sdk, sync }))
    }
}

/// Initial sync progress.
///
/// The first `Synced` event can fire before the listener is registered, so
/// the first poll that finds the flag unset asks for one explicit sync.
#[derive(Debug, Default)]
struct SyncState {
    synced: AtomicBool,
    forced: AtomicBool,
}

impl SyncState {
    fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    fn mark_synced(&self) {
        self.synced.store(true, Ordering::Release);
    }

    /// True exactly once, for the first caller that sees the wallet unsynced.
    fn take_forced_sync(&self) -> bool {
        !self.is_synced() && !self.forced.swap(true, Ordering::AcqRel)
    }
}

/// Marks the wallet synced when the SDK reports a completed sync.
struct SyncListener {
    sync: Arc<SyncState>,
}

#[async_trait]
impl EventListener for SyncListener {
    async fn on_event(&self, event: SdkEvent) {
        if matches!(event, SdkEvent::Synced { .. }) {
            self.sync.mark_synced();
        }
    }
}

pub struct BreezRuntime {
    sdk: BreezSdk,
    sync: Arc<SyncState>,
}

#[async_trait]
impl WalletRuntime for BreezRuntime {
    async fn is_synced(&self) -> RuntimeResult<bool> {
        if self.sync.take_forced_sync() {
            self.sdk
                .sync_wallet(SyncWalletRequest {})
                .await
                .map_err(rejected)?;
            self.sync.mark_synced();
        }
        Ok(self.sync.is_synced())
    }

    async fn get_info(&self, ensure_synced: bool) -> RuntimeResult<WalletInfo> {
        let info = self
            .sdk
            .get_info(GetInfoRequest {
                ensure_synced: Some(ensure_synced),
            })
            .await
            .map_err(rejected)?;

        let mut token_balances: Vec<TokenHolding> = info
            .token_balances
            .into_iter()
            .map(|(token_id, token)| TokenHolding {
                token_id,
                balance: token.balance,
                name: token.token_metadata.name,
                ticker: token.token_metadata.ticker,
                decimals: token.token_metadata.decimals,
            })
            .collect();
        token_balances.sort_by(|a, b| a.token_id.cmp(&b.token_id));

        Ok(WalletInfo {
            balance_sats: info.balance_sats,
            token_balances,
        })
    }

    async fn list_payments(&self, offset: u32, limit: u32) -> RuntimeResult<Vec<RuntimePayment>> {
        let request = ListPaymentsRequest {
            offset: Some(offset),
            limit: Some(limit),
            sort_ascending: Some(false), // newest first
            ..Default::default()
        };

        let response = self.sdk.list_payments(request).await.map_err(rejected)?;
        Ok(response.payments.into_iter().map(runtime_payment).collect())
    }

    async fn get_payment(&self, id: &str) -> RuntimeResult<RuntimePayment> {
        let request = GetPaymentRequest {
            payment_id: id.to_string(),
        };

        match self.sdk.get_payment(request).await {
            Ok(response) => Ok(runtime_payment(response.payment)),
            Err(err) => {
                let message = err.to_string();
                if message.to_ascii_lowercase().contains("not found") {
                    Err(RuntimeError::NotFound(id.to_string()))
                } else {
                    Err(RuntimeError::Rejected(message))
                }
            }
        }
    }

    async fn receive_payment(&self, method: ReceiveMethod) -> RuntimeResult<ReceiveResponse> {
        let payment_method = match method {
            ReceiveMethod::Bolt11Invoice {
                description,
                amount_sats,
            } => ReceivePaymentMethod::Bolt11Invoice {
                description,
                amount_sats,
                expiry_secs: None,
                payment_hash: None,
            },
            ReceiveMethod::BitcoinAddress => ReceivePaymentMethod::BitcoinAddress,
            ReceiveMethod::SparkAddress => ReceivePaymentMethod::SparkAddress,
        };

        let response = self
            .sdk
            .receive_payment(ReceivePaymentRequest { payment_method })
            .await
            .map_err(rejected)?;

        Ok(ReceiveResponse {
            payment_request: response.payment_request,
            fee_sats: u64::try_from(response.fee).unwrap_or(u64::MAX),
            expires_at: None,
        })
    }

    async fn prepare_send_payment(
        &self,
        destination: &str,
        amount_sats: Option<u64>,
    ) -> RuntimeResult<PreparedSend> {
        let request = PrepareSendPaymentRequest {
            payment_request: destination.to_string(),
            amount: amount_sats.map(u128::from),
            token_identifier: None,
            conversion_options: None,
            fee_policy: None,
        };

        let response = self
            .sdk
            .prepare_send_payment(request)
            .await
            .map_err(rejected)?;

        let (destination_kind, fee_sats) = match &response.payment_method {
            SendPaymentMethod::Bolt11Invoice {
                lightning_fee_sats, ..
            } => (DestinationKind::Bolt11Invoice, *lightning_fee_sats),
            SendPaymentMethod::BitcoinAddress { fee_quote, .. } => {
                let quote = &fee_quote.speed_medium;
                (
                    DestinationKind::BitcoinAddress,
                    quote.user_fee_sat.saturating_add(quote.l1_broadcast_fee_sat),
                )
            }
            SendPaymentMethod::SparkAddress { fee, .. }
            | SendPaymentMethod::SparkInvoice { fee, .. } => (
                DestinationKind::SparkAddress,
                u64::try_from(*fee).unwrap_or(u64::MAX),
            ),
        };

        Ok(PreparedSend {
            destination: destination.to_string(),
            destination_kind,
            amount_sats: u64::try_from(response.amount).unwrap_or(u64::MAX),
            fee_sats,
            handle: Some(Arc::new(response)),
        })
    }

    async fn send_payment(
        &self,
        prepared: PreparedSend,
        options: Option<SendOptions>,
    ) -> RuntimeResult<RuntimePayment> {
        let prepare_response = prepared
            .handle
            .as_ref()
            .and_then(|handle| handle.downcast_ref::<PrepareSendPaymentResponse>())
            .cloned()
            .ok_or_else(|| rejected("prepared payment was not created by the Breez runtime"))?;

        let options = options.map(|options| match options {
            SendOptions::BitcoinAddress { confirmation_speed } => {
                SendPaymentOptions::BitcoinAddress {
                    confirmation_speed: match confirmation_speed {
                        ConfirmationSpeed::Fast => OnchainConfirmationSpeed::Fast,
                        ConfirmationSpeed::Medium => OnchainConfirmationSpeed::Medium,
                        ConfirmationSpeed::Slow => OnchainConfirmationSpeed::Slow,
                    },
                }
            }
        });

        let response = self
            .sdk
            .send_payment(SendPaymentRequest {
                prepare_response,
                options,
                idempotency_key: None,
            })
            .await
            .map_err(rejected)?;

        Ok(runtime_payment(response.payment))
    }

    async fn parse(&self, input: &str) -> RuntimeResult<InputKind> {
        let parsed = self.sdk.parse(input).await.map_err(rejected)?;

        Ok(match parsed {
            InputType::LightningAddress(LightningAddressDetails {
                address,
                pay_request,
                ..
            }) => InputKind::LightningAddress {
                address,
                pay_request: pay_request_of(&pay_request),
            },
            InputType::LnurlPay(pay_request) => InputKind::LnurlPay(pay_request_of(&pay_request)),
            InputType::Bolt11Invoice(_) => InputKind::Bolt11Invoice,
            InputType::BitcoinAddress(_) => InputKind::BitcoinAddress,
            InputType::SparkAddress(_) => InputKind::SparkAddress,
            other => InputKind::Other(variant_name(&other)),
        })
    }

    async fn prepare_lnurl_pay(&self, request: PrepareLnurlPay) -> RuntimeResult<PreparedLnurlPay> {
        let raw = request
            .pay_request
            .raw
            .as_deref()
            .ok_or_else(|| rejected("pay request was not resolved by the Breez runtime"))?;
        let pay_request: LnurlPayRequestDetails = serde_json::from_str(raw).map_err(rejected)?;

        let response = self
            .sdk
            .prepare_lnurl_pay(PrepareLnurlPayRequest {
                amount_sats: request.amount_sats,
                pay_request,
                comment: request.comment,
                validate_success_action_url: Some(request.validate_success_action_url),
                conversion_options: None,
                fee_policy: None,
            })
            .await
            .map_err(rejected)?;

        Ok(PreparedLnurlPay {
            amount_sats: response.amount_sats,
            fee_sats: response.fee_sats,
            handle: Some(Arc::new(response)),
        })
    }

    async fn lnurl_pay(&self, prepared: PreparedLnurlPay) -> RuntimeResult<RuntimePayment> {
        let prepare_response = prepared
            .handle
            .as_ref()
            .and_then(|handle| handle.downcast_ref::<PrepareLnurlPayResponse>())
            .cloned()
            .ok_or_else(|| rejected("prepared payment was not created by the Breez runtime"))?;

        let response = self
            .sdk
            .lnurl_pay(LnurlPayRequest {
                prepare_response,
                idempotency_key: None,
            })
            .await
            .map_err(rejected)?;

        Ok(runtime_payment(response.payment))
    }

    async fn disconnect(&self) -> RuntimeResult<()> {
        self.sdk.disconnect().await.map_err(rejected)
    }
}

fn runtime_payment(payment: Payment) -> RuntimePayment {
    let (description, preimage) = match &payment.details {
        Some(PaymentDetails::Lightning {
            description,
            preimage,
            ..
        }) => (description.clone(), preimage.clone()),
        _ => (None, None),
    };

    RuntimePayment {
        id: payment.id,
        kind: Some(match payment.payment_type {
            PaymentType::Send => PaymentKind::Send,
            PaymentType::Receive => PaymentKind::Receive,
        }),
        amount_sats: i64::try_from(payment.amount).unwrap_or(i64::MAX),
        fee_sats: u64::try_from(payment.fees).unwrap_or(u64::MAX),
        status: match payment.status {
            PaymentStatus::Pending => RuntimePaymentStatus::Pending,
            PaymentStatus::Completed => RuntimePaymentStatus::Completed,
            PaymentStatus::Failed => RuntimePaymentStatus::Failed,
        },
        timestamp: payment.timestamp,
        rail: match payment.method {
            SdkPaymentMethod::Lightning => SettlementRail::Lightning,
            SdkPaymentMethod::Spark => SettlementRail::Spark,
            SdkPaymentMethod::Token => SettlementRail::Token,
            SdkPaymentMethod::Deposit => SettlementRail::Deposit,
            SdkPaymentMethod::Withdraw => SettlementRail::Withdraw,
            SdkPaymentMethod::Unknown => SettlementRail::Unknown,
        },
        description,
        preimage,
    }
}

fn pay_request_of(details: &LnurlPayRequestDetails) -> PayRequest {
    PayRequest {
        callback: details.callback.clone(),
        min_sendable_msat: details.min_sendable,
        max_sendable_msat: details.max_sendable,
        comment_allowed: details.comment_allowed,
        domain: details.domain.clone(),
        raw: serde_json::to_string(details).ok(),
    }
}

/// Variant name of a parsed input, e.g. `LnurlWithdraw`.
fn variant_name(input: &InputType) -> String {
    let rendered = format!("{input:?}");
    rendered
        .split(|c: char| !c.is_alphanumeric())
        .next()
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_networks_map_to_regtest() {
        assert!(matches!(sdk_network(Network::Mainnet), SdkNetwork::Mainnet));
        assert!(matches!(sdk_network(Network::Testnet), SdkNetwork::Regtest));
        assert!(matches!(sdk_network(Network::Signet), SdkNetwork::Regtest));
        assert!(matches!(sdk_network(Network::Regtest), SdkNetwork::Regtest));
    }

    #[test]
    fn test_missed_sync_event_forces_one_sync() {
        let sync = SyncState::default();
        assert!(!sync.is_synced());
        assert!(sync.take_forced_sync());
        assert!(!sync.take_forced_sync());

        sync.mark_synced();
        assert!(sync.is_synced());
        assert!(!sync.take_forced_sync());
    }

    #[test]
    fn test_sync_event_before_first_poll_skips_forced_sync() {
        let sync = SyncState::default();
        sync.mark_synced();
        assert!(!sync.take_forced_sync());
    }
}
