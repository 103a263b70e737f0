//! In-memory wallet runtime.
//!
//! Keeps all state in memory for the lifetime of the process. Backs the
//! test suites and the CLI's `--mock` flag. Every clone shares the same
//! state, so a test can keep a handle to inspect what the facade did.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::runtime::{
    ConnectRequest, Connector, DestinationKind, InputKind, PaymentKind, PrepareLnurlPay,
    PreparedLnurlPay, PreparedSend, ReceiveMethod, ReceiveResponse, RuntimeError, RuntimePayment,
    RuntimePaymentStatus, RuntimeResult, SendOptions, SettlementRail, TokenHolding, WalletInfo,
    WalletRuntime,
};

/// Runtime operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    GetInfo,
    ListPayments,
    GetPayment,
    Receive,
    PrepareSend,
    SendPayment,
    Parse,
    PrepareLnurlPay,
    LnurlPay,
    Disconnect,
}

/// Number of times each interesting call was made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub connects: usize,
    pub prepares: usize,
    pub sends: usize,
    pub parses: usize,
    pub lnurl_prepares: usize,
    pub lnurl_pays: usize,
    pub disconnects: usize,
}

/// Fee charged per rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    pub lightning_sats: u64,
    pub onchain_sats: u64,
    pub spark_sats: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            lightning_sats: 2,
            onchain_sats: 250,
            spark_sats: 0,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    balance_sats: u64,
    tokens: Vec<TokenHolding>,
    /// Newest first
    payments: Vec<RuntimePayment>,
    invoices: HashMap<String, u64>,
    aliases: HashMap<String, InputKind>,
    failures: HashMap<Operation, RuntimeError>,
    latency: Option<Duration>,
    synced_after_polls: usize,
    sync_polls: usize,
    last_page_size: Option<u32>,
    last_send_options: Option<SendOptions>,
    last_connect: Option<ConnectRequest>,
    calls: CallCounts,
    sequence: u64,
    disconnected: bool,
}

/// In-memory backend implementing both [`Connector`] and [`WalletRuntime`].
#[derive(Debug, Clone, Default)]
pub struct Backend {
    state: Arc<Mutex<State>>,
    fees: FeeSchedule,
}

impl Backend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that already holds `sats`.
    pub fn with_balance(sats: u64) -> Self {
        let backend = Self::new();
        backend.set_balance(sats);
        backend
    }

    pub fn with_fees(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_balance(&self, sats: u64) {
        self.state().balance_sats = sats;
    }

    pub fn balance(&self) -> u64 {
        self.state().balance_sats
    }

    pub fn add_token(&self, token: TokenHolding) {
        self.state().tokens.push(token);
    }

    /// Record a payment as the newest entry in history.
    pub fn push_payment(&self, payment: RuntimePayment) {
        self.state().payments.insert(0, payment);
    }

    /// Make an invoice known so that sends without an amount can use its amount.
    pub fn add_invoice(&self, invoice: impl Into<String>, amount_sats: u64) {
        self.state().invoices.insert(invoice.into(), amount_sats);
    }

    /// Set what `parse` returns for `input`.
    pub fn add_alias(&self, input: impl Into<String>, kind: InputKind) {
        self.state().aliases.insert(input.into(), kind);
    }

    /// Make every future call of `operation` fail with `error`.
    pub fn fail_on(&self, operation: Operation, error: RuntimeError) {
        self.state().failures.insert(operation, error);
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Delay every query, receive and send call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    async fn simulate_latency(&self) {
        let latency = self.state().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Report "synced" only after `polls` calls to `is_synced`.
    pub fn sync_after(&self, polls: usize) {
        self.state().synced_after_polls = polls;
    }

    pub fn never_sync(&self) {
        self.state().synced_after_polls = usize::MAX;
    }

    pub fn sync_polls(&self) -> usize {
        self.state().sync_polls
    }

    pub fn calls(&self) -> CallCounts {
        self.state().calls
    }

    /// Page size requested by the last `list_payments` call.
    pub fn last_page_size(&self) -> Option<u32> {
        self.state().last_page_size
    }

    pub fn last_send_options(&self) -> Option<SendOptions> {
        self.state().last_send_options
    }

    pub fn last_connect(&self) -> Option<ConnectRequest> {
        self.state().last_connect.clone()
    }

    pub fn payments(&self) -> Vec<RuntimePayment> {
        self.state().payments.clone()
    }

    fn check(state: &State, operation: Operation) -> RuntimeResult<()> {
        if state.disconnected && operation != Operation::Disconnect {
            return Err(RuntimeError::Unavailable("runtime disconnected".to_string()));
        }
        match state.failures.get(&operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn next_id(state: &mut State, prefix: &str) -> String {
        state.sequence += 1;
        format!("{prefix}-{:04}-{}", state.sequence, uuid::Uuid::new_v4().simple())
    }

    fn detect(&self, destination: &str) -> DestinationKind {
        let lower = destination.to_ascii_lowercase();
        if lower.starts_with("lnbc") || lower.starts_with("lntb") {
            DestinationKind::Bolt11Invoice
        } else if lower.starts_with("spark") {
            DestinationKind::SparkAddress
        } else if lower.starts_with("bc1")
            || lower.starts_with("tb1")
            || lower.starts_with("bcrt1")
            || lower.starts_with('1')
            || lower.starts_with('3')
        {
            DestinationKind::BitcoinAddress
        } else {
            DestinationKind::Other
        }
    }

    fn fee_for(&self, kind: DestinationKind) -> u64 {
        match kind {
            DestinationKind::Bolt11Invoice => self.fees.lightning_sats,
            DestinationKind::BitcoinAddress => self.fees.onchain_sats,
            DestinationKind::SparkAddress | DestinationKind::Other => self.fees.spark_sats,
        }
    }

    /// Debit the wallet and record an outgoing payment.
    fn settle_outgoing(
        state: &mut State,
        amount_sats: u64,
        fee_sats: u64,
        rail: SettlementRail,
        description: Option<String>,
    ) -> RuntimeResult<RuntimePayment> {
        let total = amount_sats.saturating_add(fee_sats);
        if total > state.balance_sats {
            return Err(RuntimeError::Rejected(format!(
                "insufficient funds: need {total} sats, have {} sats",
                state.balance_sats
            )));
        }
        state.balance_sats -= total;

        let amount = i64::try_from(amount_sats)
            .map_err(|_| RuntimeError::Rejected("amount out of range".to_string()))?;
        let preimage = match rail {
            SettlementRail::Lightning => Some(hex::encode(uuid::Uuid::new_v4().as_bytes())),
            _ => None,
        };
        let payment = RuntimePayment {
            id: Self::next_id(state, "mock-payment"),
            kind: Some(PaymentKind::Send),
            amount_sats: amount,
            fee_sats,
            status: RuntimePaymentStatus::Completed,
            timestamp: now_secs(),
            rail,
            description,
            preimage,
        };
        state.payments.insert(0, payment.clone());
        Ok(payment)
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[async_trait]
impl Connector for Backend {
    async fn connect(&self, request: ConnectRequest) -> RuntimeResult<Arc<dyn WalletRuntime>> {
        let mut state = self.state();
        state.calls.connects += 1;
        state.last_connect = Some(request);
        if let Some(error) = state.failures.get(&Operation::Connect) {
            return Err(error.clone());
        }
        state.disconnected = false;
        drop(state);
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl WalletRuntime for Backend {
    async fn is_synced(&self) -> RuntimeResult<bool> {
        let mut state = self.state();
        state.sync_polls += 1;
        Ok(state.sync_polls > state.synced_after_polls)
    }

    async fn get_info(&self, _ensure_synced: bool) -> RuntimeResult<WalletInfo> {
        self.simulate_latency().await;
        let state = self.state();
        Self::check(&state, Operation::GetInfo)?;
        Ok(WalletInfo {
            balance_sats: state.balance_sats,
            token_balances: state.tokens.clone(),
        })
    }

    async fn list_payments(&self, offset: u32, limit: u32) -> RuntimeResult<Vec<RuntimePayment>> {
        self.simulate_latency().await;
        let mut state = self.state();
        Self::check(&state, Operation::ListPayments)?;
        state.last_page_size = Some(limit);
        Ok(state
            .payments
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn get_payment(&self, id: &str) -> RuntimeResult<RuntimePayment> {
        self.simulate_latency().await;
        let state = self.state();
        Self::check(&state, Operation::GetPayment)?;
        state
            .payments
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
    }

    async fn receive_payment(&self, method: ReceiveMethod) -> RuntimeResult<ReceiveResponse> {
        self.simulate_latency().await;
        let mut state = self.state();
        Self::check(&state, Operation::Receive)?;
        state.sequence += 1;
        let seq = state.sequence;
        let payment_request = match method {
            ReceiveMethod::Bolt11Invoice { amount_sats, .. } => {
                let amount = amount_sats.unwrap_or_default();
                let invoice = format!("lnbcrt{amount}n1pmock{seq:06}");
                state.invoices.insert(invoice.clone(), amount);
                invoice
            }
            ReceiveMethod::BitcoinAddress => format!("bcrt1qmock{seq:030}"),
            ReceiveMethod::SparkAddress => format!("sparkrt1mock{seq:030}"),
        };
        Ok(ReceiveResponse {
            payment_request,
            fee_sats: 0,
            expires_at: None,
        })
    }

    async fn prepare_send_payment(
        &self,
        destination: &str,
        amount_sats: Option<u64>,
    ) -> RuntimeResult<PreparedSend> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.calls.prepares += 1;
        Self::check(&state, Operation::PrepareSend)?;

        let destination_kind = self.detect(destination);
        if destination_kind == DestinationKind::Other {
            return Err(RuntimeError::Rejected(format!(
                "unrecognized payment request: {destination}"
            )));
        }

        let invoice_amount = state.invoices.get(destination).copied().filter(|a| *a > 0);
        let amount_sats = match (amount_sats, invoice_amount) {
            (Some(amount), _) => amount,
            (None, Some(amount)) => amount,
            (None, None) => {
                return Err(RuntimeError::Rejected("amount is required".to_string()));
            }
        };
        if amount_sats == 0 {
            return Err(RuntimeError::Rejected("amount must be positive".to_string()));
        }

        Ok(PreparedSend {
            destination: destination.to_string(),
            destination_kind,
            amount_sats,
            fee_sats: self.fee_for(destination_kind),
            handle: None,
        })
    }

    async fn send_payment(
        &self,
        prepared: PreparedSend,
        options: Option<SendOptions>,
    ) -> RuntimeResult<RuntimePayment> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.calls.sends += 1;
        state.last_send_options = options;
        Self::check(&state, Operation::SendPayment)?;

        let rail = match prepared.destination_kind {
            DestinationKind::Bolt11Invoice => SettlementRail::Lightning,
            DestinationKind::BitcoinAddress => SettlementRail::Withdraw,
            DestinationKind::SparkAddress | DestinationKind::Other => SettlementRail::Spark,
        };
        Self::settle_outgoing(&mut state, prepared.amount_sats, prepared.fee_sats, rail, None)
    }

    async fn parse(&self, input: &str) -> RuntimeResult<InputKind> {
        let mut state = self.state();
        state.calls.parses += 1;
        Self::check(&state, Operation::Parse)?;
        if let Some(kind) = state.aliases.get(input) {
            return Ok(kind.clone());
        }
        Ok(match self.detect(input) {
            DestinationKind::Bolt11Invoice => InputKind::Bolt11Invoice,
            DestinationKind::BitcoinAddress => InputKind::BitcoinAddress,
            DestinationKind::SparkAddress => InputKind::SparkAddress,
            DestinationKind::Other => {
                return Err(RuntimeError::Rejected(format!("could not parse input: {input}")));
            }
        })
    }

    async fn prepare_lnurl_pay(&self, request: PrepareLnurlPay) -> RuntimeResult<PreparedLnurlPay> {
        let mut state = self.state();
        state.calls.lnurl_prepares += 1;
        Self::check(&state, Operation::PrepareLnurlPay)?;
        Ok(PreparedLnurlPay {
            amount_sats: request.amount_sats,
            fee_sats: self.fees.lightning_sats,
            handle: Some(Arc::new(request.comment)),
        })
    }

    async fn lnurl_pay(&self, prepared: PreparedLnurlPay) -> RuntimeResult<RuntimePayment> {
        let mut state = self.state();
        state.calls.lnurl_pays += 1;
        Self::check(&state, Operation::LnurlPay)?;
        let comment = prepared
            .handle
            .as_ref()
            .and_then(|handle| handle.downcast_ref::<Option<String>>())
            .cloned()
            .flatten();
        Self::settle_outgoing(
            &mut state,
            prepared.amount_sats,
            prepared.fee_sats,
            SettlementRail::Lightning,
            comment,
        )
    }

    async fn disconnect(&self) -> RuntimeResult<()> {
        let mut state = self.state();
        state.calls.disconnects += 1;
        Self::check(&state, Operation::Disconnect)?;
        state.disconnected = true;
        Ok(())
    }
}

/// Lightning address resolution used by tests and demos.
pub fn lightning_address(address: &str, min_sats: u64, max_sats: u64) -> InputKind {
    let domain = address.rsplit('@').next().unwrap_or_default().to_string();
    InputKind::LightningAddress {
        address: address.to_string(),
        pay_request: crate::runtime::PayRequest {
            callback: format!("https://{domain}/lnurlp/callback"),
            min_sendable_msat: min_sats * 1000,
            max_sendable_msat: max_sats * 1000,
            comment_allowed: 255,
            domain,
            raw: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Ids of payments with the given direction tag, newest first.
    fn payment_ids(backend: &Backend, kind: PaymentKind) -> Vec<String> {
        backend
            .payments()
            .into_iter()
            .filter(|p| p.kind == Some(kind))
            .map(|p| p.id)
            .collect::<Vec<_>>()
    }

    /// Distinct rails present in history.
    fn rails(backend: &Backend) -> HashSet<SettlementRail> {
        backend.payments().into_iter().map(|p| p.rail).collect()
    }

    #[tokio::test]
    async fn test_prepare_rejects_unknown_destination() {
        let backend = Backend::with_balance(10_000);
        let err = backend
            .prepare_send_payment("not-an-address", Some(100))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_send_debits_amount_and_fee() {
        let backend = Backend::with_balance(10_000);
        let prepared = backend
            .prepare_send_payment("bcrt1qdestination", Some(1_000))
            .await
            .unwrap();
        assert_eq!(prepared.fee_sats, 250);

        let payment = backend.send_payment(prepared, None).await.unwrap();
        assert_eq!(payment.kind, Some(PaymentKind::Send));
        assert_eq!(payment.amount_sats, 1_000);
        assert_eq!(backend.balance(), 8_750);
        assert_eq!(rails(&backend), HashSet::from([SettlementRail::Withdraw]));
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let backend = Backend::with_balance(100);
        let prepared = backend
            .prepare_send_payment("sparkrt1dest", Some(1_000))
            .await
            .unwrap();
        let err = backend.send_payment(prepared, None).await.unwrap_err();
        assert!(err.to_string().contains("insufficient funds"));
        assert_eq!(backend.balance(), 100);
    }

    #[tokio::test]
    async fn test_invoice_amount_used_when_omitted() {
        let backend = Backend::with_balance(10_000);
        backend.add_invoice("lnbcrt5u1pinvoice", 500);
        let prepared = backend
            .prepare_send_payment("lnbcrt5u1pinvoice", None)
            .await
            .unwrap();
        assert_eq!(prepared.amount_sats, 500);
    }

    #[tokio::test]
    async fn test_failure_injection_and_disconnect() {
        let backend = Backend::new();
        backend.fail_on(Operation::GetInfo, RuntimeError::Unavailable("down".into()));
        assert!(backend.get_info(false).await.is_err());
        backend.clear_failures();
        assert!(backend.get_info(false).await.is_ok());

        backend.disconnect().await.unwrap();
        assert!(backend.get_info(false).await.is_err());
        assert_eq!(backend.calls().disconnects, 1);
    }

    #[tokio::test]
    async fn test_sync_after_polls() {
        let backend = Backend::new();
        backend.sync_after(2);
        assert!(!backend.is_synced().await.unwrap());
        assert!(!backend.is_synced().await.unwrap());
        assert!(backend.is_synced().await.unwrap());
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let backend = Backend::with_balance(10_000);
        for amount in [100, 200] {
            let prepared = backend
                .prepare_send_payment("sparkrt1dest", Some(amount))
                .await
                .unwrap();
            backend.send_payment(prepared, None).await.unwrap();
        }
        let listed = backend.list_payments(0, 10).await.unwrap();
        assert_eq!(listed[0].amount_sats, 200);
        assert_eq!(listed[1].amount_sats, 100);
        assert_eq!(payment_ids(&backend, PaymentKind::Send).len(), 2);
    }
}
