//! Uniform result records returned by [`crate::SparkWallet`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::runtime::{PaymentKind, RuntimePayment, RuntimePaymentStatus};

/// Description used when a payment carries none.
pub const DEFAULT_PAYMENT_DESCRIPTION: &str = "Payment";

/// Settlement method a receive request or send is made with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// BOLT-11 Lightning invoice
    LightningInvoice,
    /// On-chain Bitcoin address
    OnchainAddress,
    /// Spark address (ledger-native transfer)
    LedgerAddress,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::LightningInvoice => "lightning",
            PaymentMethod::OnchainAddress => "bitcoin",
            PaymentMethod::LedgerAddress => "spark",
        }
    }

    /// Description a receive request gets when the caller leaves it empty.
    pub fn default_receive_description(&self) -> &'static str {
        match self {
            PaymentMethod::LightningInvoice => "Payment request",
            PaymentMethod::OnchainAddress => "Bitcoin address deposit",
            PaymentMethod::LedgerAddress => "Spark address deposit",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lightning" | "ln" | "bolt11" => Ok(PaymentMethod::LightningInvoice),
            "bitcoin" | "btc" | "onchain" => Ok(PaymentMethod::OnchainAddress),
            "spark" => Ok(PaymentMethod::LedgerAddress),
            other => Err(format!("Unknown payment method: {other}")),
        }
    }
}

/// Wallet balance in satoshis
///
/// # Examples
///
/// ```
/// use tiny_spark::BalanceSnapshot;
///
/// let balance = BalanceSnapshot::uniform(21_000);
/// assert_eq!(balance.max_payable_sats, 21_000);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub spendable_sats: u64,
    pub max_payable_sats: u64,
    pub max_receivable_sats: u64,
}

impl BalanceSnapshot {
    /// Snapshot where the runtime reports a single figure for all three fields.
    pub fn uniform(sats: u64) -> Self {
        Self {
            spendable_sats: sats,
            max_payable_sats: sats,
            max_receivable_sats: sats,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    /// Short label used in listings.
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Incoming => "receive",
            Direction::Outgoing => "send",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Complete",
            PaymentStatus::Failed => "Failed",
        }
    }
}

impl From<RuntimePaymentStatus> for PaymentStatus {
    fn from(value: RuntimePaymentStatus) -> Self {
        match value {
            RuntimePaymentStatus::Pending => PaymentStatus::Pending,
            RuntimePaymentStatus::Completed => PaymentStatus::Completed,
            RuntimePaymentStatus::Failed => PaymentStatus::Failed,
        }
    }
}

/// A payment in history, normalized from the runtime's shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub direction: Direction,
    /// Positive for incoming, negative for outgoing
    pub amount_sats: i64,
    pub fee_sats: u64,
    pub status: PaymentStatus,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    /// Rail the payment settled on (`lightning`, `spark`, `deposit`, ...)
    pub method: String,
}

impl From<RuntimePayment> for PaymentRecord {
    fn from(payment: RuntimePayment) -> Self {
        let (direction, amount_sats) = classify(payment.kind, payment.amount_sats);
        let description = payment
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PAYMENT_DESCRIPTION.to_string());

        Self {
            id: payment.id,
            direction,
            amount_sats,
            fee_sats: payment.fee_sats,
            status: payment.status.into(),
            description,
            timestamp: timestamp_from_unix(payment.timestamp),
            method: payment.rail.as_str().to_string(),
        }
    }
}

/// Direction and signed amount for a runtime payment.
///
/// The explicit tag wins over the sign of the raw amount. Without a tag,
/// a positive amount is incoming and the raw amount is kept as is.
pub fn classify(kind: Option<PaymentKind>, raw_amount: i64) -> (Direction, i64) {
    let magnitude = raw_amount.saturating_abs();
    match kind {
        Some(PaymentKind::Receive) => (Direction::Incoming, magnitude),
        Some(PaymentKind::Send) => (Direction::Outgoing, -magnitude),
        None if raw_amount > 0 => (Direction::Incoming, raw_amount),
        None => (Direction::Outgoing, raw_amount),
    }
}

pub(crate) fn timestamp_from_unix(secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_default()
}

/// A payment request created for receiving funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveRequest {
    /// Invoice, Bitcoin address or Spark address
    pub payment_request: String,
    /// 0 when the payer chooses the amount
    pub requested_amount_sats: u64,
    pub fee_sats: u64,
    pub description: String,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a send or an alias payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    pub payment: PaymentRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preimage: Option<String>,
}

/// Balance of one token held by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub token_id: String,
    /// Base units; token supplies can exceed 64 bits
    #[serde(with = "decimal_string")]
    pub balance: u128,
    pub name: String,
    pub ticker: String,
    pub decimals: u32,
}

impl TokenBalance {
    /// Balance scaled by `decimals`, e.g. `1234567` with 6 decimals is `1.234567`.
    pub fn display_balance(&self) -> String {
        let raw = self.balance.to_string();
        let decimals = self.decimals as usize;
        if decimals == 0 {
            return raw;
        }
        let padded = format!("{raw:0>width$}", width = decimals + 1);
        let (whole, fraction) = padded.split_at(padded.len() - decimals);
        let fraction = fraction.trim_end_matches('0');
        if fraction.is_empty() {
            whole.to_string()
        } else {
            format!("{whole}.{fraction}")
        }
    }
}

mod decimal_string {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::SettlementRail;

    fn runtime_payment(kind: Option<PaymentKind>, amount_sats: i64) -> RuntimePayment {
        RuntimePayment {
            id: "pay-1".to_string(),
            kind,
            amount_sats,
            fee_sats: 2,
            status: RuntimePaymentStatus::Completed,
            timestamp: 1_700_000_000,
            rail: SettlementRail::Lightning,
            description: None,
            preimage: None,
        }
    }

    #[test]
    fn test_tag_overrides_amount_sign() {
        assert_eq!(classify(Some(PaymentKind::Receive), -500), (Direction::Incoming, 500));
        assert_eq!(classify(Some(PaymentKind::Send), 500), (Direction::Outgoing, -500));
        assert_eq!(classify(Some(PaymentKind::Send), -500), (Direction::Outgoing, -500));
    }

    #[test]
    fn test_untagged_uses_sign() {
        assert_eq!(classify(None, 42), (Direction::Incoming, 42));
        assert_eq!(classify(None, -42), (Direction::Outgoing, -42));
        assert_eq!(classify(None, 0), (Direction::Outgoing, 0));
    }

    #[test]
    fn test_record_defaults_description() {
        let record = PaymentRecord::from(runtime_payment(Some(PaymentKind::Send), 1000));
        assert_eq!(record.description, DEFAULT_PAYMENT_DESCRIPTION);
        assert_eq!(record.amount_sats, -1000);
        assert_eq!(record.method, "lightning");
        assert_eq!(record.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_payment_method_aliases() {
        assert_eq!("ln".parse::<PaymentMethod>(), Ok(PaymentMethod::LightningInvoice));
        assert_eq!("BTC".parse::<PaymentMethod>(), Ok(PaymentMethod::OnchainAddress));
        assert_eq!("spark".parse::<PaymentMethod>(), Ok(PaymentMethod::LedgerAddress));
        assert!("lnurl".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_token_balance_serializes_as_string() {
        let token = TokenBalance {
            token_id: "btkn1".to_string(),
            balance: u128::from(u64::MAX) * 10,
            name: "Big".to_string(),
            ticker: "BIG".to_string(),
            decimals: 0,
        };
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["balance"], "184467440737095516150");
        let back: TokenBalance = serde_json::from_value(json).unwrap();
        assert_eq!(back, token);
    }

    #[test]
    fn test_token_display_balance() {
        let mut token = TokenBalance {
            token_id: "t".to_string(),
            balance: 1_234_500,
            name: "T".to_string(),
            ticker: "T".to_string(),
            decimals: 6,
        };
        assert_eq!(token.display_balance(), "1.2345");
        token.balance = 5;
        assert_eq!(token.display_balance(), "0.000005");
        token.balance = 2_000_000;
        assert_eq!(token.display_balance(), "2");
    }
}
