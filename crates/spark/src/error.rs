//! Error types for wallet operations

use thiserror::Error;

use crate::runtime::RuntimeError;
use crate::types::PaymentMethod;

/// Stage of a send at which it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStage {
    /// Local checks, before the runtime is contacted
    Validate,
    /// Quote / destination check by the runtime
    Prepare,
    /// Commit
    Execute,
}

impl std::fmt::Display for SendStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            SendStage::Validate => "validate",
            SendStage::Prepare => "prepare",
            SendStage::Execute => "execute",
        };
        f.write_str(stage)
    }
}

/// Coarse classification of a [`SparkError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    NotConnected,
    Query,
    NotFound,
    Receive,
    Send,
    Resolve,
}

/// Errors returned by [`crate::SparkWallet`]
#[derive(Debug, Error)]
pub enum SparkError {
    /// Working directory could not be prepared or the runtime refused the connection
    #[error("Failed to connect wallet: {0}")]
    Connection(String),

    /// Operation issued on a wallet that was already disconnected
    #[error("Wallet is not connected")]
    NotConnected,

    /// A read operation was rejected
    #[error("Failed to {operation}: {source}")]
    Query {
        operation: &'static str,
        #[source]
        source: RuntimeError,
    },

    /// Lookup by id found nothing
    #[error("Payment not found: {0}")]
    NotFound(String),

    #[error("Failed to create {method} payment request: {reason}")]
    Receive { method: PaymentMethod, reason: String },

    #[error("Failed to {stage} {method} payment: {reason}")]
    Send {
        method: PaymentMethod,
        stage: SendStage,
        reason: String,
    },

    /// Address alias did not resolve to something payable
    #[error("Failed to resolve '{alias}': {reason}")]
    Resolve { alias: String, reason: String },
}

impl SparkError {
    pub(crate) fn query(operation: &'static str, source: RuntimeError) -> Self {
        SparkError::Query { operation, source }
    }

    pub(crate) fn send(method: PaymentMethod, stage: SendStage, reason: impl ToString) -> Self {
        SparkError::Send {
            method,
            stage,
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SparkError::Connection(_) => ErrorKind::Connection,
            SparkError::NotConnected => ErrorKind::NotConnected,
            SparkError::Query { .. } => ErrorKind::Query,
            SparkError::NotFound(_) => ErrorKind::NotFound,
            SparkError::Receive { .. } => ErrorKind::Receive,
            SparkError::Send { .. } => ErrorKind::Send,
            SparkError::Resolve { .. } => ErrorKind::Resolve,
        }
    }

    /// Stage a send failed at, if this is a send failure.
    pub fn send_stage(&self) -> Option<SendStage> {
        match self {
            SparkError::Send { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether the wallet balance is known to be untouched by the failed operation.
    ///
    /// Only a failure while executing a send leaves the outcome unknown.
    pub fn balance_unaffected(&self) -> bool {
        !matches!(
            self,
            SparkError::Send {
                stage: SendStage::Execute,
                ..
            }
        )
    }

    /// Suggestion shown alongside the error message, when there is one.
    pub fn recovery_hint(&self) -> Option<&'static str> {
        match self {
            SparkError::Connection(_) => Some(
                "Check BREEZ_API_KEY, BREEZ_MNEMONIC and that the working directory is writable.",
            ),
            SparkError::NotFound(_) => {
                Some("Run 'tiny-spark transactions' to list known payment ids.")
            }
            SparkError::Send {
                stage: SendStage::Execute,
                ..
            } => Some("Run 'tiny-spark transactions' to check whether the payment went through."),
            SparkError::Send { .. } => {
                Some("Check the destination and amount; nothing was sent.")
            }
            SparkError::Resolve { .. } => {
                Some("Only Lightning addresses (user@domain) and LNURL-pay links can be paid.")
            }
            SparkError::Query {
                source: RuntimeError::Timeout(_),
                ..
            } => Some("The wallet runtime did not answer in time; try again later."),
            _ => None,
        }
    }
}

/// Result type for wallet operations
pub type Result<T> = std::result::Result<T, SparkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_error_names_stage_and_method() {
        let err = SparkError::send(
            PaymentMethod::OnchainAddress,
            SendStage::Prepare,
            "bad address",
        );
        assert_eq!(err.to_string(), "Failed to prepare bitcoin payment: bad address");
        assert_eq!(err.send_stage(), Some(SendStage::Prepare));
        assert!(err.balance_unaffected());
    }

    #[test]
    fn test_execute_failure_may_affect_balance() {
        let err = SparkError::send(PaymentMethod::LightningInvoice, SendStage::Execute, "boom");
        assert!(!err.balance_unaffected());
        assert!(err.recovery_hint().is_some());
    }

    #[test]
    fn test_query_error_keeps_source() {
        let err = SparkError::query("get balance", RuntimeError::Rejected("denied".into()));
        assert_eq!(err.kind(), ErrorKind::Query);
        assert_eq!(err.to_string(), "Failed to get balance: denied");
        assert!(std::error::Error::source(&err).is_some());
    }
}
