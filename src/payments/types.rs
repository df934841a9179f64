//! Payment request, outcome and error types.

use alloy::primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blockchain::transaction::Transfer;
use crate::blockchain::types::BlockchainError;
use crate::load_balancer::AllEndpointsUnavailable;
use crate::resilience::retries::is_nonce_conflict;

/// Caller-supplied urgency. Recorded and logged only; it does not affect
/// fees or endpoint choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// One value transfer to execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Sender whose pending nonce is used.
    #[serde(alias = "fromAddress")]
    pub from: Address,
    /// Recipient of the value or tokens.
    #[serde(alias = "toAddress")]
    pub to: Address,
    /// Amount in the smallest unit (wei or token base units).
    pub amount: U256,
    /// Token contract; absent for a native transfer.
    #[serde(default, alias = "tokenContract", skip_serializing_if = "Option::is_none")]
    pub token: Option<Address>,
    #[serde(default)]
    pub priority: Priority,
}

impl PaymentRequest {
    /// Native transfer with default priority.
    pub fn native(from: Address, to: Address, amount: U256) -> Self {
        Self {
            from,
            to,
            amount,
            token: None,
            priority: Priority::default(),
        }
    }

    /// Token transfer with default priority.
    pub fn token(from: Address, to: Address, amount: U256, contract: Address) -> Self {
        Self {
            token: Some(contract),
            ..Self::native(from, to, amount)
        }
    }

    /// The transfer this request performs. Selected solely by `token`.
    pub fn transfer(&self) -> Transfer {
        match self.token {
            Some(contract) => Transfer::Token {
                contract,
                to: self.to,
                amount: self.amount,
            },
            None => Transfer::Native {
                to: self.to,
                value: self.amount,
            },
        }
    }
}

/// Machine-readable failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    AllEndpointsUnavailable,
    NonceConflict,
    EstimationFailed,
    SubmissionFailed,
    RetriesExhausted,
}

impl ErrorKind {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AllEndpointsUnavailable => "ALL_ENDPOINTS_UNAVAILABLE",
            ErrorKind::NonceConflict => "NONCE_CONFLICT",
            ErrorKind::EstimationFailed => "ESTIMATION_FAILED",
            ErrorKind::SubmissionFailed => "SUBMISSION_FAILED",
            ErrorKind::RetriesExhausted => "RETRIES_EXHAUSTED",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while executing a payment.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// No endpoint answered the liveness probe.
    #[error(transparent)]
    AllEndpointsUnavailable(#[from] AllEndpointsUnavailable),

    /// The nonce was already used or a same-nonce replacement was rejected.
    #[error("Nonce conflict: {0}")]
    NonceConflict(String),

    /// Gas estimation or simulation rejected the call.
    #[error("Estimation failed: {0}")]
    EstimationFailed(String),

    /// Transient failure while querying, submitting or awaiting inclusion.
    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    /// The delay-retry budget ran out.
    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<PaymentError>,
    },
}

impl PaymentError {
    /// Failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::AllEndpointsUnavailable(_) => ErrorKind::AllEndpointsUnavailable,
            PaymentError::NonceConflict(_) => ErrorKind::NonceConflict,
            PaymentError::EstimationFailed(_) => ErrorKind::EstimationFailed,
            PaymentError::SubmissionFailed(_) => ErrorKind::SubmissionFailed,
            PaymentError::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
        }
    }

    /// Classify a failure from any step of an attempt.
    ///
    /// Nonce conflicts are recognised wherever they show up; otherwise
    /// estimation errors stay estimation errors and everything else is a
    /// transient submission failure.
    pub fn classify(err: BlockchainError) -> Self {
        let message = match &err {
            BlockchainError::Rpc(msg) | BlockchainError::Estimation(msg) => msg.as_str(),
            _ => "",
        };
        if is_nonce_conflict(message) {
            return PaymentError::NonceConflict(err.to_string());
        }
        match err {
            BlockchainError::Estimation(_) => PaymentError::EstimationFailed(err.to_string()),
            other => PaymentError::SubmissionFailed(other.to_string()),
        }
    }
}

/// Successful inclusion of a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    /// Transaction hash, 0x-prefixed hex.
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
}

/// Terminal failure of a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFailure {
    /// Human-readable description.
    pub message: String,
    /// Terminal failure class.
    pub kind: ErrorKind,
    /// Class of the last attempt's error when `kind` is `RETRIES_EXHAUSTED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_kind: Option<ErrorKind>,
    /// Attempts counted against the delay-retry budget.
    pub attempts: u32,
    /// Endpoint used by the last attempt, if one was selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl PaymentFailure {
    /// Build a failure outcome from the error that ended the payment.
    pub fn from_error(err: &PaymentError, attempts: u32, endpoint: Option<String>) -> Self {
        let last_error_kind = match err {
            PaymentError::RetriesExhausted { last, .. } => Some(last.kind()),
            _ => None,
        };
        Self {
            message: err.to_string(),
            kind: err.kind(),
            last_error_kind,
            attempts,
            endpoint,
        }
    }
}

/// Terminal result of one payment. Exactly one case is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Success(PaymentReceipt),
    Failure(PaymentFailure),
}

impl PaymentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PaymentOutcome::Success(_))
    }

    pub fn receipt(&self) -> Option<&PaymentReceipt> {
        match self {
            PaymentOutcome::Success(r) => Some(r),
            PaymentOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&PaymentFailure> {
        match self {
            PaymentOutcome::Success(_) => None,
            PaymentOutcome::Failure(f) => Some(f),
        }
    }

    /// Metric label for the outcome.
    pub fn status_label(&self) -> &'static str {
        match self {
            PaymentOutcome::Success(_) => "success",
            PaymentOutcome::Failure(_) => "failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_accepts_both_field_spellings() {
        let a: PaymentRequest = serde_json::from_value(json!({
            "fromAddress": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "toAddress": "0x70997970c51812dc3a010c7d01b50e0d17dc79c8",
            "amount": "0x3e8",
            "tokenContract": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "priority": "high"
        }))
        .unwrap();
        let b: PaymentRequest = serde_json::from_value(json!({
            "from": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "to": "0x70997970c51812dc3a010c7d01b50e0d17dc79c8",
            "amount": "0x3e8",
            "token": "0x5fbdb2315678afecb367f032d93f642f64180aa3"
        }))
        .unwrap();

        assert_eq!(a.amount, U256::from(1000u64));
        assert_eq!(a.priority, Priority::High);
        assert_eq!(b.priority, Priority::Medium);
        assert_eq!(a.token, b.token);
        assert_eq!(a.from, b.from);
    }

    #[test]
    fn test_transfer_selected_by_token_presence() {
        let from = Address::repeat_byte(1);
        let to = Address::repeat_byte(2);
        let token = Address::repeat_byte(3);

        assert!(matches!(
            PaymentRequest::native(from, to, U256::from(5u64)).transfer(),
            Transfer::Native { .. }
        ));
        assert_eq!(
            PaymentRequest::token(from, to, U256::from(5u64), token).transfer(),
            Transfer::Token {
                contract: token,
                to,
                amount: U256::from(5u64)
            }
        );
    }

    #[test]
    fn test_classify() {
        let nonce = PaymentError::classify(BlockchainError::Rpc("nonce too low".into()));
        assert_eq!(nonce.kind(), ErrorKind::NonceConflict);

        let underpriced = PaymentError::classify(BlockchainError::Rpc(
            "replacement transaction underpriced".into(),
        ));
        assert_eq!(underpriced.kind(), ErrorKind::NonceConflict);

        let revert =
            PaymentError::classify(BlockchainError::Estimation("execution reverted".into()));
        assert_eq!(revert.kind(), ErrorKind::EstimationFailed);

        let timeout = PaymentError::classify(BlockchainError::Timeout(10));
        assert_eq!(timeout.kind(), ErrorKind::SubmissionFailed);

        let mined_revert = PaymentError::classify(BlockchainError::Reverted("0xabc".into()));
        assert_eq!(mined_revert.kind(), ErrorKind::SubmissionFailed);
    }

    #[test]
    fn test_outcome_wire_format() {
        let failure = PaymentError::RetriesExhausted {
            attempts: 3,
            last: Box::new(PaymentError::SubmissionFailed("boom".into())),
        };
        let outcome = PaymentOutcome::Failure(PaymentFailure::from_error(
            &failure,
            3,
            Some("http://a".into()),
        ));
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "failure");
        assert_eq!(value["kind"], "RETRIES_EXHAUSTED");
        assert_eq!(value["lastErrorKind"], "SUBMISSION_FAILED");
        assert_eq!(value["attempts"], 3);
        assert_eq!(value["endpoint"], "http://a");
        assert!(value["message"].as_str().unwrap().contains("boom"));

        let success = PaymentOutcome::Success(PaymentReceipt {
            tx_hash: TxHash::repeat_byte(0xab),
            block_number: 12,
            gas_used: 21_000,
        });
        let value = serde_json::to_value(&success).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["blockNumber"], 12);
        assert_eq!(value["gasUsed"], 21_000);
        assert!(value["txHash"].as_str().unwrap().starts_with("0xabab"));
    }
}
