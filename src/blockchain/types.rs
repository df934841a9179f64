//! Chain-specific types and error definitions.

use thiserror::Error;

// Re-export BlockchainConfig from config module to avoid duplication
pub use crate::config::schema::BlockchainConfig;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// RPC connection or request failed. Carries the node's message verbatim.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// The node refused to estimate gas, usually because the call would revert.
    #[error("Gas estimation failed: {0}")]
    Estimation(String),

    /// Transaction was not included within the inclusion budget.
    #[error("Transaction not included after {0} seconds")]
    InclusionTimeout(u64),

    /// Transaction was reverted on-chain.
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    /// Invalid private key format or derivation error.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Building or signing the transaction envelope failed.
    #[error("Signing error: {0}")]
    Signing(String),

    /// Endpoint URL could not be used.
    #[error("Invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// No endpoints were supplied to the pool.
    #[error("Endpoint pool requires at least one endpoint")]
    EmptyPool,
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// What an endpoint reports for a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InclusionReceipt {
    /// Block the transaction was included in.
    pub block_number: u64,
    /// Gas consumed by execution.
    pub gas_used: u64,
    /// False when execution reverted.
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_conversion() {
        let chain_id = ChainId::from(1u64);
        assert_eq!(chain_id.0, 1);
        assert_eq!(u64::from(chain_id), 1);
    }

    #[test]
    fn test_error_display() {
        let err = BlockchainError::Timeout(10);
        assert_eq!(err.to_string(), "RPC timeout after 10 seconds");

        let err = BlockchainError::Rpc("nonce too low".into());
        assert_eq!(err.to_string(), "RPC error: nonce too low");

        let err = BlockchainError::InvalidEndpoint {
            url: "bogus".into(),
            reason: "relative URL without a base".into(),
        };
        assert!(err.to_string().contains("bogus"));
    }
}
