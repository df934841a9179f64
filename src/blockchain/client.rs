//! Blockchain RPC client with timeout and error handling.
//!
//! # Responsibilities
//! - Connect to one JSON-RPC endpoint
//! - Query chain state (block number, pending nonce, gas price, receipts)
//! - Estimate gas and broadcast raw signed transactions
//! - Bound every call with the configured RPC timeout
//!
//! Failover is not handled here: one client talks to exactly one node and
//! the endpoint pool decides which client to use.

use alloy::primitives::{Address, TxHash};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::types::{BlockchainError, BlockchainResult, ChainId, InclusionReceipt};

/// The calls the payment core needs from a chain node.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Latest block height. Doubles as the liveness probe.
    async fn block_number(&self) -> BlockchainResult<u64>;

    /// Chain ID the node serves.
    async fn chain_id(&self) -> BlockchainResult<ChainId>;

    /// Transaction count of `address` at the `pending` tag.
    async fn pending_nonce(&self, address: Address) -> BlockchainResult<u64>;

    /// Node-recommended legacy gas price in wei.
    async fn gas_price(&self) -> BlockchainResult<u128>;

    /// Gas the call would consume. Fails when the call would revert.
    async fn estimate_gas(&self, request: &TransactionRequest) -> BlockchainResult<u64>;

    /// Broadcast an EIP-2718 encoded signed transaction.
    async fn send_raw_transaction(&self, raw: &[u8]) -> BlockchainResult<TxHash>;

    /// Receipt for `tx_hash`, or `None` while still pending.
    async fn transaction_receipt(&self, tx_hash: TxHash)
        -> BlockchainResult<Option<InclusionReceipt>>;
}

/// [`ChainRpc`] over an alloy HTTP provider.
#[derive(Clone)]
pub struct AlloyRpc {
    provider: Arc<dyn Provider + Send + Sync>,
    url: String,
    timeout_duration: Duration,
}

impl AlloyRpc {
    /// Create a client for a single endpoint URL.
    ///
    /// No request is made here; an unreachable node only shows up on the
    /// first probe.
    pub fn connect(url: &str, rpc_timeout: Duration) -> BlockchainResult<Self> {
        let parsed: url::Url = url.parse().map_err(|e: url::ParseError| {
            BlockchainError::InvalidEndpoint {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;
        let provider = Arc::new(ProviderBuilder::new().connect_http(parsed))
            as Arc<dyn Provider + Send + Sync>;

        Ok(Self {
            provider,
            url: url.to_string(),
            timeout_duration: rpc_timeout,
        })
    }

    /// Endpoint URL this client talks to.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<F, T, E>(&self, method: &'static str, fut: F) -> BlockchainResult<T>
    where
        F: IntoFuture<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        match timeout(self.timeout_duration, fut).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                tracing::debug!(endpoint = %self.url, method, error = %e, "RPC error");
                Err(BlockchainError::Rpc(e.to_string()))
            }
            Err(_) => {
                tracing::debug!(endpoint = %self.url, method, "RPC timeout");
                Err(BlockchainError::Timeout(self.timeout_duration.as_secs()))
            }
        }
    }
}

#[async_trait]
impl ChainRpc for AlloyRpc {
    async fn block_number(&self) -> BlockchainResult<u64> {
        self.call("eth_blockNumber", self.provider.get_block_number()).await
    }

    async fn chain_id(&self) -> BlockchainResult<ChainId> {
        self.call("eth_chainId", self.provider.get_chain_id())
            .await
            .map(ChainId)
    }

    async fn pending_nonce(&self, address: Address) -> BlockchainResult<u64> {
        self.call(
            "eth_getTransactionCount",
            self.provider.get_transaction_count(address).pending(),
        )
        .await
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        self.call("eth_gasPrice", self.provider.get_gas_price()).await
    }

    async fn estimate_gas(&self, request: &TransactionRequest) -> BlockchainResult<u64> {
        self.call("eth_estimateGas", self.provider.estimate_gas(request.clone()))
            .await
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> BlockchainResult<TxHash> {
        let pending = self
            .call("eth_sendRawTransaction", self.provider.send_raw_transaction(raw))
            .await?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> BlockchainResult<Option<InclusionReceipt>> {
        let receipt = self
            .call(
                "eth_getTransactionReceipt",
                self.provider.get_transaction_receipt(tx_hash),
            )
            .await?;

        // A receipt without a block number is not yet mined.
        Ok(receipt.and_then(|r| {
            r.block_number.map(|block_number| InclusionReceipt {
                block_number,
                gas_used: r.gas_used,
                success: r.status(),
            })
        }))
    }
}

impl std::fmt::Debug for AlloyRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlloyRpc")
            .field("url", &self.url)
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_rejected() {
        let err = AlloyRpc::connect("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, BlockchainError::InvalidEndpoint { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_errors() {
        // Port 9 (discard) is closed on any sane test host.
        let client = AlloyRpc::connect("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        assert_eq!(client.url(), "http://127.0.0.1:9");
        assert!(client.block_number().await.is_err());
    }
}
