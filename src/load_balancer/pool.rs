//! Endpoint pool management.
//!
//! # Responsibilities
//! - Hold the ordered endpoints and the shared cursor
//! - Select a live endpoint by probing round-robin from the cursor
//! - Advance the cursor without probing after endpoint-specific failures

use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::client::{AlloyRpc, ChainRpc};
use crate::blockchain::types::{BlockchainConfig, BlockchainError, BlockchainResult};
use crate::load_balancer::endpoint::Endpoint;
use crate::load_balancer::round_robin::RoundRobinCursor;

/// Returned when no endpoint answered the liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("All RPC endpoints unavailable ({probed} probed)")]
pub struct AllEndpointsUnavailable {
    /// How many endpoints were tried.
    pub probed: usize,
}

/// Ordered set of RPC endpoints with failover selection.
#[derive(Debug)]
pub struct EndpointPool {
    endpoints: Vec<Arc<Endpoint>>,
    cursor: RoundRobinCursor,
}

impl EndpointPool {
    /// Create a pool over already-built clients, in the given order.
    pub fn new(clients: Vec<(String, Arc<dyn ChainRpc>)>) -> BlockchainResult<Self> {
        if clients.is_empty() {
            return Err(BlockchainError::EmptyPool);
        }

        let endpoints: Vec<_> = clients
            .into_iter()
            .enumerate()
            .map(|(i, (url, rpc))| Arc::new(Endpoint::new(i, url, rpc)))
            .collect();
        let cursor = RoundRobinCursor::new(endpoints.len());

        Ok(Self { endpoints, cursor })
    }

    /// Build HTTP clients for every configured URL.
    ///
    /// Unlike failover lists that skip bad entries, an unparseable URL is an
    /// error here: the configured order is part of the contract.
    pub fn connect(config: &BlockchainConfig) -> BlockchainResult<Self> {
        let timeout = Duration::from_secs(config.rpc_timeout_secs);
        let mut clients = Vec::with_capacity(config.rpc_urls.len());
        for url in &config.rpc_urls {
            let rpc = AlloyRpc::connect(url, timeout)?;
            clients.push((url.clone(), Arc::new(rpc) as Arc<dyn ChainRpc>));
        }

        let pool = Self::new(clients)?;
        tracing::info!(endpoints = pool.len(), "Endpoint pool initialized");
        Ok(pool)
    }

    /// Number of endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always false; construction rejects empty pools.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// All endpoints in configured order.
    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    /// Endpoint under the cursor, without probing.
    pub fn current(&self) -> Arc<Endpoint> {
        self.endpoints[self.cursor.get()].clone()
    }

    /// Probe endpoints round-robin from the cursor until one answers.
    pub async fn select_live_endpoint(&self) -> Result<Arc<Endpoint>, AllEndpointsUnavailable> {
        self.select_live_endpoint_from(self.cursor.get()).await
    }

    /// Probe endpoints round-robin starting at `start` until one answers.
    ///
    /// The cursor moves to the endpoint that answered, unless a concurrent
    /// payment moved it in the meantime.
    pub async fn select_live_endpoint_from(
        &self,
        start: usize,
    ) -> Result<Arc<Endpoint>, AllEndpointsUnavailable> {
        let seen = self.cursor.get();

        for index in self.cursor.sequence_from(start % self.len()) {
            let endpoint = &self.endpoints[index];
            if endpoint.probe().await.is_some() {
                if index != seen && !self.cursor.settle(seen, index) {
                    tracing::debug!(
                        endpoint = %endpoint.url(),
                        "Cursor moved concurrently, keeping the newer position"
                    );
                }
                tracing::debug!(endpoint = %endpoint.url(), index, "Selected live endpoint");
                return Ok(endpoint.clone());
            }
        }

        tracing::error!(probed = self.len(), "No RPC endpoint answered the liveness probe");
        Err(AllEndpointsUnavailable { probed: self.len() })
    }

    /// Move the cursor past `failed` without probing and return the
    /// endpoint after it.
    ///
    /// The result depends only on `failed`, so concurrent rotations away
    /// from the same endpoint all land on the next one.
    pub fn advance_cursor(&self, failed: &Endpoint) -> Arc<Endpoint> {
        let index = self.cursor.advance_from(failed.index());
        let endpoint = self.endpoints[index].clone();
        tracing::info!(
            from = %failed.url(),
            endpoint = %endpoint.url(),
            index,
            "Advanced endpoint cursor"
        );
        endpoint
    }

    /// Check that every endpoint serves `expected`. Unreachable endpoints are
    /// skipped; a mismatch is returned as an error.
    pub async fn verify_chain_id(&self, expected: u64) -> BlockchainResult<()> {
        for endpoint in &self.endpoints {
            match endpoint.rpc().chain_id().await {
                Ok(actual) if actual.0 == expected => {}
                Ok(actual) => {
                    return Err(BlockchainError::ChainMismatch {
                        expected,
                        actual: actual.0,
                    })
                }
                Err(e) => {
                    tracing::warn!(
                        endpoint = %endpoint.url(),
                        error = %e,
                        "Could not verify chain ID"
                    );
                }
            }
        }
        Ok(())
    }
}
