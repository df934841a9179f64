//! Endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single RPC endpoint and its position in the pool
//! - Probe liveness on demand (no cached health state)
//! - Count probe and submission outcomes for status reporting

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::blockchain::client::ChainRpc;
use crate::observability::metrics;

/// A single RPC endpoint.
pub struct Endpoint {
    /// Position in the configured order.
    index: usize,
    /// URL the endpoint was configured with.
    url: String,
    /// Client used for every call routed to this endpoint.
    rpc: Arc<dyn ChainRpc>,
    /// Failed liveness probes since startup.
    probe_failures: AtomicU64,
}

impl Endpoint {
    /// Create a new endpoint.
    pub fn new(index: usize, url: impl Into<String>, rpc: Arc<dyn ChainRpc>) -> Self {
        Self {
            index,
            url: url.into(),
            rpc,
            probe_failures: AtomicU64::new(0),
        }
    }

    /// Position in the pool.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Configured URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// RPC client for this endpoint.
    pub fn rpc(&self) -> &dyn ChainRpc {
        self.rpc.as_ref()
    }

    /// Failed probes observed so far.
    pub fn probe_failures(&self) -> u64 {
        self.probe_failures.load(Ordering::Relaxed)
    }

    /// Ask the node for its latest block. Returns the height if it answered.
    pub async fn probe(&self) -> Option<u64> {
        match self.rpc.block_number().await {
            Ok(height) => {
                tracing::trace!(endpoint = %self.url, height, "Endpoint live");
                Some(height)
            }
            Err(e) => {
                self.probe_failures.fetch_add(1, Ordering::Relaxed);
                metrics::record_probe_failure(&self.url);
                tracing::warn!(endpoint = %self.url, error = %e, "Endpoint probe failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("index", &self.index)
            .field("url", &self.url)
            .field("probe_failures", &self.probe_failures())
            .finish()
    }
}
