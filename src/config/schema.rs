//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the payment router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the payment router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// HTTP API settings.
    pub server: ServerConfig,

    /// RPC endpoints, chain and transaction settings.
    pub blockchain: BlockchainConfig,

    /// Retry and rotation policy for payment submission.
    pub retries: RetryConfig,

    /// In-memory transaction history.
    pub history: HistoryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Total time allowed for a single API request, in seconds.
    /// Batches wait for every inclusion, so this is generous.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            request_timeout_secs: 600,
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Blockchain integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// Ordered JSON-RPC endpoint URLs. The first one is the primary.
    pub rpc_urls: Vec<String>,

    /// Chain ID used for EIP-155 signing (e.g., 1 for mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// Timeout for a single RPC call in seconds.
    pub rpc_timeout_secs: u64,

    /// Number of block confirmations required before a payment counts as included.
    pub confirmation_blocks: u32,

    /// Receipt polling interval while waiting for inclusion, in milliseconds.
    pub receipt_poll_interval_ms: u64,

    /// Budget for the inclusion wait of one attempt, in seconds.
    pub inclusion_timeout_secs: u64,

    /// Gas price multiplier (1.0 = as reported, 1.2 = 20% markup).
    pub gas_price_multiplier: f64,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            rpc_urls: vec!["http://localhost:8545".to_string()],
            chain_id: 1,
            rpc_timeout_secs: 10,
            confirmation_blocks: 1,
            receipt_poll_interval_ms: 1000,
            inclusion_timeout_secs: 180,
            gas_price_multiplier: 1.2,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of delay-retried attempts per payment.
    pub max_attempts: u32,

    /// Delay unit in milliseconds. Attempt `n` waits `n * base_delay_ms`.
    pub base_delay_ms: u64,

    /// Maximum endpoint rotations per payment after nonce conflicts.
    /// Defaults to the number of configured endpoints.
    pub max_rotations: Option<usize>,

    /// Maximum number of batch items in flight at once.
    pub batch_concurrency: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_rotations: None,
            batch_concurrency: 16,
        }
    }
}

/// Transaction history configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of records kept, newest first.
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
