//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, multiplier >= 1)
//! - Check endpoint URLs and bind addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::RouterConfig;

/// A single semantic violation in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let chain = &config.blockchain;
    if chain.rpc_urls.is_empty() {
        errors.push(ValidationError::new(
            "blockchain.rpc_urls",
            "at least one RPC endpoint is required",
        ));
    }
    for (i, raw) in chain.rpc_urls.iter().enumerate() {
        match url::Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::new(
                format!("blockchain.rpc_urls[{}]", i),
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(
                format!("blockchain.rpc_urls[{}]", i),
                format!("invalid URL '{}': {}", raw, e),
            )),
        }
    }
    if !chain.gas_price_multiplier.is_finite() || chain.gas_price_multiplier < 1.0 {
        errors.push(ValidationError::new(
            "blockchain.gas_price_multiplier",
            "must be a finite number >= 1.0",
        ));
    }
    if chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("blockchain.rpc_timeout_secs", "must be > 0"));
    }
    if chain.inclusion_timeout_secs == 0 {
        errors.push(ValidationError::new("blockchain.inclusion_timeout_secs", "must be > 0"));
    }
    if chain.confirmation_blocks == 0 {
        errors.push(ValidationError::new("blockchain.confirmation_blocks", "must be >= 1"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be >= 1"));
    }
    if config.retries.batch_concurrency == 0 {
        errors.push(ValidationError::new("retries.batch_concurrency", "must be >= 1"));
    }

    if config.history.capacity == 0 {
        errors.push(ValidationError::new("history.capacity", "must be >= 1"));
    }

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
