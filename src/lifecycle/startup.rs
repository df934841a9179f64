//! Startup orchestration.
//!
//! Subsystems initialize in dependency order: endpoint pool, chain check,
//! payment core, HTTP state. Any error here is fatal.

use std::sync::Arc;

use crate::blockchain::{BlockchainError, SigningIdentity};
use crate::config::RouterConfig;
use crate::http::AppState;
use crate::load_balancer::EndpointPool;
use crate::payments::{PaymentDispatcher, PaymentProcessor, TransactionHistory};

/// Build the HTTP state from config, connecting to the configured endpoints.
pub async fn build_state(
    config: &RouterConfig,
    identity: SigningIdentity,
) -> Result<AppState, BlockchainError> {
    let pool = EndpointPool::connect(&config.blockchain)?;
    pool.verify_chain_id(config.blockchain.chain_id).await?;
    Ok(assemble(config, Arc::new(pool), Arc::new(identity)))
}

/// Wire an existing pool and identity into the payment core and HTTP state.
pub fn assemble(
    config: &RouterConfig,
    pool: Arc<EndpointPool>,
    identity: Arc<SigningIdentity>,
) -> AppState {
    tracing::info!(
        signer = %identity.address(),
        chain_id = identity.chain_id(),
        endpoints = pool.len(),
        max_attempts = config.retries.max_attempts,
        "Payment core initialized"
    );

    let processor =
        PaymentProcessor::from_config(pool, identity, &config.blockchain, &config.retries);
    let dispatcher = PaymentDispatcher::new(processor, config.retries.batch_concurrency);
    let history = Arc::new(TransactionHistory::new(config.history.capacity));

    AppState::new(dispatcher, history)
}
