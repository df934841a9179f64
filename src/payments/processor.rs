//! Submission retry loop: one request in, one terminal outcome out.
//!
//! ```text
//! SELECTING → RESOLVING → BUILDING → SUBMITTING
//!     → SUCCESS
//!     → ROTATE_AND_RETRY (nonce conflict, rotation budget left)
//!     → DELAY_AND_RETRY  (any other failure, attempt budget left)
//!     → FAILED
//! ```
//!
//! Once a transaction has been accepted for broadcast its nonce is spent for
//! this payment. If inclusion is not observed, later attempts rebroadcast and
//! keep waiting on that same signed transaction; they never sign a second
//! transfer under a fresh nonce. Only an on-chain revert releases it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::Instrument;

use crate::blockchain::transaction::{wait_for_inclusion, SignedPayment, Transfer, TxBuilder};
use crate::blockchain::types::BlockchainError;
use crate::blockchain::wallet::SigningIdentity;
use crate::config::{BlockchainConfig, RetryConfig};
use crate::load_balancer::{Endpoint, EndpointPool};
use crate::observability::metrics;
use crate::payments::fees::FeeResolver;
use crate::payments::types::{
    ErrorKind, PaymentError, PaymentFailure, PaymentOutcome, PaymentReceipt, PaymentRequest,
};
use crate::resilience::backoff::linear_delay;

/// Bounds on how long one payment may keep trying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed attempts allowed before giving up. Nonce-conflict rotations
    /// within `max_rotations` do not count.
    pub max_attempts: u32,
    /// Attempt `n` is followed by a wait of `n * base_delay`.
    pub base_delay: Duration,
    /// Endpoint rotations allowed per payment.
    pub max_rotations: usize,
}

impl RetryPolicy {
    /// Policy from config; `max_rotations` falls back to the pool size.
    pub fn from_config(config: &RetryConfig, pool_size: usize) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_rotations: config.max_rotations.unwrap_or(pool_size),
        }
    }
}

/// How inclusion is awaited after a successful broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InclusionPolicy {
    pub confirmations: u32,
    pub poll_interval: Duration,
    /// Per-attempt budget for the whole wait.
    pub timeout: Duration,
}

impl InclusionPolicy {
    pub fn from_config(config: &BlockchainConfig) -> Self {
        Self {
            confirmations: config.confirmation_blocks,
            poll_interval: Duration::from_millis(config.receipt_poll_interval_ms),
            timeout: Duration::from_secs(config.inclusion_timeout_secs),
        }
    }
}

/// Executes single payments against the shared endpoint pool.
#[derive(Debug, Clone)]
pub struct PaymentProcessor {
    pool: Arc<EndpointPool>,
    builder: TxBuilder,
    fees: FeeResolver,
    retry: RetryPolicy,
    inclusion: InclusionPolicy,
}

impl PaymentProcessor {
    /// Create a processor with explicit policies.
    pub fn new(
        pool: Arc<EndpointPool>,
        identity: Arc<SigningIdentity>,
        fees: FeeResolver,
        retry: RetryPolicy,
        inclusion: InclusionPolicy,
    ) -> Self {
        Self {
            pool,
            builder: TxBuilder::new(identity),
            fees,
            retry,
            inclusion,
        }
    }

    /// Create a processor from the blockchain and retry config sections.
    pub fn from_config(
        pool: Arc<EndpointPool>,
        identity: Arc<SigningIdentity>,
        blockchain: &BlockchainConfig,
        retries: &RetryConfig,
    ) -> Self {
        let retry = RetryPolicy::from_config(retries, pool.len());
        Self::new(
            pool,
            identity,
            FeeResolver::new(blockchain.gas_price_multiplier),
            retry,
            InclusionPolicy::from_config(blockchain),
        )
    }

    /// The endpoint pool payments are routed through.
    pub fn pool(&self) -> &Arc<EndpointPool> {
        &self.pool
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Drive `request` to a terminal outcome. Never panics on RPC failure
    /// and never returns early without an outcome.
    pub async fn execute(&self, request: &PaymentRequest) -> PaymentOutcome {
        let started = Instant::now();
        let transfer = request.transfer();
        let span = tracing::info_span!(
            "payment",
            kind = transfer.label(),
            from = %request.from,
            to = %request.to,
            amount = %request.amount,
            priority = ?request.priority,
        );

        let outcome = self.run(request, &transfer).instrument(span).await;

        let kind = match &outcome {
            PaymentOutcome::Success(_) => "none",
            PaymentOutcome::Failure(f) => f.kind.as_str(),
        };
        metrics::record_payment(outcome.status_label(), kind, started);
        outcome
    }

    async fn run(&self, request: &PaymentRequest, transfer: &Transfer) -> PaymentOutcome {
        if request.from != self.builder.address() {
            tracing::warn!(
                signer = %self.builder.address(),
                "Request sender differs from the signing key; signing as the key holder"
            );
        }

        let mut endpoint = match self.pool.select_live_endpoint().await {
            Ok(endpoint) => endpoint,
            Err(e) => return failed(PaymentError::from(e), 0, None),
        };
        let mut attempts: u32 = 0;
        let mut rotations: usize = 0;
        let mut in_flight: Option<SignedPayment> = None;

        loop {
            tracing::debug!(endpoint = %endpoint.url(), attempt = attempts + 1, "Attempting payment");

            let err = match self.attempt(&endpoint, transfer, &mut in_flight).await {
                Ok(receipt) => {
                    tracing::info!(
                        endpoint = %endpoint.url(),
                        tx_hash = %receipt.tx_hash,
                        block_number = receipt.block_number,
                        gas_used = receipt.gas_used,
                        "Payment included"
                    );
                    return PaymentOutcome::Success(receipt);
                }
                Err(err) => err,
            };

            if err.kind() == ErrorKind::NonceConflict && rotations < self.retry.max_rotations {
                rotations += 1;
                metrics::record_rotation();
                tracing::warn!(
                    endpoint = %endpoint.url(),
                    rotation = rotations,
                    error = %err,
                    "Nonce conflict, rotating endpoint"
                );

                let next = self.pool.advance_cursor(&endpoint);
                endpoint = match self.pool.select_live_endpoint_from(next.index()).await {
                    Ok(next) => next,
                    Err(e) => {
                        return failed(PaymentError::from(e), attempts, Some(endpoint.url()))
                    }
                };
                continue;
            }

            attempts += 1;
            if attempts >= self.retry.max_attempts {
                let exhausted = PaymentError::RetriesExhausted {
                    attempts,
                    last: Box::new(err),
                };
                return failed(exhausted, attempts, Some(endpoint.url()));
            }

            let delay = linear_delay(attempts, self.retry.base_delay);
            metrics::record_delay_retry(err.kind().as_str());
            tracing::warn!(
                endpoint = %endpoint.url(),
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Payment attempt failed, retrying after delay"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Resolve, build, submit and await inclusion on one endpoint.
    ///
    /// With a transaction already `in_flight`, rebroadcast it and wait again
    /// instead of signing a new one.
    async fn attempt(
        &self,
        endpoint: &Endpoint,
        transfer: &Transfer,
        in_flight: &mut Option<SignedPayment>,
    ) -> Result<PaymentReceipt, PaymentError> {
        let rpc = endpoint.rpc();

        let signed = match in_flight.clone() {
            Some(signed) => {
                self.rebroadcast(endpoint, &signed).await;
                signed
            }
            None => {
                let signed = self.sign_fresh(endpoint, transfer).await?;
                self.broadcast(endpoint, &signed, in_flight).await?;
                signed
            }
        };

        let receipt = match wait_for_inclusion(
            rpc,
            signed.hash,
            self.inclusion.confirmations,
            self.inclusion.poll_interval,
            self.inclusion.timeout,
        )
        .await
        {
            Ok(receipt) => receipt,
            Err(err) => {
                if matches!(err, BlockchainError::Reverted(_)) {
                    // Mined and reverted: the transfer did not happen, so the
                    // next attempt may sign again.
                    *in_flight = None;
                } else {
                    tracing::warn!(
                        endpoint = %endpoint.url(),
                        nonce = signed.nonce,
                        tx_hash = %signed.hash,
                        error = %err,
                        "Inclusion not observed, keeping transaction in flight"
                    );
                }
                return Err(PaymentError::classify(err));
            }
        };

        *in_flight = None;
        Ok(PaymentReceipt {
            tx_hash: signed.hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        })
    }

    async fn sign_fresh(
        &self,
        endpoint: &Endpoint,
        transfer: &Transfer,
    ) -> Result<SignedPayment, PaymentError> {
        let rpc = endpoint.rpc();

        let quote = self
            .fees
            .resolve(rpc, self.builder.address())
            .await
            .map_err(PaymentError::classify)?;

        self.builder
            .build(rpc, transfer, quote.nonce, quote.gas_price)
            .await
            .map_err(PaymentError::classify)
    }

    /// First broadcast of a freshly signed transaction.
    ///
    /// A request timeout leaves it unknown whether the node took the
    /// transaction, so it is treated as in flight from then on.
    async fn broadcast(
        &self,
        endpoint: &Endpoint,
        signed: &SignedPayment,
        in_flight: &mut Option<SignedPayment>,
    ) -> Result<(), PaymentError> {
        tracing::info!(
            endpoint = %endpoint.url(),
            nonce = signed.nonce,
            gas_price = signed.gas_price,
            gas_limit = signed.gas_limit,
            tx_hash = %signed.hash,
            "Submitting transaction"
        );

        match endpoint.rpc().send_raw_transaction(&signed.raw).await {
            Ok(returned) => {
                if returned != signed.hash {
                    tracing::warn!(
                        expected = %signed.hash,
                        returned = %returned,
                        "Endpoint returned an unexpected transaction hash"
                    );
                }
                *in_flight = Some(signed.clone());
                Ok(())
            }
            Err(err) => {
                if matches!(err, BlockchainError::Timeout(_)) {
                    *in_flight = Some(signed.clone());
                }
                Err(PaymentError::classify(err))
            }
        }
    }

    /// Resend an in-flight transaction. Rejections such as "already known"
    /// or "nonce too low" mean the node has seen it or mined it; either way
    /// the wait that follows decides.
    async fn rebroadcast(&self, endpoint: &Endpoint, signed: &SignedPayment) {
        tracing::info!(
            endpoint = %endpoint.url(),
            nonce = signed.nonce,
            tx_hash = %signed.hash,
            "Rebroadcasting in-flight transaction"
        );
        if let Err(err) = endpoint.rpc().send_raw_transaction(&signed.raw).await {
            tracing::debug!(
                endpoint = %endpoint.url(),
                tx_hash = %signed.hash,
                error = %err,
                "Rebroadcast rejected"
            );
        }
    }
}

fn failed(err: PaymentError, attempts: u32, endpoint: Option<&str>) -> PaymentOutcome {
    tracing::error!(kind = %err.kind(), attempts, error = %err, "Payment failed");
    PaymentOutcome::Failure(PaymentFailure::from_error(
        &err,
        attempts,
        endpoint.map(str::to_string),
    ))
}
