//! Concurrent batch dispatch.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use futures_util::future::join_all;
use tokio::sync::Semaphore;

use crate::observability::metrics;
use crate::payments::processor::PaymentProcessor;
use crate::payments::types::{
    PaymentError, PaymentFailure, PaymentOutcome, PaymentRequest, Priority,
};

/// Entry point for single and batch payments.
///
/// Every batch item runs in its own task. A failing or panicking item only
/// affects its own slot in the result.
#[derive(Debug, Clone)]
pub struct PaymentDispatcher {
    processor: Arc<PaymentProcessor>,
    limit: Arc<Semaphore>,
}

impl PaymentDispatcher {
    /// Dispatcher running at most `concurrency` payments of a batch at once.
    pub fn new(processor: PaymentProcessor, concurrency: usize) -> Self {
        Self {
            processor: Arc::new(processor),
            limit: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub fn processor(&self) -> &PaymentProcessor {
        &self.processor
    }

    /// Execute one payment. A `token` selects a token transfer.
    pub async fn execute_payment(
        &self,
        from: Address,
        to: Address,
        amount: U256,
        token: Option<Address>,
    ) -> PaymentOutcome {
        let request = PaymentRequest {
            from,
            to,
            amount,
            token,
            priority: Priority::default(),
        };
        self.processor.execute(&request).await
    }

    /// Execute a prepared request.
    pub async fn execute(&self, request: &PaymentRequest) -> PaymentOutcome {
        self.processor.execute(request).await
    }

    /// Execute all `requests` concurrently.
    ///
    /// Returns exactly one outcome per request, in input order.
    pub async fn execute_batch(&self, requests: Vec<PaymentRequest>) -> Vec<PaymentOutcome> {
        metrics::record_batch(requests.len());
        tracing::info!(size = requests.len(), "Dispatching payment batch");

        let handles: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let processor = self.processor.clone();
                let limit = self.limit.clone();
                tokio::spawn(async move {
                    // The semaphore is never closed.
                    let _permit = limit.acquire_owned().await.ok();
                    processor.execute(&request).await
                })
            })
            .collect();

        let outcomes: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .enumerate()
            .map(|(index, joined)| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(index, error = %e, "Batch item task failed");
                    let err = PaymentError::SubmissionFailed(format!("payment task failed: {e}"));
                    PaymentOutcome::Failure(PaymentFailure::from_error(&err, 0, None))
                }
            })
            .collect();

        let successful = outcomes.iter().filter(|o| o.is_success()).count();
        tracing::info!(
            size = outcomes.len(),
            successful,
            failed = outcomes.len() - successful,
            "Payment batch finished"
        );
        outcomes
    }
}
