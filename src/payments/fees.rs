//! Nonce and fee resolution against a selected endpoint.

use alloy::primitives::Address;

use crate::blockchain::client::ChainRpc;
use crate::blockchain::types::BlockchainResult;

/// Nonce and gas price to sign with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    /// Sender's next pending nonce.
    pub nonce: u64,
    /// Endpoint baseline gas price with the markup applied, in wei.
    pub gas_price: u128,
}

/// Queries nonce and gas price and applies the configured markup.
///
/// Failures propagate unchanged; retrying is the caller's job.
#[derive(Debug, Clone, Copy)]
pub struct FeeResolver {
    multiplier_percent: u128,
}

impl FeeResolver {
    /// Resolver for a float multiplier such as `1.2`.
    ///
    /// The multiplier is fixed to whole percent up front so the markup
    /// itself is exact integer arithmetic.
    pub fn new(multiplier: f64) -> Self {
        let percent = (multiplier * 100.0).round();
        let multiplier_percent = if percent.is_finite() && percent > 0.0 {
            percent as u128
        } else {
            100
        };
        Self { multiplier_percent }
    }

    /// Markup in whole percent (120 for 1.2).
    pub fn multiplier_percent(&self) -> u128 {
        self.multiplier_percent
    }

    /// Scale `baseline` by the markup, truncating toward zero.
    pub fn apply_multiplier(&self, baseline: u128) -> u128 {
        baseline.saturating_mul(self.multiplier_percent) / 100
    }

    /// Pending nonce of `sender` and marked-up gas price from `rpc`.
    pub async fn resolve(&self, rpc: &dyn ChainRpc, sender: Address) -> BlockchainResult<FeeQuote> {
        let nonce = rpc.pending_nonce(sender).await?;
        let baseline = rpc.gas_price().await?;
        let gas_price = self.apply_multiplier(baseline);

        tracing::debug!(
            sender = %sender,
            nonce,
            baseline,
            gas_price,
            "Resolved nonce and fee"
        );

        Ok(FeeQuote { nonce, gas_price })
    }
}

impl Default for FeeResolver {
    fn default() -> Self {
        Self::new(1.2)
    }
}
