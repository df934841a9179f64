//! Transaction building, signing, and inclusion monitoring.
//!
//! # Responsibilities
//! - Turn a transfer into an unsigned call (native value or token `transfer`)
//! - Size the gas limit from an endpoint estimate plus headroom
//! - Sign with the process signing identity
//! - Wait for the broadcast transaction to be mined

use alloy::eips::Encodable2718;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::blockchain::client::ChainRpc;
use crate::blockchain::erc20;
use crate::blockchain::types::{BlockchainError, BlockchainResult, InclusionReceipt};
use crate::blockchain::wallet::SigningIdentity;

/// Gas limit headroom over the estimate, in percent.
pub const GAS_LIMIT_HEADROOM_PERCENT: u64 = 120;

/// Scale a gas estimate by the headroom factor, rounding up.
pub fn gas_limit_with_headroom(estimate: u64) -> u64 {
    estimate.saturating_mul(GAS_LIMIT_HEADROOM_PERCENT).div_ceil(100)
}

/// The value movement a payment performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    /// Plain value transfer to `to`.
    Native { to: Address, value: U256 },
    /// `transfer(to, amount)` on the token at `contract`.
    Token {
        contract: Address,
        to: Address,
        amount: U256,
    },
}

impl Transfer {
    /// Unsigned call from `from`, without nonce or fee fields.
    pub fn call_request(&self, from: Address) -> TransactionRequest {
        match self {
            Transfer::Native { to, value } => TransactionRequest::default()
                .with_from(from)
                .with_to(*to)
                .with_value(*value),
            Transfer::Token {
                contract,
                to,
                amount,
            } => TransactionRequest::default()
                .with_from(from)
                .with_to(*contract)
                .with_value(U256::ZERO)
                .with_input(erc20::transfer_calldata(*to, *amount)),
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Transfer::Native { .. } => "native",
            Transfer::Token { .. } => "token",
        }
    }
}

/// A signed transaction ready for broadcast.
#[derive(Debug, Clone)]
pub struct SignedPayment {
    pub hash: TxHash,
    /// EIP-2718 encoding for `eth_sendRawTransaction`.
    pub raw: Bytes,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
}

/// Builds and signs payment transactions.
#[derive(Debug, Clone)]
pub struct TxBuilder {
    identity: Arc<SigningIdentity>,
}

impl TxBuilder {
    /// Create a new transaction builder.
    pub fn new(identity: Arc<SigningIdentity>) -> Self {
        Self { identity }
    }

    /// Address transactions are signed from.
    pub fn address(&self) -> Address {
        self.identity.address()
    }

    /// Estimate gas on `rpc`, apply headroom, and sign.
    ///
    /// Estimation failures surface as [`BlockchainError::Estimation`]; no
    /// other endpoint is tried here.
    pub async fn build(
        &self,
        rpc: &dyn ChainRpc,
        transfer: &Transfer,
        nonce: u64,
        gas_price: u128,
    ) -> BlockchainResult<SignedPayment> {
        let call = transfer.call_request(self.identity.address());

        let estimate = rpc.estimate_gas(&call).await.map_err(|e| match e {
            BlockchainError::Rpc(msg) => BlockchainError::Estimation(msg),
            other => other,
        })?;
        let gas_limit = gas_limit_with_headroom(estimate);

        self.sign(call, nonce, gas_price, gas_limit).await
    }

    /// Sign a prepared call with explicit nonce, fee and gas limit.
    pub async fn sign(
        &self,
        call: TransactionRequest,
        nonce: u64,
        gas_price: u128,
        gas_limit: u64,
    ) -> BlockchainResult<SignedPayment> {
        let request = call
            .with_nonce(nonce)
            .with_gas_price(gas_price)
            .with_gas_limit(gas_limit);

        let envelope = self.identity.sign(request).await?;

        Ok(SignedPayment {
            hash: *envelope.tx_hash(),
            raw: envelope.encoded_2718().into(),
            nonce,
            gas_price,
            gas_limit,
        })
    }
}

/// Wait until `tx_hash` is mined with `confirmations` blocks on top.
///
/// # Arguments
/// * `poll_interval` - Delay between receipt queries
/// * `budget` - Maximum time to wait before giving up
pub async fn wait_for_inclusion(
    rpc: &dyn ChainRpc,
    tx_hash: TxHash,
    confirmations: u32,
    poll_interval: Duration,
    budget: Duration,
) -> BlockchainResult<InclusionReceipt> {
    let result = timeout(budget, async {
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let receipt = match rpc.transaction_receipt(tx_hash).await? {
                Some(r) => r,
                None => {
                    tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                    continue;
                }
            };

            if !receipt.success {
                return Err(BlockchainError::Reverted(tx_hash.to_string()));
            }

            if confirmations <= 1 {
                return Ok(receipt);
            }

            let current_block = rpc.block_number().await?;
            let depth = current_block.saturating_sub(receipt.block_number) + 1;
            if depth >= confirmations as u64 {
                return Ok(receipt);
            }

            tracing::debug!(
                tx_hash = %tx_hash,
                confirmations = depth,
                required = confirmations,
                "Waiting for confirmations"
            );
        }
    })
    .await;

    match result {
        Ok(status) => status,
        Err(_) => Err(BlockchainError::InclusionTimeout(budget.as_secs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::consensus::{Transaction, TxEnvelope};
    use alloy::eips::Decodable2718;

    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn builder() -> TxBuilder {
        let identity = SigningIdentity::from_private_key(TEST_PRIVATE_KEY, 31337).unwrap();
        TxBuilder::new(Arc::new(identity))
    }

    #[test]
    fn test_gas_limit_rounds_up() {
        assert_eq!(gas_limit_with_headroom(21_000), 25_200);
        // 7 * 1.2 = 8.4 → 9
        assert_eq!(gas_limit_with_headroom(7), 9);
        assert_eq!(gas_limit_with_headroom(10), 12);
        assert_eq!(gas_limit_with_headroom(0), 0);
        assert_eq!(gas_limit_with_headroom(u64::MAX), u64::MAX.div_ceil(100));
    }

    #[test]
    fn test_native_call_has_no_calldata() {
        let to = Address::repeat_byte(0x22);
        let call = Transfer::Native {
            to,
            value: U256::from(42u64),
        }
        .call_request(Address::ZERO);

        assert_eq!(call.to, Some(to.into()));
        assert_eq!(call.value, Some(U256::from(42u64)));
        assert!(call.input.input().is_none());
    }

    #[test]
    fn test_token_call_targets_contract() {
        let contract = Address::repeat_byte(0x33);
        let recipient = Address::repeat_byte(0x44);
        let call = Transfer::Token {
            contract,
            to: recipient,
            amount: U256::from(9u64),
        }
        .call_request(Address::ZERO);

        assert_eq!(call.to, Some(contract.into()));
        assert_eq!(call.value, Some(U256::ZERO));
        let data = call.input.input().unwrap();
        assert_eq!(data, &erc20::transfer_calldata(recipient, U256::from(9u64)));
    }

    #[tokio::test]
    async fn test_sign_produces_decodable_envelope() {
        let builder = builder();
        let call = Transfer::Native {
            to: Address::repeat_byte(0x55),
            value: U256::from(1u64),
        }
        .call_request(builder.address());

        let signed = builder.sign(call, 3, 120, 25_200).await.unwrap();
        let decoded = TxEnvelope::decode_2718(&mut signed.raw.as_ref()).unwrap();

        assert_eq!(*decoded.tx_hash(), signed.hash);
        assert_eq!(decoded.nonce(), 3);
        assert_eq!(decoded.gas_price(), Some(120));
        assert_eq!(decoded.gas_limit(), 25_200);
    }
}
