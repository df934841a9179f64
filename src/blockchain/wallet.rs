//! Signing identity.
//!
//! # Security
//! - Private keys are loaded ONLY from environment variables
//! - Keys are never logged or serialized
//! - One key per process; it is never rotated at runtime

use alloy::consensus::TxEnvelope;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::Address;
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "PAYMENT_ROUTER_PRIVATE_KEY";

/// The process-wide key that signs every outgoing payment.
#[derive(Clone)]
pub struct SigningIdentity {
    /// Address derived from the key.
    address: Address,
    /// Wallet wrapping the signer, used to seal transaction requests.
    wallet: EthereumWallet,
    /// Chain ID for EIP-155 replay protection.
    chain_id: u64,
}

impl SigningIdentity {
    /// Create an identity from a hex-encoded private key string.
    ///
    /// # Arguments
    /// * `private_key_hex` - Hex string (with or without 0x prefix)
    /// * `chain_id` - Chain ID for transaction signing
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> BlockchainResult<Self> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key format: {}", e)))?;
        let address = signer.address();

        tracing::info!(
            address = %address,
            chain_id = chain_id,
            "Signing identity initialized"
        );

        Ok(Self {
            address,
            wallet: EthereumWallet::from(signer),
            chain_id,
        })
    }

    /// Load the identity from environment variable.
    ///
    /// Reads `PAYMENT_ROUTER_PRIVATE_KEY` from environment.
    pub fn from_env(chain_id: u64) -> BlockchainResult<Self> {
        let private_key = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            BlockchainError::Wallet(format!(
                "Environment variable {} not set",
                PRIVATE_KEY_ENV_VAR
            ))
        })?;

        Self::from_private_key(&private_key, chain_id)
    }

    /// Get the signer's address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Get the chain ID this identity signs for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Sign a fully populated transaction request.
    ///
    /// The request must carry nonce, gas price and gas limit; the sender
    /// and chain ID are forced to this identity's.
    pub async fn sign(&self, request: TransactionRequest) -> BlockchainResult<TxEnvelope> {
        request
            .with_from(self.address)
            .with_chain_id(self.chain_id)
            .build(&self.wallet)
            .await
            .map_err(|e| BlockchainError::Signing(e.to_string()))
    }
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}
