//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (private key)
//!     → wallet.rs (signing identity)
//! Config (RPC URLs, timeouts)
//!     → client.rs (one RPC client per endpoint, every call time-bounded)
//! Transfer + nonce + fee
//!     → transaction.rs (estimate, add headroom, sign, await inclusion)
//!     → erc20.rs (calldata for token transfers)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod erc20;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::{AlloyRpc, ChainRpc};
pub use transaction::{SignedPayment, Transfer, TxBuilder};
pub use types::{BlockchainConfig, BlockchainError, BlockchainResult, ChainId, InclusionReceipt};
pub use wallet::SigningIdentity;
