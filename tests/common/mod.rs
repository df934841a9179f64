//! Shared utilities for integration testing.
//!
//! `MockRpc` is a scripted in-process chain node: liveness, send results,
//! estimate failures and receipt behaviour are set per test, and every call
//! is recorded. Receipt timing follows tokio's clock, so paused-time tests
//! control it.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::consensus::TxEnvelope;
use alloy::eips::Decodable2718;
use alloy::primitives::{Address, TxHash};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use tokio::sync::Barrier;
use tokio::time::Instant;

use payment_router::blockchain::types::{BlockchainError, BlockchainResult, ChainId, InclusionReceipt};
use payment_router::blockchain::{ChainRpc, SigningIdentity};
use payment_router::load_balancer::EndpointPool;
use payment_router::payments::{
    FeeResolver, InclusionPolicy, PaymentDispatcher, PaymentProcessor, RetryPolicy,
};

/// Anvil's first development key.
pub const TEST_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const CHAIN_ID: u64 = 31337;
pub const GAS_ESTIMATE: u64 = 21_000;
pub const GAS_USED: u64 = 21_000;
pub const BASE_GAS_PRICE: u128 = 100;

/// A transaction the node has accepted.
#[derive(Debug, Clone, Copy)]
struct Accepted {
    block: u64,
    at: Instant,
}

/// Sends that wait for each other before failing.
struct ConflictGate {
    barrier: Arc<Barrier>,
    remaining: usize,
    message: String,
}

/// Scripted chain node.
pub struct MockRpc {
    alive: AtomicBool,
    block: AtomicU64,
    nonce: AtomicU64,
    /// Errors returned by successive sends; an empty script accepts.
    send_script: Mutex<VecDeque<String>>,
    /// Every send fails with this message when set.
    send_always_fails: Mutex<Option<String>>,
    /// Estimation fails for calls to these addresses.
    reverting_targets: Mutex<HashSet<Address>>,
    mined: Mutex<HashMap<TxHash, Accepted>>,
    conflict_gate: Mutex<Option<ConflictGate>>,
    /// Accepted transactions never get a receipt.
    withhold_receipts: AtomicBool,
    /// Receipts appear this long after acceptance.
    inclusion_delay: Mutex<Duration>,
    /// Receipts report a failed execution.
    revert_receipts: AtomicBool,
    /// Each `block_number` call mines one empty block.
    advance_per_query: AtomicBool,
    pub estimates: Mutex<Vec<TransactionRequest>>,
    pub sent: Mutex<Vec<TxEnvelope>>,
    pub send_attempts: AtomicUsize,
    pub probes: AtomicUsize,
}

impl MockRpc {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            alive: AtomicBool::new(true),
            block: AtomicU64::new(100),
            nonce: AtomicU64::new(0),
            send_script: Mutex::new(VecDeque::new()),
            send_always_fails: Mutex::new(None),
            reverting_targets: Mutex::new(HashSet::new()),
            mined: Mutex::new(HashMap::new()),
            conflict_gate: Mutex::new(None),
            withhold_receipts: AtomicBool::new(false),
            inclusion_delay: Mutex::new(Duration::ZERO),
            revert_receipts: AtomicBool::new(false),
            advance_per_query: AtomicBool::new(false),
            estimates: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            send_attempts: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
        })
    }

    pub fn dead() -> Arc<Self> {
        let rpc = Self::new();
        rpc.set_alive(false);
        rpc
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Fail the next send with `message`.
    pub fn fail_next_send(&self, message: &str) {
        self.send_script.lock().unwrap().push_back(message.to_string());
    }

    /// Fail every send with `message`.
    pub fn fail_all_sends(&self, message: &str) {
        *self.send_always_fails.lock().unwrap() = Some(message.to_string());
    }

    /// The next `parties` sends wait until all of them have arrived, then
    /// each fails with `message`.
    pub fn fail_sends_together(&self, parties: usize, message: &str) {
        *self.conflict_gate.lock().unwrap() = Some(ConflictGate {
            barrier: Arc::new(Barrier::new(parties)),
            remaining: parties,
            message: message.to_string(),
        });
    }

    /// Accept transactions but never report a receipt.
    pub fn withhold_receipts(&self) {
        self.withhold_receipts.store(true, Ordering::SeqCst);
    }

    /// Report receipts only `delay` after a transaction was accepted.
    pub fn include_after(&self, delay: Duration) {
        *self.inclusion_delay.lock().unwrap() = delay;
    }

    /// Receipts report the transaction as reverted.
    pub fn revert_receipts(&self) {
        self.revert_receipts.store(true, Ordering::SeqCst);
    }

    /// Mine one block per `block_number` call.
    pub fn advance_block_per_query(&self) {
        self.advance_per_query.store(true, Ordering::SeqCst);
    }

    pub fn block(&self) -> u64 {
        self.block.load(Ordering::SeqCst)
    }

    /// Distinct nonces among accepted transactions.
    pub fn distinct_nonces(&self) -> HashSet<u64> {
        use alloy::consensus::Transaction;
        self.sent.lock().unwrap().iter().map(|tx| tx.nonce()).collect()
    }

    /// Make estimation revert for calls targeting `to`.
    pub fn revert_calls_to(&self, to: Address) {
        self.reverting_targets.lock().unwrap().insert(to);
    }

    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    pub fn accepted(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn check_alive(&self) -> BlockchainResult<()> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BlockchainError::Rpc("connection refused".into()))
        }
    }
}

#[async_trait]
impl ChainRpc for MockRpc {
    async fn block_number(&self) -> BlockchainResult<u64> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.check_alive()?;
        if self.advance_per_query.load(Ordering::SeqCst) {
            return Ok(self.block.fetch_add(1, Ordering::SeqCst) + 1);
        }
        Ok(self.block.load(Ordering::SeqCst))
    }

    async fn chain_id(&self) -> BlockchainResult<ChainId> {
        self.check_alive()?;
        Ok(ChainId(CHAIN_ID))
    }

    async fn pending_nonce(&self, _address: Address) -> BlockchainResult<u64> {
        self.check_alive()?;
        Ok(self.nonce.load(Ordering::SeqCst))
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        self.check_alive()?;
        Ok(BASE_GAS_PRICE)
    }

    async fn estimate_gas(&self, request: &TransactionRequest) -> BlockchainResult<u64> {
        self.check_alive()?;
        self.estimates.lock().unwrap().push(request.clone());

        let target = request.to.and_then(|kind| kind.to().copied());
        if let Some(to) = target {
            if self.reverting_targets.lock().unwrap().contains(&to) {
                return Err(BlockchainError::Rpc("execution reverted".into()));
            }
        }
        Ok(GAS_ESTIMATE)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> BlockchainResult<TxHash> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        self.check_alive()?;

        let gate = {
            let mut gate = self.conflict_gate.lock().unwrap();
            match gate.as_mut() {
                Some(g) if g.remaining > 0 => {
                    g.remaining -= 1;
                    Some((g.barrier.clone(), g.message.clone()))
                }
                _ => None,
            }
        };
        if let Some((barrier, message)) = gate {
            barrier.wait().await;
            return Err(BlockchainError::Rpc(message));
        }

        if let Some(message) = self.send_script.lock().unwrap().pop_front() {
            return Err(BlockchainError::Rpc(message));
        }
        if let Some(message) = self.send_always_fails.lock().unwrap().clone() {
            return Err(BlockchainError::Rpc(message));
        }

        let envelope = TxEnvelope::decode_2718(&mut &raw[..])
            .map_err(|e| BlockchainError::Rpc(format!("invalid raw transaction: {e}")))?;
        let hash = *envelope.tx_hash();
        if self.mined.lock().unwrap().contains_key(&hash) {
            return Err(BlockchainError::Rpc("already known".into()));
        }

        let block = self.block.fetch_add(1, Ordering::SeqCst) + 1;
        self.mined.lock().unwrap().insert(
            hash,
            Accepted {
                block,
                at: Instant::now(),
            },
        );
        self.sent.lock().unwrap().push(envelope);
        self.nonce.fetch_add(1, Ordering::SeqCst);
        Ok(hash)
    }

    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> BlockchainResult<Option<InclusionReceipt>> {
        self.check_alive()?;
        if self.withhold_receipts.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let Some(accepted) = self.mined.lock().unwrap().get(&tx_hash).copied() else {
            return Ok(None);
        };
        let delay = *self.inclusion_delay.lock().unwrap();
        if Instant::now() < accepted.at + delay {
            return Ok(None);
        }
        Ok(Some(InclusionReceipt {
            block_number: accepted.block,
            gas_used: GAS_USED,
            success: !self.revert_receipts.load(Ordering::SeqCst),
        }))
    }
}

pub fn identity() -> Arc<SigningIdentity> {
    Arc::new(SigningIdentity::from_private_key(TEST_PRIVATE_KEY, CHAIN_ID).unwrap())
}

/// Pool over the mocks, named `http://node-<i>`.
pub fn pool(nodes: &[Arc<MockRpc>]) -> Arc<EndpointPool> {
    let clients = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (format!("http://node-{i}"), node.clone() as Arc<dyn ChainRpc>))
        .collect();
    Arc::new(EndpointPool::new(clients).unwrap())
}

pub fn retry_policy(pool_size: usize) -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_secs(1),
        max_rotations: pool_size,
    }
}

pub fn inclusion_policy() -> InclusionPolicy {
    InclusionPolicy {
        confirmations: 1,
        poll_interval: Duration::from_millis(100),
        timeout: Duration::from_secs(30),
    }
}

pub fn processor(nodes: &[Arc<MockRpc>]) -> PaymentProcessor {
    processor_with(nodes, inclusion_policy())
}

pub fn processor_with(nodes: &[Arc<MockRpc>], inclusion: InclusionPolicy) -> PaymentProcessor {
    PaymentProcessor::new(
        pool(nodes),
        identity(),
        FeeResolver::default(),
        retry_policy(nodes.len()),
        inclusion,
    )
}

pub fn dispatcher(nodes: &[Arc<MockRpc>]) -> PaymentDispatcher {
    PaymentDispatcher::new(processor(nodes), 8)
}

pub fn sender() -> Address {
    identity().address()
}
