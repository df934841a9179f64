//! In-memory transaction history and failure accounting.
//!
//! Records live for the process lifetime only. The newest record is always
//! first and the ring never holds more than its capacity.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy::primitives::U256;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::payments::types::{PaymentOutcome, PaymentRequest};

/// Window used for the "recent" system metrics.
pub const RECENT_WINDOW: usize = 100;

/// Window used for the rolling totals in the detailed metrics.
pub const DAY_SECS: u64 = 24 * 60 * 60;

/// Endpoint label used when a failure happened before any endpoint was picked.
const UNKNOWN_ENDPOINT: &str = "unknown";

/// One executed payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: Uuid,
    pub request: PaymentRequest,
    pub outcome: PaymentOutcome,
    pub processing_ms: u64,
    /// Unix seconds at which the record was written.
    pub timestamp: u64,
}

/// Filter for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    Success,
    Failure,
}

impl StatusFilter {
    fn matches(&self, outcome: &PaymentOutcome) -> bool {
        match self {
            StatusFilter::Success => outcome.is_success(),
            StatusFilter::Failure => !outcome.is_success(),
        }
    }
}

/// One page of history, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub transactions: Vec<TransactionRecord>,
    /// Records matching the filter, before paging.
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub total_transactions: usize,
    /// Percentage of successes among the most recent records.
    pub recent_success_rate: f64,
    pub average_processing_ms: u64,
    pub total_failures: u64,
    /// Unix seconds of the latest failure.
    pub last_failure: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowTotals {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Sum of requested amounts in base units, as a decimal string.
    pub total_volume: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedMetrics {
    pub system: SystemMetrics,
    pub last24_hours: WindowTotals,
    pub endpoint_failures: BTreeMap<String, u64>,
}

/// Bounded history of executed payments.
#[derive(Debug)]
pub struct TransactionHistory {
    records: RwLock<VecDeque<TransactionRecord>>,
    capacity: usize,
    total_failures: AtomicU64,
    last_failure: AtomicU64,
    endpoint_failures: DashMap<String, u64>,
}

impl TransactionHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
            total_failures: AtomicU64::new(0),
            last_failure: AtomicU64::new(0),
            endpoint_failures: DashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record an outcome stamped with the current time. Returns the record ID.
    pub async fn record(
        &self,
        request: PaymentRequest,
        outcome: PaymentOutcome,
        processing: Duration,
    ) -> Uuid {
        self.record_at(request, outcome, processing, unix_now()).await
    }

    /// Record an outcome with an explicit timestamp.
    pub async fn record_at(
        &self,
        request: PaymentRequest,
        outcome: PaymentOutcome,
        processing: Duration,
        timestamp: u64,
    ) -> Uuid {
        if let Some(failure) = outcome.failure() {
            self.total_failures.fetch_add(1, Ordering::Relaxed);
            self.last_failure.fetch_max(timestamp, Ordering::Relaxed);
            let endpoint = failure.endpoint.as_deref().unwrap_or(UNKNOWN_ENDPOINT);
            *self.endpoint_failures.entry(endpoint.to_string()).or_insert(0) += 1;
        }

        let id = Uuid::new_v4();
        let record = TransactionRecord {
            id,
            request,
            outcome,
            processing_ms: processing.as_millis() as u64,
            timestamp,
        };

        let mut records = self.records.write().await;
        records.push_front(record);
        records.truncate(self.capacity);
        id
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Newest-first page of records matching `status`.
    pub async fn page(
        &self,
        limit: usize,
        offset: usize,
        status: Option<StatusFilter>,
    ) -> HistoryPage {
        let records = self.records.read().await;
        let matching: Vec<&TransactionRecord> = records
            .iter()
            .filter(|r| status.is_none_or(|s| s.matches(&r.outcome)))
            .collect();

        HistoryPage {
            total: matching.len(),
            transactions: matching.into_iter().skip(offset).take(limit).cloned().collect(),
            limit,
            offset,
        }
    }

    pub async fn system_metrics(&self) -> SystemMetrics {
        let records = self.records.read().await;
        let recent: Vec<_> = records.iter().take(RECENT_WINDOW).collect();

        let (recent_success_rate, average_processing_ms) = if recent.is_empty() {
            (0.0, 0)
        } else {
            let successful = recent.iter().filter(|r| r.outcome.is_success()).count();
            let processing: u64 = recent.iter().map(|r| r.processing_ms).sum();
            (
                successful as f64 / recent.len() as f64 * 100.0,
                processing / recent.len() as u64,
            )
        };

        let last_failure = match self.last_failure.load(Ordering::Relaxed) {
            0 => None,
            ts => Some(ts),
        };

        SystemMetrics {
            total_transactions: records.len(),
            recent_success_rate,
            average_processing_ms,
            total_failures: self.total_failures.load(Ordering::Relaxed),
            last_failure,
        }
    }

    pub async fn detailed_metrics(&self) -> DetailedMetrics {
        self.detailed_metrics_at(unix_now()).await
    }

    /// Detailed metrics with the rolling window ending at `now`.
    pub async fn detailed_metrics_at(&self, now: u64) -> DetailedMetrics {
        let system = self.system_metrics().await;

        let since = now.saturating_sub(DAY_SECS);
        let records = self.records.read().await;
        let mut totals = (0usize, 0usize, U256::ZERO);
        for record in records.iter().filter(|r| r.timestamp > since) {
            if record.outcome.is_success() {
                totals.0 += 1;
            } else {
                totals.1 += 1;
            }
            totals.2 = totals.2.saturating_add(record.request.amount);
        }

        let endpoint_failures = self
            .endpoint_failures
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();

        DetailedMetrics {
            system,
            last24_hours: WindowTotals {
                total: totals.0 + totals.1,
                successful: totals.0,
                failed: totals.1,
                total_volume: totals.2.to_string(),
            },
            endpoint_failures,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
