//! Lock-free bus metrics. Grounded on `mofa_kernel::bus::metrics::BusMetrics`:
//! `AtomicU64` counters under relaxed ordering, since these are monotonic
//! counters with no causal dependency on other memory.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

const ORD: Ordering = Ordering::Relaxed;

#[derive(Debug, Default)]
pub struct BusMetrics {
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_publish(&self) {
        self.published.fetch_add(1, ORD);
    }

    #[inline]
    pub fn record_delivery(&self) {
        self.delivered.fetch_add(1, ORD);
    }

    #[inline]
    pub fn record_drop(&self) {
        self.dropped.fetch_add(1, ORD);
    }

    pub fn snapshot(&self) -> BusMetricsSnapshot {
        BusMetricsSnapshot {
            published: self.published.load(ORD),
            delivered: self.delivered.load(ORD),
            dropped: self.dropped.load(ORD),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMetricsSnapshot {
    pub published: u64,
    pub delivered: u64,
    pub dropped: u64,
}
