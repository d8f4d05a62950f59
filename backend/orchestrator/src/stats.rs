use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide pipeline counters. Updated with atomic increments only.
#[derive(Debug, Default)]
pub struct PipelineStats {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    cancellations: AtomicU64,
    total_latency_ms: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub cancellations: u64,
    pub in_flight: u64,
    pub total_latency_ms: u64,
    pub average_latency_ms: f64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_started(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, latency_ms: u64) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    pub fn record_failure(&self, latency_ms: u64) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let requests = self.requests.load(Ordering::Relaxed);
        let successes = self.successes.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let cancellations = self.cancellations.load(Ordering::Relaxed);
        let total_latency_ms = self.total_latency_ms.load(Ordering::Relaxed);
        let finished = successes + failures;
        StatsSnapshot {
            requests,
            successes,
            failures,
            cancellations,
            in_flight: requests.saturating_sub(finished + cancellations),
            total_latency_ms,
            average_latency_ms: if finished == 0 { 0.0 } else { total_latency_ms as f64 / finished as f64 },
        }
    }
}
