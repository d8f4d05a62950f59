//! Token-bucket quota gate shared by every advisor call.
//!
//! One bucket per dependency class, each behind its own mutex. The lock is
//! held only for the refill/take arithmetic; callers sleep outside it.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// External-dependency classes with independent budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaClass {
    /// Advisor calls made by the chart selector.
    Selection,
    /// Advisor calls made for label enhancement.
    Labels,
}

impl QuotaClass {
    pub fn as_str(self) -> &'static str {
        match self {
            QuotaClass::Selection => "selection",
            QuotaClass::Labels => "labels",
        }
    }
}

impl fmt::Display for QuotaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bucket sizing for one class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketConfig {
    /// Maximum tokens the bucket can hold.
    pub capacity: f64,
    /// Tokens added per second.
    pub refill_per_sec: f64,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            capacity: 60.0,
            refill_per_sec: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LimiterConfig {
    pub selection: BucketConfig,
    pub labels: BucketConfig,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LimiterError {
    #[error("bucket '{class}' must have a positive capacity, got {capacity}")]
    InvalidCapacity { class: QuotaClass, capacity: f64 },

    #[error("bucket '{class}' must have a finite, non-negative refill rate, got {rate}")]
    InvalidRefillRate { class: QuotaClass, rate: f64 },
}

/// How a caller wants exhaustion handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquirePolicy {
    /// Sleep until tokens accrue, giving up once `max_wait` would be exceeded.
    Block { max_wait: Duration },
    /// Never sleep; report how long the caller would have to wait.
    Hint,
}

/// Outcome of an acquire call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Granted,
    /// Not admitted. `Duration::MAX` means the cost can never be satisfied.
    Wait(Duration),
}

impl Admission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted)
    }
}

struct QuotaState {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl QuotaState {
    fn new(config: BucketConfig, now: Instant) -> Self {
        Self {
            tokens: config.capacity,
            capacity: config.capacity,
            refill_per_sec: config.refill_per_sec,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    fn try_take(&mut self, cost: f64, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        if self.tokens >= cost {
            self.tokens -= cost;
            return Ok(());
        }
        if cost > self.capacity || self.refill_per_sec <= 0.0 {
            return Err(Duration::MAX);
        }
        let deficit_ms = (cost - self.tokens) / self.refill_per_sec * 1000.0;
        Err(Duration::from_millis((deficit_ms.ceil() as u64).max(1)))
    }
}

/// Shared rate limiter. Cheap to share behind an `Arc`.
pub struct RateLimiter {
    selection: Mutex<QuotaState>,
    labels: Mutex<QuotaState>,
}

impl RateLimiter {
    pub fn new(config: LimiterConfig) -> Result<Self, LimiterError> {
        validate(QuotaClass::Selection, &config.selection)?;
        validate(QuotaClass::Labels, &config.labels)?;
        let now = Instant::now();
        Ok(Self {
            selection: Mutex::new(QuotaState::new(config.selection, now)),
            labels: Mutex::new(QuotaState::new(config.labels, now)),
        })
    }

    fn bucket(&self, class: QuotaClass) -> &Mutex<QuotaState> {
        match class {
            QuotaClass::Selection => &self.selection,
            QuotaClass::Labels => &self.labels,
        }
    }

    /// Take `cost` tokens now or report the wait until they would be available.
    pub async fn try_acquire(&self, class: QuotaClass, cost: f64) -> Result<(), Duration> {
        let result = self.bucket(class).lock().await.try_take(cost, Instant::now());
        match &result {
            Ok(()) => debug!(class = %class, cost, "Quota granted"),
            Err(wait) => debug!(class = %class, cost, wait_ms = wait.as_millis() as u64, "Quota exhausted"),
        }
        result
    }

    /// Acquire according to `policy`. Never errors for ordinary exhaustion.
    pub async fn acquire(&self, class: QuotaClass, cost: f64, policy: AcquirePolicy) -> Admission {
        let max_wait = match policy {
            AcquirePolicy::Hint => {
                return match self.try_acquire(class, cost).await {
                    Ok(()) => Admission::Granted,
                    Err(wait) => Admission::Wait(wait),
                };
            }
            AcquirePolicy::Block { max_wait } => max_wait,
        };

        let deadline = Instant::now().checked_add(max_wait);
        loop {
            let wait = match self.try_acquire(class, cost).await {
                Ok(()) => return Admission::Granted,
                Err(wait) => wait,
            };
            let wake_at = Instant::now().checked_add(wait);
            let within_budget = match (wake_at, deadline) {
                (Some(wake), Some(deadline)) => wake <= deadline,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if !within_budget {
                warn!(class = %class, cost, wait_ms = wait.as_millis() as u64, "Quota wait exceeds budget");
                return Admission::Wait(wait);
            }
            tokio::time::sleep(wait).await;
        }
    }

    /// Return tokens for a call aborted before it consumed its budget.
    pub async fn release_unused(&self, class: QuotaClass, cost: f64) {
        let mut state = self.bucket(class).lock().await;
        state.refill(Instant::now());
        state.tokens = (state.tokens + cost.max(0.0)).min(state.capacity);
        debug!(class = %class, cost, tokens = state.tokens, "Quota released");
    }

    /// Tokens currently available in a bucket.
    pub async fn available(&self, class: QuotaClass) -> f64 {
        let mut state = self.bucket(class).lock().await;
        state.refill(Instant::now());
        state.tokens
    }
}

fn validate(class: QuotaClass, config: &BucketConfig) -> Result<(), LimiterError> {
    if !(config.capacity > 0.0) || !config.capacity.is_finite() {
        return Err(LimiterError::InvalidCapacity {
            class,
            capacity: config.capacity,
        });
    }
    if !(config.refill_per_sec >= 0.0) || !config.refill_per_sec.is_finite() {
        return Err(LimiterError::InvalidRefillRate {
            class,
            rate: config.refill_per_sec,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(capacity: f64, refill_per_sec: f64) -> RateLimiter {
        let bucket = BucketConfig { capacity, refill_per_sec };
        RateLimiter::new(LimiterConfig { selection: bucket, labels: bucket }).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn admits_at_most_capacity_without_elapsed_time() {
        let limiter = limiter(3.0, 1.0);
        for _ in 0..3 {
            assert!(limiter.acquire(QuotaClass::Selection, 1.0, AcquirePolicy::Hint).await.is_granted());
        }
        match limiter.acquire(QuotaClass::Selection, 1.0, AcquirePolicy::Hint).await {
            Admission::Wait(wait) => assert_eq!(wait, Duration::from_secs(1)),
            Admission::Granted => panic!("fourth acquisition should not be admitted"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn refills_over_time() {
        let limiter = limiter(2.0, 2.0);
        assert!(limiter.try_acquire(QuotaClass::Labels, 2.0).await.is_ok());
        assert!(limiter.try_acquire(QuotaClass::Labels, 1.0).await.is_err());
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.try_acquire(QuotaClass::Labels, 1.0).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn blocking_acquire_waits_for_tokens() {
        let limiter = limiter(1.0, 10.0);
        assert!(limiter.try_acquire(QuotaClass::Selection, 1.0).await.is_ok());
        let start = Instant::now();
        let admission = limiter
            .acquire(QuotaClass::Selection, 1.0, AcquirePolicy::Block { max_wait: Duration::from_secs(1) })
            .await;
        assert!(admission.is_granted());
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn blocking_acquire_gives_up_past_max_wait() {
        let limiter = limiter(1.0, 0.5);
        assert!(limiter.try_acquire(QuotaClass::Selection, 1.0).await.is_ok());
        let admission = limiter
            .acquire(QuotaClass::Selection, 1.0, AcquirePolicy::Block { max_wait: Duration::from_secs(1) })
            .await;
        assert_eq!(admission, Admission::Wait(Duration::from_secs(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn classes_do_not_starve_each_other() {
        let limiter = limiter(1.0, 0.0);
        assert!(limiter.try_acquire(QuotaClass::Selection, 1.0).await.is_ok());
        assert!(limiter.try_acquire(QuotaClass::Selection, 1.0).await.is_err());
        assert!(limiter.try_acquire(QuotaClass::Labels, 1.0).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn release_unused_is_capped_at_capacity() {
        let limiter = limiter(2.0, 0.0);
        assert!(limiter.try_acquire(QuotaClass::Selection, 1.0).await.is_ok());
        limiter.release_unused(QuotaClass::Selection, 5.0).await;
        assert_eq!(limiter.available(QuotaClass::Selection).await, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn cost_above_capacity_never_admitted() {
        let limiter = limiter(2.0, 1.0);
        let admission = limiter
            .acquire(QuotaClass::Labels, 3.0, AcquirePolicy::Block { max_wait: Duration::from_secs(60) })
            .await;
        assert_eq!(admission, Admission::Wait(Duration::MAX));
    }

    #[test]
    fn rejects_non_positive_capacity() {
        let bad = LimiterConfig {
            selection: BucketConfig { capacity: 0.0, refill_per_sec: 1.0 },
            ..Default::default()
        };
        assert!(matches!(
            RateLimiter::new(bad),
            Err(LimiterError::InvalidCapacity { class: QuotaClass::Selection, .. })
        ));
        let bad = LimiterConfig {
            labels: BucketConfig { capacity: 5.0, refill_per_sec: -1.0 },
            ..Default::default()
        };
        assert!(matches!(RateLimiter::new(bad), Err(LimiterError::InvalidRefillRate { .. })));
    }
}
