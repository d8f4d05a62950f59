use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use chartforge_core::{Advisor, AdvisorError};
use chartforge_limiter::{AcquirePolicy, QuotaClass, RateLimiter};

const LABEL_COST: f64 = 1.0;

/// Best-effort label rewriting through the advisor's `labels` quota.
///
/// Never fails: any refusal, error, timeout or count mismatch returns `None`
/// and the caller keeps its original labels.
pub struct LabelEnhancer {
    advisor: Arc<dyn Advisor>,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
}

impl LabelEnhancer {
    pub fn new(advisor: Arc<dyn Advisor>, limiter: Arc<RateLimiter>, timeout: Duration) -> Self {
        Self { advisor, limiter, timeout }
    }

    pub async fn enhance(&self, intent: &str, labels: &[String]) -> Option<Vec<String>> {
        if !self
            .limiter
            .acquire(QuotaClass::Labels, LABEL_COST, AcquirePolicy::Hint)
            .await
            .is_granted()
        {
            debug!("Skipping label enhancement: quota exhausted");
            return None;
        }

        let call = self.advisor.enhance_labels(intent, labels, self.timeout);
        let enhanced = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(enhanced)) => enhanced,
            Ok(Err(AdvisorError::NotDispatched(reason))) => {
                self.limiter.release_unused(QuotaClass::Labels, LABEL_COST).await;
                debug!(reason = %reason, "Label enhancement not dispatched");
                return None;
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Label enhancement failed");
                return None;
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Label enhancement timed out");
                return None;
            }
        };

        if enhanced.len() != labels.len() || enhanced.iter().any(|l| l.trim().is_empty()) {
            warn!(expected = labels.len(), got = enhanced.len(), "Discarding mismatched labels");
            return None;
        }
        Some(enhanced)
    }
}
