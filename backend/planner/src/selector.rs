//! Chart selection: forced type, then the advisor, then the rule table.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use chartforge_core::{
    Advisor, AdvisorError, AdvisorSuggestion, AnalyticsRequest, ChartError, ChartPlan, ChartType,
};
use chartforge_limiter::{AcquirePolicy, Admission, QuotaClass, RateLimiter};

use crate::rules::{companion, RuleTable};

/// Confidence attached to every rule-table plan.
pub const RULE_CONFIDENCE: f32 = 0.5;

const SELECTION_COST: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Advisor suggestions below this confidence fall back to the rules.
    pub confidence_threshold: f32,
    pub advisor_timeout: Duration,
    /// `Block` waits for quota then falls back to rules; `Hint` surfaces `RATE_LIMIT`.
    pub quota_policy: AcquirePolicy,
    pub rules: RuleTable,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.4,
            advisor_timeout: Duration::from_secs(10),
            quota_policy: AcquirePolicy::Block {
                max_wait: Duration::from_secs(2),
            },
            rules: RuleTable::default(),
        }
    }
}

pub struct ChartSelector {
    advisor: Option<Arc<dyn Advisor>>,
    limiter: Arc<RateLimiter>,
    config: SelectorConfig,
}

impl ChartSelector {
    pub fn new(advisor: Option<Arc<dyn Advisor>>, limiter: Arc<RateLimiter>, config: SelectorConfig) -> Self {
        Self { advisor, limiter, config }
    }

    pub fn has_advisor(&self) -> bool {
        self.advisor.is_some()
    }

    /// Longest a `select` call can take: the quota wait plus the advisor timeout.
    pub fn budget(&self) -> Duration {
        if self.advisor.is_none() {
            return Duration::ZERO;
        }
        let wait = match self.config.quota_policy {
            AcquirePolicy::Block { max_wait } => max_wait,
            AcquirePolicy::Hint => Duration::ZERO,
        };
        wait + self.config.advisor_timeout
    }

    /// Always yields a usable plan, except when the quota policy is
    /// non-blocking and the selection bucket is empty.
    #[instrument(skip_all, fields(intent = %request.content))]
    pub async fn select(&self, request: &AnalyticsRequest) -> Result<ChartPlan, ChartError> {
        if let Some(preference) = request.chart_preference.as_deref() {
            match preference.parse::<ChartType>() {
                Ok(chart) => {
                    info!(chart = %chart, "Using client-forced chart type");
                    return Ok(ChartPlan::from_rule(
                        chart,
                        Some(companion(chart)),
                        1.0,
                        format!("chart type {chart} requested by client"),
                    ));
                }
                Err(e) => warn!(error = %e, "Ignoring unrecognized chart preference"),
            }
        }

        let Some(advisor) = &self.advisor else {
            return Ok(self.rule_plan(&request.content, "no advisor configured"));
        };

        if let Admission::Wait(wait) = self
            .limiter
            .acquire(QuotaClass::Selection, SELECTION_COST, self.config.quota_policy)
            .await
        {
            if matches!(self.config.quota_policy, AcquirePolicy::Hint) {
                return Err(ChartError::RateLimited {
                    class: QuotaClass::Selection.to_string(),
                    retry_after_ms: u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                });
            }
            return Ok(self.rule_plan(&request.content, "advisor quota exhausted"));
        }

        let timeout = self.config.advisor_timeout;
        let outcome = match tokio::time::timeout(timeout, advisor.suggest(&request.content, timeout)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AdvisorError::Unavailable(format!("timed out after {timeout:?}"))),
        };

        match outcome {
            Ok(suggestion) => self
                .accept(advisor.name(), suggestion)
                .or_else(|reason| Ok(self.rule_plan(&request.content, &reason))),
            Err(AdvisorError::NotDispatched(reason)) => {
                self.limiter.release_unused(QuotaClass::Selection, SELECTION_COST).await;
                Ok(self.rule_plan(&request.content, &format!("advisor not dispatched: {reason}")))
            }
            Err(e) => Ok(self.rule_plan(&request.content, &e.to_string())),
        }
    }

    fn accept(&self, advisor: &str, suggestion: AdvisorSuggestion) -> Result<ChartPlan, String> {
        let primary = suggestion
            .chart_type
            .parse::<ChartType>()
            .map_err(|e| format!("advisor suggested {e}"))?;

        let confidence = suggestion.confidence;
        if !(confidence >= self.config.confidence_threshold) {
            return Err(format!(
                "advisor confidence {confidence:.2} below threshold {:.2}",
                self.config.confidence_threshold
            ));
        }

        let secondary = suggestion
            .secondary
            .as_deref()
            .and_then(|s| s.parse::<ChartType>().ok())
            .filter(|s| *s != primary)
            .unwrap_or_else(|| companion(primary));

        debug!(chart = %primary, confidence, "Accepted advisor suggestion");
        Ok(ChartPlan::from_advisor(
            primary,
            Some(secondary),
            confidence,
            suggestion
                .rationale
                .unwrap_or_else(|| format!("suggested by {advisor} advisor")),
        ))
    }

    fn rule_plan(&self, intent: &str, reason: &str) -> ChartPlan {
        let matched = self.config.rules.evaluate(intent);
        info!(rule = %matched.rule, chart = %matched.primary, reason, "Selected chart by rule");
        ChartPlan::from_rule(
            matched.primary,
            matched.secondary,
            RULE_CONFIDENCE,
            format!("{reason}; matched '{}' rule", matched.rule),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartforge_core::SelectionSource;
    use chartforge_limiter::{BucketConfig, LimiterConfig};

    use crate::mock::MockAdvisor;

    fn limiter(capacity: f64, refill_per_sec: f64) -> Arc<RateLimiter> {
        let bucket = BucketConfig { capacity, refill_per_sec };
        Arc::new(RateLimiter::new(LimiterConfig { selection: bucket, labels: bucket }).unwrap())
    }

    fn selector(advisor: Arc<MockAdvisor>) -> ChartSelector {
        ChartSelector::new(Some(advisor), limiter(10.0, 1.0), SelectorConfig::default())
    }

    #[test]
    fn budget_is_quota_wait_plus_advisor_timeout() {
        let advisor = Arc::new(MockAdvisor::suggesting("pie_chart", 0.9));
        assert_eq!(selector(advisor.clone()).budget(), Duration::from_secs(12));

        let hinting = SelectorConfig { quota_policy: AcquirePolicy::Hint, ..Default::default() };
        let selector = ChartSelector::new(Some(advisor), limiter(10.0, 1.0), hinting);
        assert_eq!(selector.budget(), Duration::from_secs(10));

        let rules_only = ChartSelector::new(None, limiter(10.0, 1.0), SelectorConfig::default());
        assert_eq!(rules_only.budget(), Duration::ZERO);
    }

    #[tokio::test]
    async fn forced_type_bypasses_advisor() {
        let advisor = Arc::new(MockAdvisor::suggesting("pie_chart", 0.99));
        let selector = selector(advisor.clone());
        let request = AnalyticsRequest::new("monthly sales").with_chart_preference("heatmap");

        let plan = selector.select(&request).await.unwrap();
        assert_eq!(plan.primary, ChartType::Heatmap);
        assert_eq!(plan.source, SelectionSource::Rule);
        assert_eq!(plan.confidence, 1.0);
        assert_eq!(advisor.suggest_calls(), 0);
    }

    #[tokio::test]
    async fn unrecognized_forced_type_is_ignored() {
        let advisor = Arc::new(MockAdvisor::suggesting("pie_chart", 0.9));
        let request = AnalyticsRequest::new("market share").with_chart_preference("sparkline");
        let plan = selector(advisor.clone()).select(&request).await.unwrap();
        assert_eq!(plan.primary, ChartType::PieChart);
        assert_eq!(plan.source, SelectionSource::Advisor);
        assert_eq!(advisor.suggest_calls(), 1);
    }

    #[tokio::test]
    async fn confident_advisor_wins() {
        let advisor = Arc::new(MockAdvisor::suggesting("area_chart", 0.8).with_secondary("line_chart"));
        let plan = selector(advisor).select(&AnalyticsRequest::new("sales")).await.unwrap();
        assert_eq!(plan.primary, ChartType::AreaChart);
        assert_eq!(plan.secondary, Some(ChartType::LineChart));
        assert_eq!(plan.source, SelectionSource::Advisor);
    }

    #[tokio::test]
    async fn failing_advisor_falls_back_to_rules() {
        let advisor = Arc::new(MockAdvisor::failing());
        let plan = selector(advisor).select(&AnalyticsRequest::new("Show monthly sales for 2024")).await.unwrap();
        assert_eq!(plan.primary, ChartType::LineChart);
        assert_eq!(plan.source, SelectionSource::Rule);
        assert_eq!(plan.confidence, RULE_CONFIDENCE);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_advisor_times_out_to_rules() {
        let advisor = Arc::new(MockAdvisor::suggesting("pie_chart", 0.9).with_delay(Duration::from_secs(60)));
        let plan = selector(advisor).select(&AnalyticsRequest::new("monthly revenue")).await.unwrap();
        assert_eq!(plan.source, SelectionSource::Rule);
        assert_eq!(plan.primary, ChartType::LineChart);
    }

    #[tokio::test]
    async fn low_confidence_and_unknown_types_fall_back() {
        let low = Arc::new(MockAdvisor::suggesting("pie_chart", 0.2));
        let plan = selector(low).select(&AnalyticsRequest::new("distribution of ages")).await.unwrap();
        assert_eq!(plan.source, SelectionSource::Rule);
        assert_eq!(plan.primary, ChartType::Histogram);

        let unknown = Arc::new(MockAdvisor::suggesting("sparkline", 0.95));
        let plan = selector(unknown).select(&AnalyticsRequest::new("distribution of ages")).await.unwrap();
        assert_eq!(plan.source, SelectionSource::Rule);
    }

    #[tokio::test]
    async fn not_dispatched_returns_quota() {
        let limiter = limiter(3.0, 0.0);
        let advisor = Arc::new(MockAdvisor::not_dispatched());
        let selector = ChartSelector::new(Some(advisor), limiter.clone(), SelectorConfig::default());
        selector.select(&AnalyticsRequest::new("sales")).await.unwrap();
        assert_eq!(limiter.available(QuotaClass::Selection).await, 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_quota_blocks_then_uses_rules() {
        let advisor = Arc::new(MockAdvisor::suggesting("pie_chart", 0.9));
        let selector = ChartSelector::new(Some(advisor.clone()), limiter(1.0, 0.0), SelectorConfig::default());
        let request = AnalyticsRequest::new("monthly sales");

        assert_eq!(selector.select(&request).await.unwrap().source, SelectionSource::Advisor);
        let plan = selector.select(&request).await.unwrap();
        assert_eq!(plan.source, SelectionSource::Rule);
        assert_eq!(advisor.suggest_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_blocking_policy_surfaces_rate_limit() {
        let advisor = Arc::new(MockAdvisor::suggesting("pie_chart", 0.9));
        let config = SelectorConfig { quota_policy: AcquirePolicy::Hint, ..Default::default() };
        let selector = ChartSelector::new(Some(advisor), limiter(1.0, 0.5), config);
        let request = AnalyticsRequest::new("monthly sales");

        selector.select(&request).await.unwrap();
        let err = selector.select(&request).await.unwrap_err();
        match err {
            ChartError::RateLimited { class, retry_after_ms } => {
                assert_eq!(class, "selection");
                assert_eq!(retry_after_ms, 2000);
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn without_advisor_uses_rules() {
        let selector = ChartSelector::new(None, limiter(1.0, 1.0), SelectorConfig::default());
        let plan = selector.select(&AnalyticsRequest::new("pizza toppings")).await.unwrap();
        assert_eq!(plan.primary, ChartType::BarChartVertical);
        assert_eq!(plan.source, SelectionSource::Rule);
    }
}
