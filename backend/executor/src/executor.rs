use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use chartforge_core::{
    Artifact, AttemptRecord, ChartError, ChartPlan, ChartType, Dataset, GenerationResult, RenderError,
    RenderOptions,
};

use crate::renderers::{RendererRegistry, NATIVE_METHOD};
use crate::shape::check_shape;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub preferred_method: String,
    /// Method retried with the primary chart after the preferred steps fail.
    pub alternate_method: Option<String>,
    /// Hard wall-clock bound on each attempt.
    pub attempt_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            preferred_method: NATIVE_METHOD.to_string(),
            alternate_method: None,
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// One (chart type, method) pair in the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub chart: ChartType,
    pub method: String,
}

/// Renders a plan through an ordered list of fallback steps.
pub struct GenerationExecutor {
    registry: RendererRegistry,
    config: ExecutorConfig,
}

impl GenerationExecutor {
    pub fn new(registry: RendererRegistry, config: ExecutorConfig) -> Self {
        Self { registry, config }
    }

    pub fn methods(&self) -> Vec<String> {
        self.registry.methods()
    }

    /// (primary, preferred) → (secondary, preferred) → (primary, alternate).
    pub fn steps(&self, plan: &ChartPlan) -> Vec<Step> {
        let preferred = &self.config.preferred_method;
        let mut steps = vec![Step { chart: plan.primary, method: preferred.clone() }];
        if let Some(secondary) = plan.secondary.filter(|s| *s != plan.primary) {
            steps.push(Step { chart: secondary, method: preferred.clone() });
        }
        if let Some(alternate) = self.config.alternate_method.as_ref().filter(|m| *m != preferred) {
            steps.push(Step { chart: plan.primary, method: alternate.clone() });
        }
        steps
    }

    /// Longest `execute` can take for `plan`: every step hitting its attempt timeout.
    pub fn budget(&self, plan: &ChartPlan) -> Duration {
        let steps = u32::try_from(self.steps(plan).len()).unwrap_or(u32::MAX);
        self.config.attempt_timeout.saturating_mul(steps)
    }

    #[instrument(skip_all, fields(primary = %plan.primary))]
    pub async fn execute(&self, plan: &ChartPlan, dataset: &Dataset, options: &RenderOptions) -> GenerationResult {
        let started = Instant::now();
        let mut attempts = Vec::new();
        let mut last_error = String::from("no rendering steps configured");

        for step in self.steps(plan) {
            let attempt_started = Instant::now();
            let outcome = self.attempt(&step, dataset, options).await;
            let elapsed_ms = attempt_started.elapsed().as_millis() as u64;

            match outcome {
                Ok(artifact) => {
                    attempts.push(AttemptRecord {
                        chart_type: step.chart,
                        method: step.method.clone(),
                        elapsed_ms,
                        error: None,
                        timed_out: false,
                    });
                    info!(
                        chart = %step.chart,
                        method = %step.method,
                        attempts = attempts.len(),
                        elapsed_ms,
                        "Chart rendered"
                    );
                    return GenerationResult::succeeded(
                        artifact,
                        step.chart,
                        step.method,
                        started.elapsed().as_millis() as u64,
                        attempts,
                    );
                }
                Err(e) => {
                    warn!(chart = %step.chart, method = %step.method, error = %e, "Render attempt failed");
                    last_error = e.to_string();
                    attempts.push(AttemptRecord {
                        chart_type: step.chart,
                        method: step.method,
                        elapsed_ms,
                        error: Some(last_error.clone()),
                        timed_out: matches!(e, RenderError::Timeout(_)),
                    });
                }
            }
        }

        GenerationResult::failed(last_error, started.elapsed().as_millis() as u64, attempts)
    }

    async fn attempt(
        &self,
        step: &Step,
        dataset: &Dataset,
        options: &RenderOptions,
    ) -> Result<Artifact, RenderError> {
        let renderer = self.registry.get(&step.method).ok_or_else(|| {
            RenderError::Failed(format!("no renderer registered for method '{}'", step.method))
        })?;
        check_shape(step.chart, dataset)?;

        let timeout = self.config.attempt_timeout;
        match tokio::time::timeout(timeout, renderer.render(step.chart, dataset, options, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::Timeout(timeout)),
        }
    }
}

/// Wire error for a failed generation: `TIMEOUT` only when every attempt timed out.
pub fn failure_error(result: &GenerationResult) -> ChartError {
    let message = result.error.clone().unwrap_or_else(|| "rendering failed".to_string());
    if result.all_attempts_timed_out() {
        let after_ms = result.attempts.last().map_or(result.elapsed_ms, |a| a.elapsed_ms);
        ChartError::Timeout { stage: "rendering".to_string(), after_ms }
    } else {
        ChartError::GenerationFailed(message)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::renderers::MockRenderer;
    use chartforge_core::{ErrorCode, Provenance};

    fn dataset(n: usize) -> Dataset {
        let labels = (0..n).map(|i| format!("P{i}")).collect();
        let values = (0..n).map(|i| i as f64 + 1.0).collect();
        Dataset::new(labels, values, Provenance::Synthetic)
    }

    fn plan(primary: ChartType, secondary: Option<ChartType>) -> ChartPlan {
        ChartPlan::from_rule(primary, secondary, 0.5, "test")
    }

    fn executor(renderers: Vec<Arc<MockRenderer>>, alternate: Option<&str>) -> GenerationExecutor {
        let mut registry = RendererRegistry::new();
        for r in renderers {
            registry.register(r);
        }
        GenerationExecutor::new(
            registry,
            ExecutorConfig {
                preferred_method: "native".into(),
                alternate_method: alternate.map(str::to_string),
                attempt_timeout: Duration::from_secs(2),
            },
        )
    }

    #[test]
    fn budget_counts_every_step() {
        let exec = executor(vec![], Some("command"));
        assert_eq!(exec.budget(&plan(ChartType::LineChart, Some(ChartType::AreaChart))), Duration::from_secs(6));
        assert_eq!(exec.budget(&plan(ChartType::LineChart, None)), Duration::from_secs(4));
    }

    #[test]
    fn steps_follow_fallback_order() {
        let exec = executor(vec![], Some("command"));
        let steps = exec.steps(&plan(ChartType::LineChart, Some(ChartType::AreaChart)));
        let pairs: Vec<(ChartType, &str)> = steps.iter().map(|s| (s.chart, s.method.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                (ChartType::LineChart, "native"),
                (ChartType::AreaChart, "native"),
                (ChartType::LineChart, "command"),
            ]
        );
    }

    #[tokio::test]
    async fn primary_success_uses_one_attempt() {
        let native = Arc::new(MockRenderer::new("native"));
        let result = executor(vec![native.clone()], None)
            .execute(&plan(ChartType::LineChart, Some(ChartType::AreaChart)), &dataset(6), &RenderOptions::default())
            .await;
        assert!(result.success);
        assert_eq!(result.chart_type, Some(ChartType::LineChart));
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(native.calls(), vec![ChartType::LineChart]);
    }

    #[tokio::test]
    async fn bad_shape_falls_back_to_secondary() {
        // 20 slices is too many for a pie
        let native = Arc::new(MockRenderer::new("native"));
        let result = executor(vec![native.clone()], None)
            .execute(&plan(ChartType::PieChart, Some(ChartType::BarChartVertical)), &dataset(20), &RenderOptions::default())
            .await;
        assert!(result.success);
        assert_eq!(result.chart_type, Some(ChartType::BarChartVertical));
        assert_eq!(result.attempts.len(), 2);
        assert!(result.attempts[0].error.as_deref().unwrap_or_default().contains("slices"));
        assert_eq!(native.calls(), vec![ChartType::BarChartVertical]);
    }

    #[tokio::test]
    async fn alternate_method_is_last_resort() {
        let native = Arc::new(MockRenderer::new("native").failing_on(ChartType::LineChart).failing_on(ChartType::AreaChart));
        let command = Arc::new(MockRenderer::new("command"));
        let result = executor(vec![native, command], Some("command"))
            .execute(&plan(ChartType::LineChart, Some(ChartType::AreaChart)), &dataset(6), &RenderOptions::default())
            .await;
        assert!(result.success);
        assert_eq!(result.method.as_deref(), Some("command"));
        assert_eq!(result.chart_type, Some(ChartType::LineChart));
        assert_eq!(result.attempts.len(), 3);
    }

    #[tokio::test]
    async fn unregistered_method_is_a_failed_step() {
        let native = Arc::new(MockRenderer::new("native").failing_on(ChartType::LineChart));
        let result = executor(vec![native], Some("command"))
            .execute(&plan(ChartType::LineChart, None), &dataset(6), &RenderOptions::default())
            .await;
        assert!(!result.success);
        assert_eq!(result.attempts.len(), 2);
        assert!(result.error.unwrap().contains("no renderer registered"));
    }

    #[tokio::test(start_paused = true)]
    async fn all_timeouts_classify_as_timeout() {
        let native = Arc::new(
            MockRenderer::new("native")
                .stalling_on(ChartType::LineChart)
                .stalling_on(ChartType::AreaChart),
        );
        let result = executor(vec![native], None)
            .execute(&plan(ChartType::LineChart, Some(ChartType::AreaChart)), &dataset(6), &RenderOptions::default())
            .await;
        assert!(!result.success);
        assert!(result.artifact.is_none());
        assert!(result.all_attempts_timed_out());
        assert_eq!(failure_error(&result).code(), ErrorCode::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn mixed_failures_classify_as_generation_failed() {
        let native = Arc::new(
            MockRenderer::new("native")
                .stalling_on(ChartType::LineChart)
                .failing_on(ChartType::AreaChart),
        );
        let result = executor(vec![native], None)
            .execute(&plan(ChartType::LineChart, Some(ChartType::AreaChart)), &dataset(6), &RenderOptions::default())
            .await;
        assert!(!result.success);
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(failure_error(&result).code(), ErrorCode::GenerationFailed);
    }
}
