use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, instrument};

use chartforge_core::{AnalyticsRequest, ChartError, ChartPlan, Dataset};

use crate::labels::LabelEnhancer;
use crate::synthetic::synthesize;
use crate::transform::dataset_from_input;

#[derive(Debug, Clone)]
pub struct PreparerConfig {
    /// Global switch; a request must also allow synthesis.
    pub allow_synthetic: bool,
    pub max_data_points: usize,
    /// Fixed seed for reproducible synthesis.
    pub seed: Option<u64>,
}

impl Default for PreparerConfig {
    fn default() -> Self {
        Self {
            allow_synthetic: true,
            max_data_points: 1000,
            seed: None,
        }
    }
}

/// Supplies the dataset for a plan: validated user data or a synthetic one.
pub struct DataPreparer {
    config: PreparerConfig,
    enhancer: Option<LabelEnhancer>,
}

impl DataPreparer {
    pub fn new(config: PreparerConfig) -> Self {
        Self { config, enhancer: None }
    }

    pub fn with_label_enhancer(mut self, enhancer: LabelEnhancer) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    #[instrument(skip_all, fields(chart = %plan.primary))]
    pub async fn prepare(&self, request: &AnalyticsRequest, plan: &ChartPlan) -> Result<Dataset, ChartError> {
        if let Some(input) = &request.data {
            let dataset = dataset_from_input(input, self.config.max_data_points)?;
            debug!(points = dataset.len(), series = dataset.series_count(), "Validated user data");
            return Ok(dataset);
        }

        if !(request.use_synthetic_data && self.config.allow_synthetic) {
            return Err(ChartError::Data(
                "no data supplied and synthetic data is disabled".to_string(),
            ));
        }

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let synthesized = synthesize(plan.primary, &request.content, &mut rng);
        info!(
            generator = ?synthesized.generator,
            points = synthesized.dataset.len(),
            "Synthesized dataset"
        );

        let mut dataset = synthesized.dataset;
        if request.enhance_labels && synthesized.domain.is_generic() && dataset.series.is_none() {
            if let Some(enhancer) = &self.enhancer {
                if let Some(labels) = enhancer.enhance(&request.content, &dataset.labels).await {
                    dataset = dataset.relabeled(labels);
                }
            }
        }
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use chartforge_core::{ChartType, DataInput, DataRecord, Provenance};
    use chartforge_limiter::{LimiterConfig, RateLimiter};
    use chartforge_planner::MockAdvisor;

    fn plan(chart: ChartType) -> ChartPlan {
        ChartPlan::from_rule(chart, None, 0.5, "test")
    }

    fn quarterly() -> DataInput {
        DataInput::Records(vec![
            DataRecord::new("Q1", 45000.0),
            DataRecord::new("Q2", 52000.0),
            DataRecord::new("Q3", 48000.0),
            DataRecord::new("Q4", 61000.0),
        ])
    }

    #[tokio::test]
    async fn user_data_passes_through_with_statistics() {
        let preparer = DataPreparer::new(PreparerConfig::default());
        let request = AnalyticsRequest::new("Compare quarterly revenue").with_data(quarterly());
        let dataset = preparer.prepare(&request, &plan(ChartType::BarChartVertical)).await.unwrap();
        assert_eq!(dataset.provenance, Provenance::User);
        assert_eq!(dataset.statistics.mean, 51500.0);
    }

    #[tokio::test]
    async fn same_user_data_yields_identical_statistics() {
        let preparer = DataPreparer::new(PreparerConfig::default());
        let request = AnalyticsRequest::new("Compare quarterly revenue").with_data(quarterly());
        let a = preparer.prepare(&request, &plan(ChartType::BarChartVertical)).await.unwrap();
        let b = preparer.prepare(&request, &plan(ChartType::BarChartVertical)).await.unwrap();
        assert_eq!(a.statistics, b.statistics);
    }

    #[tokio::test]
    async fn synthesis_disabled_without_data_is_a_data_error() {
        let preparer = DataPreparer::new(PreparerConfig::default());
        let request = AnalyticsRequest::new("sales").with_synthetic(false);
        let err = preparer.prepare(&request, &plan(ChartType::LineChart)).await.unwrap_err();
        assert!(matches!(err, ChartError::Data(_)));

        let globally_off = DataPreparer::new(PreparerConfig { allow_synthetic: false, ..Default::default() });
        let err = globally_off.prepare(&AnalyticsRequest::new("sales"), &plan(ChartType::LineChart)).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn synthetic_dataset_matches_plan_sizing() {
        let preparer = DataPreparer::new(PreparerConfig { seed: Some(3), ..Default::default() });
        let request = AnalyticsRequest::new("Show monthly sales for 2024");
        let dataset = preparer.prepare(&request, &plan(ChartType::LineChart)).await.unwrap();
        assert_eq!(dataset.provenance, Provenance::Synthetic);
        assert_eq!(dataset.labels.len(), dataset.values.len());
        assert_eq!(dataset.values.len(), dataset.statistics.count);
        assert!(ChartType::LineChart.point_range().contains(&dataset.len()));
    }

    #[tokio::test]
    async fn generic_labels_are_enhanced_when_requested() {
        let limiter = Arc::new(RateLimiter::new(LimiterConfig::default()).unwrap());
        let labels: Vec<String> = (0..8).map(|i| format!("Region {i}")).collect();
        let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
        let preparer = DataPreparer::new(PreparerConfig { seed: Some(1), ..Default::default() });
        let baseline = preparer
            .prepare(&AnalyticsRequest::new("pizza toppings"), &plan(ChartType::PieChart))
            .await
            .unwrap();

        let advisor = Arc::new(MockAdvisor::failing().with_labels(&label_refs[..baseline.len()]));
        let preparer = DataPreparer::new(PreparerConfig { seed: Some(1), ..Default::default() })
            .with_label_enhancer(LabelEnhancer::new(advisor.clone(), limiter, Duration::from_secs(1)));
        let request = AnalyticsRequest::new("pizza toppings").with_enhanced_labels(true);
        let dataset = preparer.prepare(&request, &plan(ChartType::PieChart)).await.unwrap();

        assert_eq!(dataset.labels[0], "Region 0");
        assert_eq!(dataset.values, baseline.values);
        assert_eq!(advisor.label_calls(), 1);
    }

    #[tokio::test]
    async fn failed_enhancement_keeps_synthetic_labels() {
        let limiter = Arc::new(RateLimiter::new(LimiterConfig::default()).unwrap());
        let advisor = Arc::new(MockAdvisor::failing());
        let preparer = DataPreparer::new(PreparerConfig::default())
            .with_label_enhancer(LabelEnhancer::new(advisor, limiter, Duration::from_secs(1)));
        let request = AnalyticsRequest::new("pizza toppings").with_enhanced_labels(true);
        let dataset = preparer.prepare(&request, &plan(ChartType::BarChartVertical)).await.unwrap();
        assert_eq!(dataset.labels[0], "Category A");
    }
}
