use serde::{Deserialize, Serialize};

use crate::chart::ChartType;
use crate::dataset::Dataset;
use crate::error::{ChartError, ErrorDetail};
use crate::plan::ChartPlan;

/// A rendered chart, base64-encoded for transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub mime_type: String,
    pub encoding: String,
    pub content: String,
}

/// One rendering attempt in the executor's fallback chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub chart_type: ChartType,
    pub method: String,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub timed_out: bool,
}

/// Terminal outcome of the generation executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    /// The chart type that was actually rendered (or last attempted).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<ChartType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: Vec<AttemptRecord>,
}

impl GenerationResult {
    pub fn succeeded(
        artifact: Artifact,
        chart_type: ChartType,
        method: impl Into<String>,
        elapsed_ms: u64,
        attempts: Vec<AttemptRecord>,
    ) -> Self {
        Self {
            success: true,
            artifact: Some(artifact),
            chart_type: Some(chart_type),
            method: Some(method.into()),
            elapsed_ms,
            error: None,
            attempts,
        }
    }

    pub fn failed(error: impl Into<String>, elapsed_ms: u64, attempts: Vec<AttemptRecord>) -> Self {
        let last = attempts.last();
        Self {
            success: false,
            artifact: None,
            chart_type: last.map(|a| a.chart_type),
            method: last.map(|a| a.method.clone()),
            elapsed_ms,
            error: Some(error.into()),
            attempts,
        }
    }

    /// True when at least one attempt ran and every attempt hit its deadline.
    pub fn all_attempts_timed_out(&self) -> bool {
        !self.attempts.is_empty() && self.attempts.iter().all(|a| a.timed_out)
    }
}

/// What the orchestrator hands back for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<GenerationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Dataset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<ChartPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl AnalyticsResponse {
    pub fn success(plan: ChartPlan, data: Dataset, result: GenerationResult) -> Self {
        Self {
            success: true,
            result: Some(result),
            data: Some(data),
            plan: Some(plan),
            error: None,
        }
    }

    /// A failed response; attach whatever partial metadata exists.
    pub fn failure(err: &ChartError) -> Self {
        Self {
            success: false,
            result: None,
            data: None,
            plan: None,
            error: Some(ErrorDetail::from(err)),
        }
    }

    pub fn with_plan(mut self, plan: ChartPlan) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn with_data(mut self, data: Dataset) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_result(mut self, result: GenerationResult) -> Self {
        self.result = Some(result);
        self
    }
}
