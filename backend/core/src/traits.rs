use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::chart::ChartType;
use crate::dataset::Dataset;
use crate::request::{OutputFormat, Theme};
use crate::response::Artifact;

/// A chart suggestion returned by an advisor. Chart names are unvalidated.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorSuggestion {
    pub chart_type: String,
    pub secondary: Option<String>,
    pub confidence: f32,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Error)]
pub enum AdvisorError {
    /// The advisor could not answer (error or timeout).
    #[error("advisor unavailable: {0}")]
    Unavailable(String),

    /// The call was refused locally before reaching the upstream service,
    /// so no quota was consumed.
    #[error("advisor call not dispatched: {0}")]
    NotDispatched(String),
}

/// Natural-language collaborator used for chart selection and label rewriting.
#[async_trait]
pub trait Advisor: Send + Sync {
    fn name(&self) -> &str;

    /// Suggest a chart type for the given intent.
    async fn suggest(&self, intent: &str, timeout: Duration)
        -> Result<AdvisorSuggestion, AdvisorError>;

    /// Rewrite generic labels into domain-appropriate ones. Must return the
    /// same number of labels.
    async fn enhance_labels(
        &self,
        intent: &str,
        labels: &[String],
        timeout: Duration,
    ) -> Result<Vec<String>, AdvisorError>;
}

/// Presentation inputs that travel with a render call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
    pub title: Option<String>,
    pub format: OutputFormat,
    pub theme: Option<Theme>,
}

#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("{chart} cannot render this dataset: {reason}")]
    UnsupportedShape { chart: ChartType, reason: String },

    #[error("{method} does not support {chart}")]
    UnsupportedChart { method: String, chart: ChartType },

    #[error("{method} cannot produce {format:?} output")]
    UnsupportedFormat { method: String, format: OutputFormat },

    #[error("render timed out after {0:?}")]
    Timeout(Duration),

    #[error("renderer failed: {0}")]
    Failed(String),
}

/// Turns a chart type and dataset into an artifact.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Method name used in fallback configuration (e.g. "native").
    fn method(&self) -> &str;

    async fn render(
        &self,
        chart: ChartType,
        dataset: &Dataset,
        options: &RenderOptions,
        timeout: Duration,
    ) -> Result<Artifact, RenderError>;
}

/// Trait for LLM providers backing the advisor.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "openrouter", "ollama").
    fn name(&self) -> &str;

    /// Send a completion request and return the response text.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
}
