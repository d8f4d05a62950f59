//! LLM-backed [`Advisor`]: races every configured provider and parses the
//! first well-formed JSON reply.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use chartforge_core::{
    Advisor, AdvisorError, AdvisorSuggestion, ChartType, LlmProvider, LlmRequest, LlmResponse,
};

#[derive(Debug, Clone)]
pub struct LlmAdvisorConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmAdvisorConfig {
    fn default() -> Self {
        Self {
            model: "openai/gpt-4o-mini".to_string(),
            max_tokens: 400,
            temperature: 0.1,
        }
    }
}

pub struct LlmAdvisor {
    providers: Vec<Arc<dyn LlmProvider>>,
    config: LlmAdvisorConfig,
}

impl LlmAdvisor {
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>, config: LlmAdvisorConfig) -> Self {
        Self { providers, config }
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    fn request(&self, system_prompt: String, user_prompt: String) -> LlmRequest {
        LlmRequest {
            model: self.config.model.clone(),
            system_prompt,
            user_prompt,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    /// First successful provider reply within `timeout`.
    async fn race(&self, request: LlmRequest, timeout: Duration) -> Result<LlmResponse, AdvisorError> {
        if self.providers.is_empty() {
            return Err(AdvisorError::NotDispatched("no LLM providers configured".into()));
        }

        let start = Instant::now();
        let mut join_set = JoinSet::new();
        for provider in &self.providers {
            let provider = Arc::clone(provider);
            let req = request.clone();
            join_set.spawn(async move {
                let name = provider.name().to_string();
                debug!(provider = %name, "Calling provider");
                provider.complete(&req).await.map_err(|e| (name, e))
            });
        }

        let first_success = async {
            let mut last_error = None;
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok(Ok(response)) => return Ok(response),
                    Ok(Err((name, e))) => {
                        warn!(provider = %name, error = %e, "Provider failed");
                        last_error = Some(format!("{name}: {e}"));
                    }
                    Err(e) => warn!(error = %e, "Provider task aborted"),
                }
            }
            Err(AdvisorError::Unavailable(
                last_error.unwrap_or_else(|| "all providers failed".into()),
            ))
        };

        let response = tokio::time::timeout(timeout, first_success)
            .await
            .map_err(|_| AdvisorError::Unavailable(format!("no provider answered within {timeout:?}")))??;

        info!(
            provider = %response.provider,
            tokens = response.tokens_used,
            total_latency_ms = start.elapsed().as_millis() as u64,
            "Advisor answered"
        );
        Ok(response)
    }
}

#[async_trait]
impl Advisor for LlmAdvisor {
    fn name(&self) -> &str {
        "llm"
    }

    async fn suggest(&self, intent: &str, timeout: Duration) -> Result<AdvisorSuggestion, AdvisorError> {
        let request = self.request(selection_prompt(), format!("Request: {intent}"));
        let response = self.race(request, timeout).await?;
        parse_suggestion(&response.content)
    }

    async fn enhance_labels(
        &self,
        intent: &str,
        labels: &[String],
        timeout: Duration,
    ) -> Result<Vec<String>, AdvisorError> {
        let user_prompt = serde_json::json!({ "request": intent, "labels": labels }).to_string();
        let request = self.request(LABEL_PROMPT.to_string(), user_prompt);
        let response = self.race(request, timeout).await?;
        parse_labels(&response.content)
    }
}

const LABEL_PROMPT: &str = "You rename placeholder chart labels so they fit the user's request. \
Reply with a JSON object {\"labels\": [...]} containing exactly as many short labels as you \
were given, in the same order.";

fn selection_prompt() -> String {
    let catalogue = ChartType::ALL
        .iter()
        .map(|c| format!("- {}: {}", c.as_str(), c.description()))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You pick the best chart for a data visualization request.\n\
         Available chart types:\n{catalogue}\n\
         Reply with a JSON object: {{\"chart_type\": <type>, \"secondary\": <type or null>, \
         \"confidence\": <0..1>, \"rationale\": <one sentence>}}."
    )
}

#[derive(Deserialize)]
struct RawSuggestion {
    #[serde(alias = "chart", alias = "primary")]
    chart_type: String,
    #[serde(default, alias = "secondary_chart_type", alias = "alternative")]
    secondary: Option<String>,
    #[serde(default)]
    confidence: f32,
    #[serde(default, alias = "reasoning")]
    rationale: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLabels {
    Wrapped { labels: Vec<String> },
    Bare(Vec<String>),
}

/// The outermost JSON object or array inside a reply that may carry prose or code fences.
fn json_fragment(content: &str, open: char, close: char) -> Option<&str> {
    let start = content.find(open)?;
    let end = content.rfind(close)?;
    (end > start).then(|| &content[start..=end])
}

pub(crate) fn parse_suggestion(content: &str) -> Result<AdvisorSuggestion, AdvisorError> {
    let fragment = json_fragment(content, '{', '}')
        .ok_or_else(|| AdvisorError::Unavailable("advisor reply contained no JSON object".into()))?;
    let raw: RawSuggestion = serde_json::from_str(fragment)
        .map_err(|e| AdvisorError::Unavailable(format!("malformed advisor reply: {e}")))?;
    Ok(AdvisorSuggestion {
        chart_type: raw.chart_type,
        secondary: raw.secondary.filter(|s| !s.trim().is_empty()),
        confidence: raw.confidence,
        rationale: raw.rationale,
    })
}

pub(crate) fn parse_labels(content: &str) -> Result<Vec<String>, AdvisorError> {
    let fragment = json_fragment(content, '{', '}')
        .or_else(|| json_fragment(content, '[', ']'))
        .ok_or_else(|| AdvisorError::Unavailable("advisor reply contained no labels".into()))?;
    let raw: RawLabels = serde_json::from_str(fragment)
        .map_err(|e| AdvisorError::Unavailable(format!("malformed label reply: {e}")))?;
    Ok(match raw {
        RawLabels::Wrapped { labels } | RawLabels::Bare(labels) => {
            labels.into_iter().map(|l| l.trim().to_string()).collect()
        }
    })
}
