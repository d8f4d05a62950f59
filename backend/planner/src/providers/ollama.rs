use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use chartforge_core::{LlmProvider, LlmRequest, LlmResponse};

pub const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Local Ollama server, asked for JSON-formatted output.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: OLLAMA_DEFAULT_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    format: &'static str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateReply {
    response: String,
    eval_count: Option<u64>,
    prompt_eval_count: Option<u64>,
}

/// Ollama model names carry no routing prefix ("meta-llama/llama3" -> "llama3").
fn local_model_name(model: &str) -> &str {
    model.rsplit('/').next().unwrap_or(model)
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let start = Instant::now();
        let model = local_model_name(&request.model);

        let body = GenerateBody {
            model,
            system: &request.system_prompt,
            prompt: &request.user_prompt,
            format: "json",
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        debug!(model = %model, "Requesting Ollama generation");

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .context("Ollama request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned {}: {}", status, detail);
        }

        let reply: GenerateReply = response
            .json()
            .await
            .context("failed to decode Ollama reply")?;

        Ok(LlmResponse {
            content: reply.response,
            provider: self.name().to_string(),
            model: model.to_string(),
            tokens_used: reply.eval_count.unwrap_or(0) + reply.prompt_eval_count.unwrap_or(0),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
