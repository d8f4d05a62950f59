pub mod mock;
pub mod ollama;
pub mod openrouter;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chartforge_core::LlmProvider;

pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use openrouter::OpenRouterProvider;

/// Provider backends selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenRouter,
    Ollama,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openrouter" | "openai" => Ok(ProviderKind::OpenRouter),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(format!("unknown advisor provider '{other}'")),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenRouter => f.write_str("openrouter"),
            ProviderKind::Ollama => f.write_str("ollama"),
        }
    }
}

/// Connection settings for one provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Build a provider, or `None` when it lacks the credentials it needs.
pub fn build_provider(kind: ProviderKind, settings: &ProviderSettings) -> Option<Arc<dyn LlmProvider>> {
    match kind {
        ProviderKind::OpenRouter => {
            let key = settings.api_key.as_deref().filter(|k| !k.trim().is_empty())?;
            let mut provider = OpenRouterProvider::new(key);
            if let Some(url) = &settings.base_url {
                provider = provider.with_base_url(url);
            }
            Some(Arc::new(provider))
        }
        ProviderKind::Ollama => {
            let mut provider = OllamaProvider::new();
            if let Some(url) = &settings.base_url {
                provider = provider.with_base_url(url);
            }
            Some(Arc::new(provider))
        }
    }
}
