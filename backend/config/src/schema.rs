//! ChartForge runtime configuration schema.
//!
//! Every field is optional in the file; [`crate::defaults`] fills the gaps
//! after loading so downstream code can rely on concrete values.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartForgeConfig {
    /// HTTP/WebSocket listener
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    /// LLM advisor used for chart selection and label enhancement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisor: Option<AdvisorConfig>,

    /// Token buckets gating advisor calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota: Option<QuotaConfig>,

    /// Chart selection tuning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<SelectorSettings>,

    /// Data preparation and synthesis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataConfig>,

    /// Rendering backends and fallback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<ExecutorSettings>,

    /// Per-stage deadlines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<usize>,
}

// ---------------------------------------------------------------------------
// Advisor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisorConfig {
    /// Set to false to run on the rule table alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Raced in parallel; the first usable reply wins.
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEntry {
    /// `openrouter` or `ollama`
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Quota
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<BucketSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BucketSettings>,
    /// `blocking` waits up to `maxWaitMs` then uses the rules; `non_blocking` returns RATE_LIMIT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wait_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refill_per_sec: Option<f64>,
}

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f32>,
    /// Replaces the built-in rule table when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<RuleSpec>>,
    /// Chart used when no rule matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpec {
    pub name: String,
    pub cues: Vec<String>,
    pub primary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
}

// ---------------------------------------------------------------------------
// Data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_synthetic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_data_points: Option<usize>,
    /// Fixed seed for reproducible synthetic data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// External renderer registered as the `command` method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSettings {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preparation_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendering_timeout_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// `trace` | `debug` | `info` | `warn` | `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Directory for the daily-rolling JSON log file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<bool>,
}

impl ChartForgeConfig {
    pub fn port(&self) -> u16 {
        self.server.as_ref().and_then(|s| s.port).unwrap_or(crate::defaults::DEFAULT_PORT)
    }

    pub fn bind(&self) -> &str {
        self.server
            .as_ref()
            .and_then(|s| s.bind.as_deref())
            .unwrap_or(crate::defaults::DEFAULT_BIND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_yaml() {
        let yaml = r#"
server:
  port: 9000
  maxConnections: 5
advisor:
  providers:
    - kind: openrouter
      apiKey: sk-test
  timeoutMs: 4000
quota:
  selection:
    capacity: 10
    refillPerSec: 0.5
  mode: non_blocking
selector:
  confidenceThreshold: 0.6
  rules:
    - name: share
      cues: [share, split]
      primary: pie_chart
executor:
  command:
    program: /usr/local/bin/render
    args: ["--png"]
"#;
        let cfg: ChartForgeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.port(), 9000);
        assert_eq!(cfg.server.as_ref().unwrap().max_connections, Some(5));
        let advisor = cfg.advisor.unwrap();
        assert_eq!(advisor.providers[0].api_key.as_deref(), Some("sk-test"));
        assert_eq!(advisor.timeout_ms, Some(4000));
        let quota = cfg.quota.unwrap();
        assert_eq!(quota.selection.unwrap().refill_per_sec, Some(0.5));
        assert_eq!(quota.mode.as_deref(), Some("non_blocking"));
        let rules = cfg.selector.unwrap().rules.unwrap();
        assert_eq!(rules[0].primary, "pie_chart");
        assert_eq!(cfg.executor.unwrap().command.unwrap().args, vec!["--png"]);
    }

    #[test]
    fn empty_document_is_default() {
        let cfg: ChartForgeConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg, ChartForgeConfig::default());
        assert_eq!(cfg.bind(), "0.0.0.0");
    }
}
