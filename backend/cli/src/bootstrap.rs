//! Turns a prepared [`ChartForgeConfig`] into the running component graph.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use chartforge_config::schema::{BucketSettings, RuleSpec};
use chartforge_config::ChartForgeConfig;
use chartforge_core::{Advisor, ChartType};
use chartforge_data::{DataPreparer, LabelEnhancer, PreparerConfig};
use chartforge_executor::{
    CommandRenderer, ExecutorConfig, GenerationExecutor, RendererRegistry, SvgRenderer,
};
use chartforge_gateway::{SessionConfig, SessionManager};
use chartforge_limiter::{AcquirePolicy, BucketConfig, LimiterConfig, RateLimiter};
use chartforge_orchestrator::{Orchestrator, StageTimeouts};
use chartforge_planner::providers::{build_provider, ProviderKind, ProviderSettings};
use chartforge_planner::{ChartSelector, LlmAdvisor, LlmAdvisorConfig, Rule, RuleTable, SelectorConfig};

fn ms(value: Option<u64>, default: u64) -> Duration {
    Duration::from_millis(value.unwrap_or(default))
}

fn bucket(settings: Option<&BucketSettings>, fallback: BucketConfig) -> BucketConfig {
    let Some(s) = settings else { return fallback };
    BucketConfig {
        capacity: s.capacity.unwrap_or(fallback.capacity),
        refill_per_sec: s.refill_per_sec.unwrap_or(fallback.refill_per_sec),
    }
}

pub fn limiter_config(config: &ChartForgeConfig) -> LimiterConfig {
    let quota = config.quota.as_ref();
    let defaults = LimiterConfig::default();
    LimiterConfig {
        selection: bucket(quota.and_then(|q| q.selection.as_ref()), defaults.selection),
        labels: bucket(quota.and_then(|q| q.labels.as_ref()), defaults.labels),
    }
}

pub fn quota_policy(config: &ChartForgeConfig) -> AcquirePolicy {
    let quota = config.quota.as_ref();
    match quota.and_then(|q| q.mode.as_deref()) {
        Some("non_blocking") => AcquirePolicy::Hint,
        _ => AcquirePolicy::Block {
            max_wait: ms(quota.and_then(|q| q.max_wait_ms), 2_000),
        },
    }
}

fn chart(name: &str) -> Result<ChartType> {
    name.parse::<ChartType>().with_context(|| format!("invalid chart in selector config: {name}"))
}

fn rule(entry: &RuleSpec) -> Result<Rule> {
    let cues: Vec<&str> = entry.cues.iter().map(String::as_str).collect();
    let secondary = entry.secondary.as_deref().map(chart).transpose()?;
    Ok(Rule::new(entry.name.clone(), &cues, chart(&entry.primary)?, secondary))
}

/// The configured rule table, or the built-in one with an optional fallback override.
pub fn rule_table(config: &ChartForgeConfig) -> Result<RuleTable> {
    let selector = config.selector.as_ref();
    let builtin = RuleTable::default();
    let fallback = match selector.and_then(|s| s.fallback.as_deref()) {
        Some(name) => chart(name)?,
        None => builtin.fallback(),
    };
    let rules = match selector.and_then(|s| s.rules.as_ref()) {
        Some(specs) => specs.iter().map(rule).collect::<Result<Vec<_>>>()?,
        None => builtin.rules().to_vec(),
    };
    Ok(RuleTable::new(rules, fallback))
}

pub fn selector_config(config: &ChartForgeConfig) -> Result<SelectorConfig> {
    let defaults = SelectorConfig::default();
    Ok(SelectorConfig {
        confidence_threshold: config
            .selector
            .as_ref()
            .and_then(|s| s.confidence_threshold)
            .unwrap_or(defaults.confidence_threshold),
        advisor_timeout: ms(config.advisor.as_ref().and_then(|a| a.timeout_ms), 10_000),
        quota_policy: quota_policy(config),
        rules: rule_table(config)?,
    })
}

pub fn preparer_config(config: &ChartForgeConfig) -> PreparerConfig {
    let defaults = PreparerConfig::default();
    let Some(data) = &config.data else { return defaults };
    PreparerConfig {
        allow_synthetic: data.allow_synthetic.unwrap_or(defaults.allow_synthetic),
        max_data_points: data.max_data_points.unwrap_or(defaults.max_data_points),
        seed: data.seed,
    }
}

pub fn executor_config(config: &ChartForgeConfig) -> ExecutorConfig {
    let defaults = ExecutorConfig::default();
    let Some(executor) = &config.executor else { return defaults };
    ExecutorConfig {
        preferred_method: executor.preferred_method.clone().unwrap_or(defaults.preferred_method),
        alternate_method: executor.alternate_method.clone(),
        attempt_timeout: ms(executor.attempt_timeout_ms, 30_000),
    }
}

pub fn renderer_registry(config: &ChartForgeConfig) -> RendererRegistry {
    let executor = config.executor.as_ref();
    let width = executor.and_then(|e| e.width).unwrap_or(800);
    let height = executor.and_then(|e| e.height).unwrap_or(500);
    let mut registry = RendererRegistry::new().with(Arc::new(SvgRenderer::new(width, height)));
    if let Some(command) = executor.and_then(|e| e.command.as_ref()) {
        registry.register(Arc::new(CommandRenderer::new(command.program.clone(), command.args.clone())));
    }
    registry
}

pub fn stage_timeouts(config: &ChartForgeConfig) -> StageTimeouts {
    let defaults = StageTimeouts::default();
    let Some(p) = &config.pipeline else { return defaults };
    StageTimeouts {
        selection: p.selection_timeout_ms.map(Duration::from_millis).unwrap_or(defaults.selection),
        preparation: p.preparation_timeout_ms.map(Duration::from_millis).unwrap_or(defaults.preparation),
        rendering: p.rendering_timeout_ms.map(Duration::from_millis).unwrap_or(defaults.rendering),
    }
}

/// Builds the LLM advisor from the providers that have usable credentials.
pub fn build_advisor(config: &ChartForgeConfig) -> Option<Arc<dyn Advisor>> {
    let advisor = config.advisor.as_ref()?;
    if advisor.enabled == Some(false) {
        info!("Advisor disabled; chart selection uses the rule table only");
        return None;
    }

    let mut providers = Vec::new();
    for entry in &advisor.providers {
        let kind = match entry.kind.parse::<ProviderKind>() {
            Ok(kind) => kind,
            Err(e) => {
                warn!(error = %e, "Skipping advisor provider");
                continue;
            }
        };
        let settings = ProviderSettings {
            api_key: entry.api_key.clone(),
            base_url: entry.base_url.clone(),
        };
        match build_provider(kind, &settings) {
            Some(provider) => {
                info!(provider = %kind, "Registered advisor provider");
                providers.push(provider);
            }
            None => warn!(provider = %kind, "Advisor provider is missing credentials; skipped"),
        }
    }
    if providers.is_empty() {
        return None;
    }

    let defaults = LlmAdvisorConfig::default();
    let llm_config = LlmAdvisorConfig {
        model: advisor.model.clone().unwrap_or(defaults.model),
        max_tokens: advisor.max_tokens.unwrap_or(defaults.max_tokens),
        temperature: advisor.temperature.unwrap_or(defaults.temperature),
    };
    Some(Arc::new(LlmAdvisor::new(providers, llm_config)))
}

pub fn session_config(config: &ChartForgeConfig) -> SessionConfig {
    let defaults = SessionConfig::default();
    SessionConfig {
        max_connections: config
            .server
            .as_ref()
            .and_then(|s| s.max_connections)
            .unwrap_or(defaults.max_connections),
        synthetic_data: config
            .data
            .as_ref()
            .and_then(|d| d.allow_synthetic)
            .unwrap_or(defaults.synthetic_data),
    }
}

/// Wire limiter, selector, preparer and executor into a session manager.
pub fn build_session_manager(config: &ChartForgeConfig) -> Result<Arc<SessionManager>> {
    let limiter = Arc::new(RateLimiter::new(limiter_config(config)).context("invalid quota configuration")?);
    let advisor = build_advisor(config);

    let selector = ChartSelector::new(advisor.clone(), Arc::clone(&limiter), selector_config(config)?);

    let mut preparer = DataPreparer::new(preparer_config(config));
    if let Some(advisor) = advisor {
        let label_timeout = ms(config.advisor.as_ref().and_then(|a| a.label_timeout_ms), 5_000);
        preparer = preparer.with_label_enhancer(LabelEnhancer::new(advisor, Arc::clone(&limiter), label_timeout));
    }

    let executor = GenerationExecutor::new(renderer_registry(config), executor_config(config));
    let orchestrator = Orchestrator::new(selector, preparer, executor, stage_timeouts(config));
    info!(
        advisor = orchestrator.has_advisor(),
        methods = ?orchestrator.render_methods(),
        "Pipeline assembled"
    );

    Ok(Arc::new(SessionManager::new(Arc::new(orchestrator), session_config(config))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartforge_config::schema::{
        AdvisorConfig, CommandSettings, ExecutorSettings, ProviderEntry, QuotaConfig, SelectorSettings,
    };
    use chartforge_config::{apply_all_defaults, parse_config};

    fn defaults() -> ChartForgeConfig {
        apply_all_defaults(ChartForgeConfig::default())
    }

    #[test]
    fn quota_mode_maps_to_policy() {
        assert_eq!(
            quota_policy(&defaults()),
            AcquirePolicy::Block {
                max_wait: Duration::from_secs(2)
            }
        );
        let mut cfg = defaults();
        cfg.quota = Some(QuotaConfig {
            mode: Some("non_blocking".into()),
            ..Default::default()
        });
        assert_eq!(quota_policy(&cfg), AcquirePolicy::Hint);
    }

    #[test]
    fn bucket_settings_carry_over() {
        let cfg = apply_all_defaults(
            parse_config("quota:\n  labels:\n    capacity: 4\n    refillPerSec: 0.25\n").unwrap(),
        );
        let limiter = limiter_config(&cfg);
        assert_eq!(limiter.labels.capacity, 4.0);
        assert_eq!(limiter.labels.refill_per_sec, 0.25);
        assert_eq!(limiter.selection.capacity, 60.0);
    }

    #[test]
    fn configured_rules_replace_builtin_table() {
        let mut cfg = defaults();
        cfg.selector = Some(SelectorSettings {
            rules: Some(vec![RuleSpec {
                name: "share".into(),
                cues: vec!["Share".into()],
                primary: "pie_chart".into(),
                secondary: Some("bar_chart_horizontal".into()),
            }]),
            fallback: Some("line_chart".into()),
            ..Default::default()
        });
        let table = rule_table(&cfg).unwrap();
        assert_eq!(table.rules().len(), 1);
        assert_eq!(table.evaluate("market share by vendor").primary, ChartType::PieChart);
        assert_eq!(table.evaluate("something unrelated").primary, ChartType::LineChart);
    }

    #[test]
    fn builtin_rules_kept_without_override() {
        let table = rule_table(&defaults()).unwrap();
        assert_eq!(table.rules(), RuleTable::default().rules());
    }

    #[test]
    fn unknown_rule_chart_is_an_error() {
        let mut cfg = defaults();
        cfg.selector = Some(SelectorSettings {
            fallback: Some("hologram".into()),
            ..Default::default()
        });
        assert!(selector_config(&cfg).is_err());
    }

    #[test]
    fn command_renderer_registered_when_configured() {
        assert_eq!(renderer_registry(&defaults()).methods(), vec!["native".to_string()]);
        let mut cfg = ChartForgeConfig::default();
        cfg.executor = Some(ExecutorSettings {
            command: Some(CommandSettings {
                program: "/usr/bin/render".into(),
                args: vec![],
            }),
            ..Default::default()
        });
        let cfg = apply_all_defaults(cfg);
        assert_eq!(renderer_registry(&cfg).methods(), vec!["command".to_string(), "native".to_string()]);
        assert_eq!(executor_config(&cfg).alternate_method.as_deref(), Some("command"));
    }

    #[test]
    fn advisor_needs_usable_provider() {
        assert!(build_advisor(&defaults()).is_none());

        let mut cfg = defaults();
        cfg.advisor = Some(AdvisorConfig {
            providers: vec![ProviderEntry {
                kind: "ollama".into(),
                api_key: None,
                base_url: Some("http://localhost:11434".into()),
            }],
            ..Default::default()
        });
        assert!(build_advisor(&cfg).is_some());

        cfg.advisor.as_mut().unwrap().enabled = Some(false);
        assert!(build_advisor(&cfg).is_none());
    }

    #[test]
    fn stage_timeouts_from_pipeline_section() {
        let cfg = apply_all_defaults(parse_config("pipeline:\n  selectionTimeoutMs: 500\n").unwrap());
        let timeouts = stage_timeouts(&cfg);
        assert_eq!(timeouts.selection, Duration::from_millis(500));
        assert_eq!(timeouts.rendering, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn builds_session_manager_from_defaults() {
        let manager = build_session_manager(&defaults()).unwrap();
        assert_eq!(manager.active_sessions().await, 0);
        assert!(!manager.orchestrator().has_advisor());
    }
}
