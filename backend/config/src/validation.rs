//! Config validation: schema checks with user-friendly error messages.

use chartforge_core::ChartType;
use thiserror::Error;

use crate::defaults::{
    DEFAULT_ADVISOR_TIMEOUT_MS, DEFAULT_ATTEMPT_TIMEOUT_MS, DEFAULT_QUOTA_MAX_WAIT_MS, DEFAULT_RENDERING_TIMEOUT_MS,
    DEFAULT_RENDER_METHOD, DEFAULT_SELECTION_TIMEOUT_MS,
};
use crate::schema::{BucketSettings, ChartForgeConfig};

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

const RENDER_METHODS: [&str; 2] = ["native", "command"];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &ChartForgeConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_server(config, &mut report);
    validate_advisor(config, &mut report);
    validate_quota(config, &mut report);
    validate_selector(config, &mut report);
    validate_data(config, &mut report);
    validate_executor(config, &mut report);
    validate_pipeline(config, &mut report);
    validate_deadlines(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_server(config: &ChartForgeConfig, report: &mut ValidationReport) {
    let Some(server) = &config.server else { return };
    match server.port {
        Some(0) => report.error("server.port", "port must be > 0"),
        Some(port) if port < 1024 && port != 80 && port != 443 => report.warn(
            "server.port",
            format!("Port {port} requires elevated privileges; consider using a port >= 1024"),
        ),
        _ => {}
    }
    if server.max_connections == Some(0) {
        report.error("server.maxConnections", "maxConnections must be >= 1");
    }
}

fn validate_advisor(config: &ChartForgeConfig, report: &mut ValidationReport) {
    let Some(advisor) = &config.advisor else { return };
    if advisor.enabled != Some(false) && advisor.providers.is_empty() {
        report.warn("advisor.providers", "No advisor providers configured; chart selection uses rules only");
    }
    for (i, provider) in advisor.providers.iter().enumerate() {
        let path = format!("advisor.providers[{i}]");
        match provider.kind.to_ascii_lowercase().as_str() {
            "openrouter" | "openai" => {
                if provider.api_key.as_deref().map(str::trim).unwrap_or_default().is_empty() {
                    report.error(format!("{path}.apiKey"), "OpenRouter requires an apiKey");
                }
            }
            "ollama" => {}
            other => report.error(
                format!("{path}.kind"),
                format!("Unknown provider '{other}'. Use 'openrouter' or 'ollama'"),
            ),
        }
    }
    if advisor.timeout_ms == Some(0) {
        report.error("advisor.timeoutMs", "timeoutMs must be > 0");
    }
    if let Some(t) = advisor.temperature {
        if !(0.0..=2.0).contains(&t) {
            report.error("advisor.temperature", "temperature must be between 0 and 2");
        }
    }
}

fn validate_bucket(bucket: &Option<BucketSettings>, path: &str, report: &mut ValidationReport) {
    let Some(bucket) = bucket else { return };
    if bucket.capacity.is_some_and(|c| c.is_nan() || c <= 0.0) {
        report.error(format!("{path}.capacity"), "capacity must be > 0");
    }
    if bucket.refill_per_sec.is_some_and(|r| r.is_nan() || r <= 0.0) {
        report.error(format!("{path}.refillPerSec"), "refillPerSec must be > 0");
    }
}

fn validate_quota(config: &ChartForgeConfig, report: &mut ValidationReport) {
    let Some(quota) = &config.quota else { return };
    validate_bucket(&quota.selection, "quota.selection", report);
    validate_bucket(&quota.labels, "quota.labels", report);
    if let Some(mode) = &quota.mode {
        if !matches!(mode.as_str(), "blocking" | "non_blocking") {
            report.error(
                "quota.mode",
                format!("Unknown quota mode '{mode}'. Use 'blocking' or 'non_blocking'"),
            );
        }
    }
}

fn check_chart(name: &str, path: String, report: &mut ValidationReport) {
    if name.parse::<ChartType>().is_err() {
        report.error(path, format!("Unknown chart type '{name}'"));
    }
}

fn validate_selector(config: &ChartForgeConfig, report: &mut ValidationReport) {
    let Some(selector) = &config.selector else { return };
    if let Some(t) = selector.confidence_threshold {
        if !(0.0..=1.0).contains(&t) {
            report.error("selector.confidenceThreshold", "confidenceThreshold must be between 0 and 1");
        }
    }
    if let Some(fallback) = &selector.fallback {
        check_chart(fallback, "selector.fallback".to_string(), report);
    }
    let Some(rules) = &selector.rules else { return };
    if rules.is_empty() {
        report.warn("selector.rules", "Empty rule table; every request uses the fallback chart");
    }
    for (i, rule) in rules.iter().enumerate() {
        let path = format!("selector.rules[{i}]");
        if rule.name.trim().is_empty() {
            report.error(format!("{path}.name"), "Rule name cannot be empty");
        }
        if rule.cues.iter().all(|c| c.trim().is_empty()) {
            report.error(format!("{path}.cues"), "Rule needs at least one cue");
        }
        check_chart(&rule.primary, format!("{path}.primary"), report);
        if let Some(secondary) = &rule.secondary {
            check_chart(secondary, format!("{path}.secondary"), report);
        }
    }
}

fn validate_data(config: &ChartForgeConfig, report: &mut ValidationReport) {
    let Some(data) = &config.data else { return };
    if data.max_data_points == Some(0) {
        report.error("data.maxDataPoints", "maxDataPoints must be >= 1");
    }
}

fn validate_executor(config: &ChartForgeConfig, report: &mut ValidationReport) {
    let Some(executor) = &config.executor else { return };
    for (field, method) in [
        ("preferredMethod", &executor.preferred_method),
        ("alternateMethod", &executor.alternate_method),
    ] {
        let Some(method) = method else { continue };
        if !RENDER_METHODS.contains(&method.as_str()) {
            report.error(
                format!("executor.{field}"),
                format!("Unknown render method '{method}'. Use 'native' or 'command'"),
            );
        } else if method == "command" && executor.command.is_none() {
            report.error(format!("executor.{field}"), "The 'command' method needs an executor.command section");
        }
    }
    if let Some(command) = &executor.command {
        if command.program.trim().is_empty() {
            report.error("executor.command.program", "program cannot be empty");
        }
    }
    if executor.attempt_timeout_ms == Some(0) {
        report.error("executor.attemptTimeoutMs", "attemptTimeoutMs must be > 0");
    }
}

fn validate_pipeline(config: &ChartForgeConfig, report: &mut ValidationReport) {
    let Some(pipeline) = &config.pipeline else { return };
    for (field, value) in [
        ("selectionTimeoutMs", pipeline.selection_timeout_ms),
        ("preparationTimeoutMs", pipeline.preparation_timeout_ms),
        ("renderingTimeoutMs", pipeline.rendering_timeout_ms),
    ] {
        if value == Some(0) {
            report.error(format!("pipeline.{field}"), format!("{field} must be > 0"));
        }
    }
}

/// Stage deadlines shorter than the bounds inside them are raised at run time.
fn validate_deadlines(config: &ChartForgeConfig, report: &mut ValidationReport) {
    let pipeline = config.pipeline.as_ref();

    let advisor_active = config
        .advisor
        .as_ref()
        .is_some_and(|a| a.enabled != Some(false) && !a.providers.is_empty());
    if advisor_active {
        let advisor_ms = config
            .advisor
            .as_ref()
            .and_then(|a| a.timeout_ms)
            .unwrap_or(DEFAULT_ADVISOR_TIMEOUT_MS);
        let quota = config.quota.as_ref();
        let wait_ms = match quota.and_then(|q| q.mode.as_deref()) {
            Some("non_blocking") => 0,
            _ => quota.and_then(|q| q.max_wait_ms).unwrap_or(DEFAULT_QUOTA_MAX_WAIT_MS),
        };
        let needed = advisor_ms.saturating_add(wait_ms);
        let selection = pipeline
            .and_then(|p| p.selection_timeout_ms)
            .unwrap_or(DEFAULT_SELECTION_TIMEOUT_MS);
        if selection <= needed {
            report.warn(
                "pipeline.selectionTimeoutMs",
                format!(
                    "selectionTimeoutMs ({selection}) does not exceed advisor timeout plus quota wait ({needed}); \
                     the selection deadline is raised to cover them"
                ),
            );
        }
    }

    let executor = config.executor.as_ref();
    let preferred = executor
        .and_then(|e| e.preferred_method.as_deref())
        .unwrap_or(DEFAULT_RENDER_METHOD);
    let has_alternate = executor
        .and_then(|e| e.alternate_method.as_deref())
        .is_some_and(|m| m != preferred);
    let steps: u64 = if has_alternate { 3 } else { 2 };
    let attempt_ms = executor
        .and_then(|e| e.attempt_timeout_ms)
        .unwrap_or(DEFAULT_ATTEMPT_TIMEOUT_MS);
    let needed = attempt_ms.saturating_mul(steps);
    let rendering = pipeline
        .and_then(|p| p.rendering_timeout_ms)
        .unwrap_or(DEFAULT_RENDERING_TIMEOUT_MS);
    if rendering < needed {
        report.warn(
            "pipeline.renderingTimeoutMs",
            format!(
                "renderingTimeoutMs ({rendering}) is shorter than {steps} attempts of {attempt_ms}ms; \
                 the rendering deadline is raised to cover every fallback step"
            ),
        );
    }
}

fn validate_logging(config: &ChartForgeConfig, report: &mut ValidationReport) {
    let Some(level) = config.logging.as_ref().and_then(|l| l.level.as_deref()) else { return };
    if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        report.error("logging.level", format!("Unknown log level '{level}'"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::apply_all_defaults;
    use crate::schema::{
        AdvisorConfig, CommandSettings, ExecutorSettings, ProviderEntry, QuotaConfig, RuleSpec, SelectorSettings,
    };

    #[test]
    fn defaults_are_valid_but_warn_about_missing_providers() {
        let report = validate(&apply_all_defaults(ChartForgeConfig::default()));
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert_eq!(report.warnings[0].path, "advisor.providers");
    }

    #[test]
    fn deadlines_shorter_than_inner_bounds_warn() {
        let mut cfg = apply_all_defaults(ChartForgeConfig::default());
        let advisor = cfg.advisor.get_or_insert_with(AdvisorConfig::default);
        advisor.providers.push(ProviderEntry {
            kind: "ollama".into(),
            ..Default::default()
        });
        advisor.timeout_ms = Some(15_000);
        cfg.executor.as_mut().unwrap().command = Some(CommandSettings {
            program: "render".into(),
            args: vec![],
        });
        cfg.executor.as_mut().unwrap().alternate_method = Some("command".into());

        let report = validate(&cfg);
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        let paths: Vec<&str> = report.warnings.iter().map(|w| w.path.as_str()).collect();
        assert_eq!(paths, vec!["pipeline.selectionTimeoutMs", "pipeline.renderingTimeoutMs"]);
    }

    #[test]
    fn default_deadlines_cover_inner_bounds() {
        let report = validate(&apply_all_defaults(ChartForgeConfig::default()));
        assert!(report.warnings.iter().all(|w| !w.path.starts_with("pipeline.")));
    }

    #[test]
    fn unknown_chart_in_rule_is_error() {
        let mut cfg = ChartForgeConfig::default();
        cfg.selector = Some(SelectorSettings {
            rules: Some(vec![RuleSpec {
                name: "share".into(),
                cues: vec!["share".into()],
                primary: "donut_supreme".into(),
                secondary: Some("bar_chart_vertical".into()),
            }]),
            ..Default::default()
        });
        let report = validate(&cfg);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path, "selector.rules[0].primary");
    }

    #[test]
    fn openrouter_needs_key() {
        let mut cfg = ChartForgeConfig::default();
        cfg.advisor = Some(AdvisorConfig {
            providers: vec![ProviderEntry {
                kind: "openrouter".into(),
                ..Default::default()
            }],
            ..Default::default()
        });
        assert!(!validate(&cfg).is_valid());
    }

    #[test]
    fn quota_and_executor_checks() {
        let mut cfg = ChartForgeConfig::default();
        cfg.quota = Some(QuotaConfig {
            selection: Some(BucketSettings {
                capacity: Some(0.0),
                refill_per_sec: Some(1.0),
            }),
            mode: Some("eventually".into()),
            ..Default::default()
        });
        cfg.executor = Some(ExecutorSettings {
            alternate_method: Some("command".into()),
            ..Default::default()
        });
        let report = validate(&cfg);
        let paths: Vec<&str> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["quota.selection.capacity", "quota.mode", "executor.alternateMethod"]
        );
    }
}
