//! Environment handling for config values.
//!
//! String values may reference `${VAR_NAME}` (uppercase names only), resolved
//! at load time; `$${VAR}` escapes to a literal `${VAR}`. A few well-known
//! variables override config fields directly.

use std::collections::HashMap;

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

use crate::schema::{AdvisorConfig, ChartForgeConfig, ProviderEntry, ServerConfig};

/// `${VAR}` with an optional leading `$` marking the escape form.
static ENV_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)\$\{([A-Z_][A-Z0-9_]*)\}").expect("env var pattern is valid"));

#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references using the process environment.
pub fn resolve_env_vars(value: &Value) -> Result<Value> {
    resolve_env_vars_with(value, &std::env::vars().collect())
}

/// Substitute `${VAR}` references using `env`. Unset or empty variables are errors.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    substitute_value(value, env, "")
}

fn substitute_value(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                let child = if path.is_empty() { k.clone() } else { format!("{path}.{k}") };
                out.insert(k.clone(), substitute_value(v, env, &child)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains("${") {
        return Ok(s.to_string());
    }

    let mut missing: Option<MissingEnvVarError> = None;
    let replaced = ENV_REF.replace_all(s, |caps: &Captures| {
        let name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{name}}}");
        }
        match env.get(name).filter(|v| !v.is_empty()) {
            Some(v) => v.clone(),
            None => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    if let Some(err) = missing {
        bail!(err);
    }
    Ok(replaced.into_owned())
}

/// Env var names referenced anywhere in a value tree, sorted and deduplicated.
pub fn collect_referenced_vars(value: &Value) -> Vec<String> {
    fn walk(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::String(s) => out.extend(
                ENV_REF
                    .captures_iter(s)
                    .filter(|c| c[1].is_empty())
                    .map(|c| c[2].to_string()),
            ),
            Value::Array(items) => items.iter().for_each(|v| walk(v, out)),
            Value::Object(map) => map.values().for_each(|v| walk(v, out)),
            _ => {}
        }
    }
    let mut vars = Vec::new();
    walk(value, &mut vars);
    vars.sort();
    vars.dedup();
    vars
}

/// Apply `CHARTFORGE_PORT`, `CHARTFORGE_BIND`, `OPENROUTER_API_KEY` and `OLLAMA_URL`.
///
/// Provider variables only add a provider of that kind when the config does
/// not already declare one.
pub fn apply_env_overrides(mut config: ChartForgeConfig, env: &HashMap<String, String>) -> ChartForgeConfig {
    let get = |name: &str| env.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(port) = get("CHARTFORGE_PORT").and_then(|p| p.parse::<u16>().ok()) {
        config.server.get_or_insert_with(ServerConfig::default).port = Some(port);
    }
    if let Some(bind) = get("CHARTFORGE_BIND") {
        config.server.get_or_insert_with(ServerConfig::default).bind = Some(bind.to_string());
    }

    let advisor = config.advisor.get_or_insert_with(AdvisorConfig::default);
    let has_kind = |providers: &[ProviderEntry], kind: &str| {
        providers.iter().any(|p| p.kind.eq_ignore_ascii_case(kind))
    };
    if let Some(key) = get("OPENROUTER_API_KEY") {
        if !has_kind(&advisor.providers, "openrouter") {
            debug!("Adding OpenRouter provider from environment");
            advisor.providers.push(ProviderEntry {
                kind: "openrouter".to_string(),
                api_key: Some(key.to_string()),
                base_url: None,
            });
        }
    }
    if let Some(url) = get("OLLAMA_URL") {
        if !has_kind(&advisor.providers, "ollama") {
            debug!(url, "Adding Ollama provider from environment");
            advisor.providers.push(ProviderEntry {
                kind: "ollama".to_string(),
                api_key: None,
                base_url: Some(url.to_string()),
            });
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_nested_vars() {
        let v = json!({"advisor": {"providers": [{"apiKey": "${OPENROUTER_KEY}"}]}, "x": "a-${B}-c"});
        let result = resolve_env_vars_with(&v, &env(&[("OPENROUTER_KEY", "sk-1"), ("B", "b")])).unwrap();
        assert_eq!(result["advisor"]["providers"][0]["apiKey"], "sk-1");
        assert_eq!(result["x"], "a-b-c");
    }

    #[test]
    fn missing_var_names_the_path() {
        let v = json!({"server": {"bind": "${MISSING_BIND}"}});
        let err = resolve_env_vars_with(&v, &HashMap::new()).unwrap_err().to_string();
        assert!(err.contains("MISSING_BIND"));
        assert!(err.contains("server.bind"));
    }

    #[test]
    fn escaped_reference_is_literal() {
        let v = json!({"k": "$${HOME_DIR}"});
        let result = resolve_env_vars_with(&v, &HashMap::new()).unwrap();
        assert_eq!(result["k"], "${HOME_DIR}");
        assert!(collect_referenced_vars(&v).is_empty());
    }

    #[test]
    fn collects_referenced_vars() {
        let vars = collect_referenced_vars(&json!({"a": "${FOO}", "b": ["${BAR}", "${FOO}"]}));
        assert_eq!(vars, vec!["BAR".to_string(), "FOO".to_string()]);
    }

    #[test]
    fn overrides_port_and_adds_providers() {
        let cfg = apply_env_overrides(
            ChartForgeConfig::default(),
            &env(&[
                ("CHARTFORGE_PORT", "9100"),
                ("OPENROUTER_API_KEY", "sk-env"),
                ("OLLAMA_URL", "http://gpu:11434"),
            ]),
        );
        assert_eq!(cfg.port(), 9100);
        let providers = cfg.advisor.unwrap().providers;
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].api_key.as_deref(), Some("sk-env"));
        assert_eq!(providers[1].base_url.as_deref(), Some("http://gpu:11434"));
    }

    #[test]
    fn configured_provider_wins_over_env() {
        let mut cfg = ChartForgeConfig::default();
        cfg.advisor = Some(AdvisorConfig {
            providers: vec![ProviderEntry {
                kind: "openrouter".into(),
                api_key: Some("sk-file".into()),
                base_url: None,
            }],
            ..Default::default()
        });
        let cfg = apply_env_overrides(cfg, &env(&[("OPENROUTER_API_KEY", "sk-env"), ("CHARTFORGE_PORT", "nope")]));
        let providers = cfg.advisor.as_ref().unwrap().providers.clone();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].api_key.as_deref(), Some("sk-file"));
        assert_eq!(cfg.port(), crate::defaults::DEFAULT_PORT);
    }
}
