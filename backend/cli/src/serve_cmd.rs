//! `chartforge serve`: load config, assemble the pipeline, run the gateway
//! until Ctrl-C.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use chartforge_config::schema::ServerConfig;
use chartforge_config::{config_dir, load_config, prepare, resolve_config_path, ChartForgeConfig};
use chartforge_gateway::{start_server, GatewayState};
use chartforge_logging::{init_logger, redact_value, LogSettings};

use crate::bootstrap::build_session_manager;

/// Logging settings from the raw file, before env substitution and defaults.
pub fn log_settings(raw: &ChartForgeConfig) -> LogSettings {
    let logging = raw.logging.as_ref();
    let file_dir = logging.filter(|l| l.file == Some(true)).map(|l| {
        l.dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir().join("logs"))
    });
    LogSettings {
        level: logging
            .and_then(|l| l.level.clone())
            .unwrap_or_else(|| LogSettings::default().level),
        file_dir,
    }
}

/// A `--port` flag beats both the file and `CHARTFORGE_PORT`.
pub fn apply_port_flag(mut config: ChartForgeConfig, port: Option<u16>) -> ChartForgeConfig {
    if let Some(port) = port {
        config.server.get_or_insert_with(ServerConfig::default).port = Some(port);
    }
    config
}

pub fn listen_addr(config: &ChartForgeConfig) -> Result<SocketAddr> {
    let addr = format!("{}:{}", config.bind(), config.port());
    addr.parse().with_context(|| format!("invalid listen address: {addr}"))
}

pub async fn run(port: Option<u16>, config_path: Option<&Path>) -> Result<()> {
    let path = resolve_config_path(config_path);
    let raw = load_config(&path).await?;
    init_logger(&log_settings(&raw))?;

    let config = prepare(raw, &std::env::vars().collect())
        .with_context(|| format!("Failed to prepare config from {}", path.display()))?;
    let config = apply_port_flag(config, port);
    info!(
        path = %path.display(),
        config = %redact_value(&serde_json::to_value(&config)?),
        "Effective configuration"
    );

    let manager = build_session_manager(&config)?;
    let addr = listen_addr(&config)?;
    info!(addr = %addr, "Starting ChartForge");

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received; shutting down"),
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C; shutting down"),
        }
        trigger.cancel();
    });

    start_server(addr, GatewayState::new(manager), shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartforge_config::parse_config;

    #[test]
    fn file_logging_defaults_under_config_dir() {
        let raw = parse_config("logging:\n  level: debug\n  file: true\n").unwrap();
        let settings = log_settings(&raw);
        assert_eq!(settings.level, "debug");
        assert!(settings.file_dir.unwrap().ends_with("logs"));

        let settings = log_settings(&ChartForgeConfig::default());
        assert_eq!(settings.level, "info");
        assert!(settings.file_dir.is_none());
    }

    #[test]
    fn port_flag_overrides_config() {
        let cfg = parse_config("server:\n  port: 9000\n").unwrap();
        assert_eq!(apply_port_flag(cfg.clone(), None).port(), 9000);
        assert_eq!(apply_port_flag(cfg, Some(7001)).port(), 7001);
    }

    #[test]
    fn listen_addr_combines_bind_and_port() {
        let cfg = parse_config("server:\n  bind: 127.0.0.1\n  port: 8181\n").unwrap();
        assert_eq!(listen_addr(&cfg).unwrap().to_string(), "127.0.0.1:8181");

        let bad = parse_config("server:\n  bind: not-an-ip\n").unwrap();
        assert!(listen_addr(&bad).is_err());
    }
}
