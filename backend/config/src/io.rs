//! Config file location and loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, info};

use crate::schema::ChartForgeConfig;

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolve the ChartForge config directory.
/// Priority: `CHARTFORGE_CONFIG_DIR` env > `~/.chartforge/` > `./.chartforge`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHARTFORGE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".chartforge"))
        .unwrap_or_else(|| PathBuf::from(".chartforge"))
}

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// The explicit `--config` path if given, else the default location.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config_file_path(&config_dir()))
}

/// Load and parse the config from disk.
///
/// Returns `Ok(Default::default())` if the file doesn't exist.
pub async fn load_config(path: &Path) -> Result<ChartForgeConfig> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(ChartForgeConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Parse YAML text; an empty document is the default config.
pub fn parse_config(raw: &str) -> Result<ChartForgeConfig> {
    if raw.trim().is_empty() {
        return Ok(ChartForgeConfig::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("chartforge-config-{}-{name}", std::process::id()))
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let cfg = load_config(&scratch("absent.yaml")).await.unwrap();
        assert_eq!(cfg, ChartForgeConfig::default());
    }

    #[tokio::test]
    async fn reads_yaml_from_disk() {
        let path = scratch("present.yaml");
        fs::write(&path, "server:\n  port: 7070\n").await.unwrap();
        let cfg = load_config(&path).await.unwrap();
        let _ = fs::remove_file(&path).await;
        assert_eq!(cfg.port(), 7070);
    }

    #[tokio::test]
    async fn malformed_yaml_reports_path() {
        let path = scratch("broken.yaml");
        fs::write(&path, "server: [unclosed\n").await.unwrap();
        let err = load_config(&path).await.unwrap_err();
        let _ = fs::remove_file(&path).await;
        assert!(format!("{err:#}").contains("broken.yaml"));
    }

    #[test]
    fn blank_document_is_default() {
        assert_eq!(parse_config("  \n").unwrap(), ChartForgeConfig::default());
    }

    #[test]
    fn explicit_path_wins() {
        let explicit = Path::new("/etc/chartforge.yaml");
        assert_eq!(resolve_config_path(Some(explicit)), explicit.to_path_buf());
        assert!(resolve_config_path(None).ends_with("config.yaml"));
    }
}
