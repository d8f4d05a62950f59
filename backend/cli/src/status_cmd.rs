//! `chartforge status`: asks a running server for its `/health` report.

use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::output::{note_error, note_success, note_warn};

pub fn health_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}/health")
}

pub async fn run(port: u16) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("failed to build HTTP client")?;

    let resp = match client.get(health_url(port)).send().await {
        Ok(resp) => resp,
        Err(_) => {
            note_error(&format!("ChartForge is not running on port {port}"));
            return Ok(());
        }
    };

    let healthy = resp.status().is_success();
    let body: Value = resp.json().await.context("health endpoint returned invalid JSON")?;
    if healthy {
        note_success(&format!("ChartForge is healthy on port {port}"));
    } else {
        note_warn(&format!("ChartForge is degraded on port {port}"));
    }
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_loopback_health() {
        assert_eq!(health_url(8080), "http://127.0.0.1:8080/health");
    }
}
