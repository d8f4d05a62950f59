//! HTTP side endpoints: service info, health, pipeline stats and the chart catalogue.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use chartforge_core::{ChartFamily, ChartType};
use chartforge_orchestrator::StatsSnapshot;

use crate::server::GatewayState;
use crate::session_registry::SessionSummary;

#[derive(Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<&'static str>,
}

#[derive(Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub advisor: bool,
    pub render_methods: Vec<String>,
    pub active_sessions: usize,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct StatsReport {
    pub pipeline: StatsSnapshot,
    pub active_sessions: usize,
    pub sessions: Vec<SessionSummary>,
}

#[derive(Serialize)]
pub struct ChartTypeEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Serialize)]
pub struct FamilyEntry {
    pub family: ChartFamily,
    pub name: &'static str,
    pub chart_types: Vec<ChartTypeEntry>,
}

/// `GET /`
pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "chartforge",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec!["/health", "/stats", "/chart-types", "/ws"],
    })
}

/// `GET /health`: 503 when no advisor is configured.
pub async fn get_health(State(state): State<GatewayState>) -> (StatusCode, Json<HealthReport>) {
    let orchestrator = state.manager.orchestrator();
    let advisor = orchestrator.has_advisor();
    let report = HealthReport {
        status: if advisor { "healthy" } else { "degraded" },
        advisor,
        render_methods: orchestrator.render_methods(),
        active_sessions: state.manager.active_sessions().await,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        timestamp: Utc::now(),
    };
    let code = if advisor { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(report))
}

/// `GET /stats`
pub async fn get_stats(State(state): State<GatewayState>) -> Json<StatsReport> {
    let sessions = state.manager.sessions().await;
    Json(StatsReport {
        pipeline: state.manager.orchestrator().stats(),
        active_sessions: sessions.len(),
        sessions,
    })
}

/// `GET /chart-types`
pub async fn chart_types() -> Json<Vec<FamilyEntry>> {
    Json(catalogue())
}

fn catalogue() -> Vec<FamilyEntry> {
    ChartFamily::ALL
        .iter()
        .map(|family| FamilyEntry {
            family: *family,
            name: family.display_name(),
            chart_types: family.members().map(entry).collect(),
        })
        .collect()
}

fn entry(chart: ChartType) -> ChartTypeEntry {
    ChartTypeEntry {
        id: chart.as_str(),
        name: chart.display_name(),
        description: chart.description(),
    }
}
