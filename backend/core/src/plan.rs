use serde::{Deserialize, Serialize};

use crate::chart::ChartType;

/// Where a chart plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    Advisor,
    Rule,
}

/// The selector's decision for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPlan {
    pub primary: ChartType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<ChartType>,
    pub rationale: String,
    /// Always within `[0, 1]`.
    pub confidence: f32,
    pub source: SelectionSource,
}

impl ChartPlan {
    pub fn from_rule(
        primary: ChartType,
        secondary: Option<ChartType>,
        confidence: f32,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            primary,
            secondary: secondary.filter(|s| *s != primary),
            rationale: rationale.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source: SelectionSource::Rule,
        }
    }

    pub fn from_advisor(
        primary: ChartType,
        secondary: Option<ChartType>,
        confidence: f32,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            source: SelectionSource::Advisor,
            ..Self::from_rule(primary, secondary, confidence, rationale)
        }
    }
}
