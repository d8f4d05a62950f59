use serde::{Deserialize, Serialize};

use crate::error::ChartError;

/// An inbound visualization request. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyticsRequest {
    /// Free-text intent, e.g. "Show monthly sales for 2024".
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataInput>,
    /// Forced chart type. Unknown names are ignored by the selector.
    #[serde(default, alias = "chart_type", skip_serializing_if = "Option::is_none")]
    pub chart_preference: Option<String>,
    #[serde(default = "default_true", alias = "allow_synthetic")]
    pub use_synthetic_data: bool,
    #[serde(default)]
    pub enhance_labels: bool,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
}

fn default_true() -> bool {
    true
}

impl AnalyticsRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            title: None,
            data: None,
            chart_preference: None,
            use_synthetic_data: true,
            enhance_labels: false,
            output_format: OutputFormat::default(),
            theme: None,
        }
    }

    pub fn with_data(mut self, data: DataInput) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_chart_preference(mut self, chart: impl Into<String>) -> Self {
        self.chart_preference = Some(chart.into());
        self
    }

    pub fn with_synthetic(mut self, allowed: bool) -> Self {
        self.use_synthetic_data = allowed;
        self
    }

    pub fn with_enhanced_labels(mut self, enhance: bool) -> Self {
        self.enhance_labels = enhance;
        self
    }

    /// Parse and validate a wire payload against the closed request schema.
    pub fn from_payload(payload: serde_json::Value) -> Result<Self, ChartError> {
        let request: AnalyticsRequest = serde_json::from_value(payload)
            .map_err(|e| ChartError::InvalidRequest(format!("malformed payload: {e}")))?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), ChartError> {
        if self.content.trim().is_empty() {
            return Err(ChartError::InvalidRequest(
                "'content' must not be empty".to_string(),
            ));
        }
        if let Some(theme) = &self.theme {
            if theme.palette.as_ref().is_some_and(|p| p.is_empty()) {
                return Err(ChartError::InvalidRequest(
                    "'theme.palette' must contain at least one color".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// User-supplied data, in either record or column form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataInput {
    Records(Vec<DataRecord>),
    Columns(DataColumns),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataRecord {
    #[serde(alias = "name", alias = "category", alias = "x")]
    pub label: String,
    #[serde(alias = "y", alias = "amount", alias = "count")]
    pub value: f64,
    #[serde(default, alias = "group", skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
}

impl DataRecord {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self { label: label.into(), value, series: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataColumns {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Svg,
    Png,
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Svg => "image/svg+xml",
            OutputFormat::Png => "image/png",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Theme {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub palette: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_minimal_payload_with_defaults() {
        let req = AnalyticsRequest::from_payload(json!({"content": "Show monthly sales"})).unwrap();
        assert!(req.use_synthetic_data);
        assert!(!req.enhance_labels);
        assert_eq!(req.output_format, OutputFormat::Svg);
        assert!(req.data.is_none());
    }

    #[test]
    fn parses_records_with_aliases() {
        let req = AnalyticsRequest::from_payload(json!({
            "content": "Revenue",
            "chart_type": "bar_chart_vertical",
            "data": [{"name": "Q1", "amount": 45000}, {"label": "Q2", "value": 52000}]
        }))
        .unwrap();
        assert_eq!(req.chart_preference.as_deref(), Some("bar_chart_vertical"));
        match req.data.unwrap() {
            DataInput::Records(records) => {
                assert_eq!(records.len(), 2);
                assert_eq!(records[0].label, "Q1");
                assert_eq!(records[1].value, 52000.0);
            }
            other => panic!("expected records, got {other:?}"),
        }
    }

    #[test]
    fn parses_column_form() {
        let req = AnalyticsRequest::from_payload(json!({
            "content": "x",
            "data": {"labels": ["a", "b"], "values": [1, 2]}
        }))
        .unwrap();
        assert!(matches!(req.data, Some(DataInput::Columns(_))));
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = AnalyticsRequest::from_payload(json!({"content": "x", "colour": "red"})).unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::InvalidRequest);
    }

    #[test]
    fn rejects_blank_content() {
        let err = AnalyticsRequest::from_payload(json!({"content": "   "})).unwrap_err();
        assert!(err.to_string().contains("content"));
    }

    #[test]
    fn rejects_missing_content() {
        assert!(AnalyticsRequest::from_payload(json!({"title": "t"})).is_err());
    }
}
