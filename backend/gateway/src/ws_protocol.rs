//! WebSocket frame shapes for the ChartForge gateway.
//!
//! Inbound frames are validated strictly into [`InboundFrame`]; anything that
//! does not fit becomes a [`ProtocolError`] answered with an `error` frame.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use chartforge_core::{AnalyticsResponse, ErrorCode, ErrorDetail};
use chartforge_orchestrator::ProgressUpdate;

#[derive(Debug, Clone, PartialEq)]
pub enum InboundKind {
    Request,
    Ping,
}

/// A validated client frame.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub message_id: Option<String>,
    /// Falls back to `message_id` when the client omits it.
    pub correlation_id: Option<String>,
    pub session_id: Option<String>,
    pub kind: InboundKind,
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    message_id: Option<String>,
    correlation_id: Option<String>,
    session_id: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    subtype: Option<String>,
    #[serde(default)]
    payload: Value,
}

/// A frame that could not be accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolError {
    pub correlation_id: Option<String>,
    pub message: String,
}

impl ProtocolError {
    pub fn new(correlation_id: Option<String>, message: impl Into<String>) -> Self {
        Self { correlation_id, message: message.into() }
    }

    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail::new(ErrorCode::InvalidRequest, self.message.clone())
    }
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawFrame = serde_json::from_str(text)
            .map_err(|e| ProtocolError::new(None, format!("malformed frame: {e}")))?;

        let correlation_id = raw
            .correlation_id
            .filter(|id| !id.trim().is_empty())
            .or_else(|| raw.message_id.clone().filter(|id| !id.trim().is_empty()));

        let kind = match (raw.kind.as_str(), raw.subtype.as_deref()) {
            ("request" | "analytics_request", _) => InboundKind::Request,
            ("ping", _) | ("control", Some("ping")) => InboundKind::Ping,
            (other, _) => {
                return Err(ProtocolError::new(correlation_id, format!("unknown frame type '{other}'")));
            }
        };

        if kind == InboundKind::Request && correlation_id.is_none() {
            return Err(ProtocolError::new(None, "request frame needs a correlation_id or message_id"));
        }

        Ok(Self {
            message_id: raw.message_id,
            correlation_id,
            session_id: raw.session_id,
            kind,
            payload: raw.payload,
        })
    }
}

/// Features advertised in `connection_ack`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Capabilities {
    pub chart_types: Vec<&'static str>,
    pub output_formats: Vec<&'static str>,
    pub render_methods: Vec<String>,
    pub advisor: bool,
    pub synthetic_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum OutboundBody {
    ConnectionAck(Capabilities),
    Status(ProgressUpdate),
    Response(Box<AnalyticsResponse>),
    Error(ErrorDetail),
    Pong,
}

/// Every server frame carries a fresh message id, the session id and a timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundFrame {
    pub message_id: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub body: OutboundBody,
}

impl OutboundFrame {
    pub fn new(session_id: &str, correlation_id: Option<String>, body: OutboundBody) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            correlation_id,
            timestamp: Utc::now(),
            body,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.body {
            OutboundBody::ConnectionAck(_) => "connection_ack",
            OutboundBody::Status(_) => "status",
            OutboundBody::Response(_) => "response",
            OutboundBody::Error(_) => "error",
            OutboundBody::Pong => "pong",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.body, OutboundBody::Response(_))
    }
}
