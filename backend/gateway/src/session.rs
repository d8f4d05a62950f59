//! Per-connection session state machine: `Open → Closing → Closed`.
//!
//! Each accepted request runs as an independent task tracked by the
//! session's [`TaskTracker`], keyed by correlation id in a mutex-guarded
//! in-flight map. Closing cancels every outstanding unit and waits for it.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use chartforge_core::{AnalyticsRequest, AnalyticsResponse, ChartError, ChartType, ErrorDetail};
use chartforge_orchestrator::{Orchestrator, ProgressSink, ProgressUpdate, RunOutcome};

use crate::session_registry::{RegistryError, SessionRegistry, SessionSummary};
use crate::ws_protocol::{Capabilities, InboundFrame, InboundKind, OutboundBody, OutboundFrame, ProtocolError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closing,
    Closed,
}

struct Inner {
    state: SessionState,
    in_flight: HashMap<String, CancellationToken>,
}

pub type FrameReceiver = mpsc::UnboundedReceiver<OutboundFrame>;

pub struct Session {
    id: String,
    user_id: Option<String>,
    inner: Mutex<Inner>,
    tracker: TaskTracker,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    orchestrator: Arc<Orchestrator>,
    shutdown: CancellationToken,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Cancelled when the server asks this session to close.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned map is still structurally valid.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn send(&self, correlation_id: Option<String>, body: OutboundBody) {
        let frame = OutboundFrame::new(&self.id, correlation_id, body);
        if self.outbound.send(frame).is_err() {
            debug!(session_id = %self.id, "Outbound channel closed; dropping frame");
        }
    }

    fn reject(&self, err: ProtocolError) {
        warn!(session_id = %self.id, correlation_id = ?err.correlation_id, reason = %err.message, "Rejected frame");
        let detail = err.detail();
        self.send(err.correlation_id, OutboundBody::Error(detail));
    }

    /// Handle one inbound text frame.
    pub fn handle_text(self: &Arc<Self>, text: &str) {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(err) => return self.reject(err),
        };

        if let Some(claimed) = frame.session_id.as_deref() {
            if claimed != self.id {
                return self.reject(ProtocolError::new(
                    frame.correlation_id,
                    format!("session_id '{claimed}' does not match this connection"),
                ));
            }
        }

        match frame.kind {
            InboundKind::Ping => self.send(frame.correlation_id, OutboundBody::Pong),
            InboundKind::Request => self.accept_request(frame),
        }
    }

    fn accept_request(self: &Arc<Self>, frame: InboundFrame) {
        let Some(correlation_id) = frame.correlation_id else {
            return self.reject(ProtocolError::new(None, "request frame needs a correlation_id"));
        };

        let request = match AnalyticsRequest::from_payload(frame.payload) {
            Ok(request) => request,
            Err(e) => return self.reject(ProtocolError::new(Some(correlation_id), e.to_string())),
        };

        let token = CancellationToken::new();
        {
            let mut inner = self.lock();
            if inner.state != SessionState::Open {
                drop(inner);
                return self.reject(ProtocolError::new(Some(correlation_id), "session is closing"));
            }
            if inner.in_flight.contains_key(&correlation_id) {
                drop(inner);
                return self.reject(ProtocolError::new(
                    Some(correlation_id.clone()),
                    format!("correlation_id '{correlation_id}' is already in flight"),
                ));
            }
            inner.in_flight.insert(correlation_id.clone(), token.clone());
        }

        info!(session_id = %self.id, correlation_id = %correlation_id, "Request accepted");
        let session = Arc::clone(self);
        self.tracker.spawn(async move {
            session.run_unit(correlation_id, request, token).await;
        });
    }

    async fn run_unit(self: Arc<Self>, correlation_id: String, request: AnalyticsRequest, token: CancellationToken) {
        let sink = StatusSink {
            session: Arc::clone(&self),
            correlation_id: correlation_id.clone(),
            token: token.clone(),
        };

        let outcome = AssertUnwindSafe(self.orchestrator.run(&request, &token, &sink))
            .catch_unwind()
            .await;

        let response = match outcome {
            Ok(RunOutcome::Finished(response)) => Some(response),
            Ok(RunOutcome::Cancelled) => None,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(session_id = %self.id, correlation_id = %correlation_id, reason = %reason, "Request task panicked");
                Some(AnalyticsResponse::failure(&ChartError::Internal(
                    "request processing failed unexpectedly".to_string(),
                )))
            }
        };

        self.finish(correlation_id, &token, response);
    }

    /// Emit the terminal response (if still wanted) and drop the registration.
    fn finish(&self, correlation_id: String, token: &CancellationToken, response: Option<AnalyticsResponse>) {
        let mut inner = self.lock();
        inner.in_flight.remove(&correlation_id);
        let deliver = inner.state == SessionState::Open && !token.is_cancelled();
        match response {
            Some(response) if deliver => {
                // Sent under the lock so close() cannot interleave.
                self.send(Some(correlation_id), OutboundBody::Response(Box::new(response)));
            }
            _ => debug!(session_id = %self.id, correlation_id = %correlation_id, "Discarded result of cancelled request"),
        }
    }

    /// Cancel every in-flight request and wait for all of them to exit.
    pub async fn close(&self) {
        let cancelled = {
            let mut inner = self.lock();
            if inner.state != SessionState::Open {
                return;
            }
            inner.state = SessionState::Closing;
            for token in inner.in_flight.values() {
                token.cancel();
            }
            inner.in_flight.len()
        };
        info!(session_id = %self.id, cancelled, "Session closing");

        self.tracker.close();
        self.tracker.wait().await;

        self.lock().state = SessionState::Closed;
        info!(session_id = %self.id, "Session closed");
    }
}

/// Forwards stage progress as `status` frames until the request is cancelled.
struct StatusSink {
    session: Arc<Session>,
    correlation_id: String,
    token: CancellationToken,
}

impl ProgressSink for StatusSink {
    fn report(&self, update: ProgressUpdate) {
        if self.token.is_cancelled() {
            return;
        }
        self.session.send(Some(self.correlation_id.clone()), OutboundBody::Status(update));
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub max_connections: usize,
    pub synthetic_data: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_connections: 100,
            synthetic_data: true,
        }
    }
}

/// Owns the session registry and opens sessions wired to the orchestrator.
pub struct SessionManager {
    orchestrator: Arc<Orchestrator>,
    registry: SessionRegistry,
    config: SessionConfig,
    shutdown: CancellationToken,
}

impl SessionManager {
    pub fn new(orchestrator: Arc<Orchestrator>, config: SessionConfig) -> Self {
        Self {
            orchestrator,
            registry: SessionRegistry::new(config.max_connections),
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            chart_types: ChartType::ALL.iter().map(|c| c.as_str()).collect(),
            output_formats: vec!["svg", "png"],
            render_methods: self.orchestrator.render_methods(),
            advisor: self.orchestrator.has_advisor(),
            synthetic_data: self.config.synthetic_data,
        }
    }

    /// Register a session and queue its `connection_ack`.
    pub async fn open(
        &self,
        session_id: Option<String>,
        user_id: Option<String>,
    ) -> Result<(Arc<Session>, FrameReceiver), RegistryError> {
        let id = session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let shutdown = self.shutdown.child_token();
        self.registry.register(id.clone(), user_id.clone(), shutdown.clone()).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Session {
            id,
            user_id,
            inner: Mutex::new(Inner {
                state: SessionState::Open,
                in_flight: HashMap::new(),
            }),
            tracker: TaskTracker::new(),
            outbound: tx,
            orchestrator: Arc::clone(&self.orchestrator),
            shutdown,
        });
        session.send(None, OutboundBody::ConnectionAck(self.capabilities()));
        info!(session_id = %session.id, user_id = ?session.user_id, "Session opened");
        Ok((session, rx))
    }

    /// Close a session and drop it from the registry.
    pub async fn disconnect(&self, session: &Session) {
        session.close().await;
        self.registry.unregister(session.id()).await;
    }

    pub async fn active_sessions(&self) -> usize {
        self.registry.count().await
    }

    pub async fn sessions(&self) -> Vec<SessionSummary> {
        self.registry.list().await
    }

    /// Signal every session to close; connection loops call [`Self::disconnect`].
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let signalled = self.registry.shutdown_all().await;
        info!(sessions = signalled, "Session shutdown requested");
    }
}

/// Wire detail for a refused connection.
pub fn refusal_detail(err: &RegistryError) -> ErrorDetail {
    ErrorDetail::from(&ChartError::InvalidRequest(err.to_string()))
}
