//! Scripted [`Advisor`] double for tests across the workspace.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chartforge_core::{Advisor, AdvisorError, AdvisorSuggestion};

#[derive(Debug, Clone)]
enum Script {
    Suggest(AdvisorSuggestion),
    Fail,
    NotDispatched,
}

#[derive(Debug)]
pub struct MockAdvisor {
    script: Script,
    labels: Option<Vec<String>>,
    delay: Duration,
    suggest_calls: AtomicUsize,
    label_calls: AtomicUsize,
}

impl MockAdvisor {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            labels: None,
            delay: Duration::ZERO,
            suggest_calls: AtomicUsize::new(0),
            label_calls: AtomicUsize::new(0),
        }
    }

    pub fn suggesting(chart_type: &str, confidence: f32) -> Self {
        Self::with_script(Script::Suggest(AdvisorSuggestion {
            chart_type: chart_type.to_string(),
            secondary: None,
            confidence,
            rationale: Some(format!("scripted {chart_type}")),
        }))
    }

    pub fn failing() -> Self {
        Self::with_script(Script::Fail)
    }

    pub fn not_dispatched() -> Self {
        Self::with_script(Script::NotDispatched)
    }

    pub fn with_secondary(mut self, secondary: &str) -> Self {
        if let Script::Suggest(s) = &mut self.script {
            s.secondary = Some(secondary.to_string());
        }
        self
    }

    /// Labels returned verbatim from `enhance_labels`.
    pub fn with_labels(mut self, labels: &[&str]) -> Self {
        self.labels = Some(labels.iter().map(|l| l.to_string()).collect());
        self
    }

    /// Sleep before answering; callers' timeouts still apply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn suggest_calls(&self) -> usize {
        self.suggest_calls.load(Ordering::SeqCst)
    }

    pub fn label_calls(&self) -> usize {
        self.label_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self, timeout: Duration) -> Result<(), AdvisorError> {
        if self.delay.is_zero() {
            return Ok(());
        }
        if self.delay > timeout {
            tokio::time::sleep(timeout).await;
            return Err(AdvisorError::Unavailable(format!("timed out after {timeout:?}")));
        }
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

#[async_trait]
impl Advisor for MockAdvisor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn suggest(&self, _intent: &str, timeout: Duration) -> Result<AdvisorSuggestion, AdvisorError> {
        self.suggest_calls.fetch_add(1, Ordering::SeqCst);
        if let Script::NotDispatched = self.script {
            return Err(AdvisorError::NotDispatched("scripted refusal".into()));
        }
        self.pause(timeout).await?;
        match &self.script {
            Script::Suggest(s) => Ok(s.clone()),
            Script::Fail => Err(AdvisorError::Unavailable("scripted failure".into())),
            Script::NotDispatched => Err(AdvisorError::NotDispatched("scripted refusal".into())),
        }
    }

    async fn enhance_labels(
        &self,
        _intent: &str,
        _labels: &[String],
        timeout: Duration,
    ) -> Result<Vec<String>, AdvisorError> {
        self.label_calls.fetch_add(1, Ordering::SeqCst);
        self.pause(timeout).await?;
        self.labels
            .clone()
            .ok_or_else(|| AdvisorError::Unavailable("no scripted labels".into()))
    }
}
