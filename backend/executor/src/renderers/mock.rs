use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chartforge_core::{Artifact, ChartType, Dataset, RenderError, RenderOptions, Renderer};

/// Scripted renderer for tests: fails or stalls on chosen chart types and
/// records every call.
pub struct MockRenderer {
    method: String,
    failing: HashSet<ChartType>,
    stalling: HashSet<ChartType>,
    delay: Duration,
    calls: Mutex<Vec<ChartType>>,
}

impl MockRenderer {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            failing: HashSet::new(),
            stalling: HashSet::new(),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, chart: ChartType) -> Self {
        self.failing.insert(chart);
        self
    }

    /// Sleep past any deadline when asked to draw `chart`.
    pub fn stalling_on(mut self, chart: ChartType) -> Self {
        self.stalling.insert(chart);
        self
    }

    /// Delay every successful render.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<ChartType> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    fn method(&self) -> &str {
        &self.method
    }

    async fn render(
        &self,
        chart: ChartType,
        dataset: &Dataset,
        options: &RenderOptions,
        _timeout: Duration,
    ) -> Result<Artifact, RenderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(chart);
        }
        if self.stalling.contains(&chart) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.failing.contains(&chart) {
            return Err(RenderError::Failed(format!("{} refuses {chart}", self.method)));
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(Artifact {
            mime_type: options.format.mime_type().to_string(),
            encoding: "base64".to_string(),
            content: format!("{}:{chart}:{}", self.method, dataset.len()),
        })
    }
}
