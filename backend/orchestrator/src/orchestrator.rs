//! Sequences selection, data preparation and rendering for one request.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use chartforge_core::{AnalyticsRequest, AnalyticsResponse, ChartError, RenderOptions};
use chartforge_data::DataPreparer;
use chartforge_executor::{failure_error, GenerationExecutor};
use chartforge_planner::ChartSelector;

use crate::stats::{PipelineStats, StatsSnapshot};

/// Pipeline stage boundaries reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Started,
    Selecting,
    PreparingData,
    Rendering,
    Finalizing,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Started => "started",
            Stage::Selecting => "selecting",
            Stage::PreparingData => "preparing_data",
            Stage::Rendering => "rendering",
            Stage::Finalizing => "finalizing",
        }
    }

    pub fn progress(self) -> f32 {
        match self {
            Stage::Started => 0.1,
            Stage::Selecting => 0.25,
            Stage::PreparingData => 0.5,
            Stage::Rendering => 0.75,
            Stage::Finalizing => 0.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub status: Stage,
    pub message: String,
    pub progress: f32,
}

/// Receives stage-boundary updates. Must not block.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Discards progress.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Headroom kept above a stage's inner bounds so those bounds fire first.
const STAGE_SLACK: Duration = Duration::from_secs(1);

/// Configured stage deadlines. Selection and rendering are raised at run
/// time to cover the selector's and executor's own bounds.
#[derive(Debug, Clone, Copy)]
pub struct StageTimeouts {
    pub selection: Duration,
    pub preparation: Duration,
    pub rendering: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            selection: Duration::from_secs(15),
            preparation: Duration::from_secs(20),
            rendering: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Finished(AnalyticsResponse),
    /// Cancellation was observed; nothing should be delivered.
    Cancelled,
}

pub struct Orchestrator {
    selector: ChartSelector,
    preparer: DataPreparer,
    executor: GenerationExecutor,
    timeouts: StageTimeouts,
    stats: PipelineStats,
}

enum StageError {
    Failed(ChartError),
    Cancelled,
}

impl From<ChartError> for StageError {
    fn from(e: ChartError) -> Self {
        StageError::Failed(e)
    }
}

impl Orchestrator {
    pub fn new(
        selector: ChartSelector,
        preparer: DataPreparer,
        executor: GenerationExecutor,
        timeouts: StageTimeouts,
    ) -> Self {
        Self {
            selector,
            preparer,
            executor,
            timeouts,
            stats: PipelineStats::new(),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn has_advisor(&self) -> bool {
        self.selector.has_advisor()
    }

    pub fn render_methods(&self) -> Vec<String> {
        self.executor.methods()
    }

    #[instrument(skip_all, fields(intent = %request.content))]
    pub async fn run(
        &self,
        request: &AnalyticsRequest,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> RunOutcome {
        self.stats.record_started();
        let started = Instant::now();
        let outcome = self.pipeline(request, cancel, progress).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            RunOutcome::Cancelled => {
                self.stats.record_cancelled();
                info!(latency_ms, "Request cancelled");
            }
            RunOutcome::Finished(response) if response.success => {
                self.stats.record_success(latency_ms);
                info!(latency_ms, "Request completed");
            }
            RunOutcome::Finished(response) => {
                self.stats.record_failure(latency_ms);
                let code = response.error.as_ref().map(|e| e.code.as_str()).unwrap_or("UNKNOWN");
                warn!(latency_ms, code, "Request failed");
            }
        }
        outcome
    }

    async fn pipeline(
        &self,
        request: &AnalyticsRequest,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> RunOutcome {
        let report = |stage: Stage, message: &str| {
            progress.report(ProgressUpdate {
                status: stage,
                message: message.to_string(),
                progress: stage.progress(),
            })
        };

        report(Stage::Started, "Request accepted");
        if let Err(e) = request.validate() {
            return RunOutcome::Finished(AnalyticsResponse::failure(&e));
        }

        report(Stage::Selecting, "Choosing a chart type");
        let selection_limit = stage_limit(self.timeouts.selection, self.selector.budget());
        let plan = match guarded(cancel, "selection", selection_limit, self.selector.select(request)).await {
            Ok(plan) => plan,
            Err(StageError::Cancelled) => return RunOutcome::Cancelled,
            Err(StageError::Failed(e)) => return RunOutcome::Finished(AnalyticsResponse::failure(&e)),
        };
        info!(chart = %plan.primary, source = ?plan.source, confidence = plan.confidence, "Chart planned");

        report(Stage::PreparingData, "Preparing data");
        let dataset = match guarded(
            cancel,
            "data preparation",
            self.timeouts.preparation,
            self.preparer.prepare(request, &plan),
        )
        .await
        {
            Ok(dataset) => dataset,
            Err(StageError::Cancelled) => return RunOutcome::Cancelled,
            Err(StageError::Failed(e)) => {
                return RunOutcome::Finished(AnalyticsResponse::failure(&e).with_plan(plan));
            }
        };

        if cancel.is_cancelled() {
            return RunOutcome::Cancelled;
        }
        report(Stage::Rendering, "Rendering chart");
        let options = RenderOptions {
            title: request.title.clone(),
            format: request.output_format,
            theme: request.theme.clone(),
        };
        // Rendering is not interrupted by cancellation; its result is discarded instead.
        let rendering_limit = stage_limit(self.timeouts.rendering, self.executor.budget(&plan));
        let rendered = tokio::time::timeout(rendering_limit, self.executor.execute(&plan, &dataset, &options)).await;
        if cancel.is_cancelled() {
            return RunOutcome::Cancelled;
        }
        let result = match rendered {
            Ok(result) => result,
            Err(_) => {
                let e = ChartError::Timeout {
                    stage: "rendering".to_string(),
                    after_ms: rendering_limit.as_millis() as u64,
                };
                return RunOutcome::Finished(AnalyticsResponse::failure(&e).with_plan(plan).with_data(dataset));
            }
        };

        report(Stage::Finalizing, "Assembling response");
        if !result.success {
            let e = failure_error(&result);
            return RunOutcome::Finished(
                AnalyticsResponse::failure(&e)
                    .with_plan(plan)
                    .with_data(dataset)
                    .with_result(result),
            );
        }
        RunOutcome::Finished(AnalyticsResponse::success(plan, dataset, result))
    }
}

/// The configured deadline, raised when the stage's inner bounds need longer.
fn stage_limit(configured: Duration, inner_budget: Duration) -> Duration {
    if inner_budget.is_zero() {
        return configured;
    }
    let needed = inner_budget + STAGE_SLACK;
    if needed > configured {
        debug!(
            configured_ms = configured.as_millis() as u64,
            effective_ms = needed.as_millis() as u64,
            "Stage deadline raised to cover inner timeouts"
        );
    }
    configured.max(needed)
}

/// Run a stage under its deadline, abandoning it if the request is cancelled.
async fn guarded<T, F>(cancel: &CancellationToken, stage: &str, limit: Duration, fut: F) -> Result<T, StageError>
where
    F: Future<Output = Result<T, ChartError>>,
{
    if cancel.is_cancelled() {
        return Err(StageError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StageError::Cancelled),
        outcome = tokio::time::timeout(limit, fut) => match outcome {
            Ok(result) => result.map_err(StageError::from),
            Err(_) => Err(StageError::Failed(ChartError::Timeout {
                stage: stage.to_string(),
                after_ms: limit.as_millis() as u64,
            })),
        },
    }
}
