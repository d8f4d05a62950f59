//! External-command renderer: the chart request goes to the child's stdin as
//! JSON and the artifact bytes come back on stdout.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use chartforge_core::{
    Artifact, ChartType, Dataset, OutputFormat, RenderError, RenderOptions, Renderer, Theme,
};

pub const COMMAND_METHOD: &str = "command";

/// Output beyond this is treated as a runaway renderer.
const MAX_OUTPUT_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
}

#[derive(Serialize)]
struct RenderJob<'a> {
    chart_type: ChartType,
    format: OutputFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    theme: Option<&'a Theme>,
    x_label: &'static str,
    y_label: &'static str,
    data: &'a Dataset,
}

impl CommandRenderer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }

    async fn run(&self, job: Vec<u8>) -> Result<Vec<u8>, RenderError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RenderError::Failed(format!("failed to start '{}': {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RenderError::Failed("renderer stdin unavailable".into()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| RenderError::Failed("renderer stdout unavailable".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| RenderError::Failed("renderer stderr unavailable".into()))?;

        // Feed stdin while draining both output pipes so a streaming child never blocks.
        let send = async move {
            let written = stdin.write_all(&job).await;
            drop(stdin);
            written
        };
        let mut limited = (&mut stdout).take(MAX_OUTPUT_BYTES as u64 + 1);
        let mut out = Vec::new();
        let mut err = Vec::new();
        let (sent, read_out, _) = tokio::join!(send, limited.read_to_end(&mut out), stderr.read_to_end(&mut err));

        // A renderer may exit without reading its input; its exit status decides.
        if let Err(e) = sent {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(RenderError::Failed(format!("failed to send render job: {e}")));
            }
            debug!(program = %self.program, "Renderer closed stdin early");
        }
        read_out.map_err(|e| RenderError::Failed(format!("failed to read renderer output: {e}")))?;

        let status = child
            .wait()
            .await
            .map_err(|e| RenderError::Failed(format!("renderer did not exit cleanly: {e}")))?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&err);
            warn!(program = %self.program, code = ?status.code(), "Renderer command failed");
            return Err(RenderError::Failed(format!(
                "'{}' exited with {}: {}",
                self.program,
                status.code().map_or_else(|| "signal".to_string(), |c| c.to_string()),
                stderr.trim()
            )));
        }
        if out.len() > MAX_OUTPUT_BYTES {
            return Err(RenderError::Failed("renderer output exceeds size limit".into()));
        }
        if out.is_empty() {
            return Err(RenderError::Failed("renderer produced no output".into()));
        }
        Ok(out)
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    fn method(&self) -> &str {
        COMMAND_METHOD
    }

    async fn render(
        &self,
        chart: ChartType,
        dataset: &Dataset,
        options: &RenderOptions,
        timeout: Duration,
    ) -> Result<Artifact, RenderError> {
        let axes = chart.axis_labels();
        let job = RenderJob {
            chart_type: chart,
            format: options.format,
            title: options.title.as_deref(),
            theme: options.theme.as_ref(),
            x_label: axes.x,
            y_label: axes.y,
            data: dataset,
        };
        let job = serde_json::to_vec(&job)
            .map_err(|e| RenderError::Failed(format!("failed to encode render job: {e}")))?;

        debug!(program = %self.program, chart = %chart, bytes = job.len(), "Spawning renderer command");
        // Dropping the future on timeout kills the child.
        let bytes = tokio::time::timeout(timeout, self.run(job))
            .await
            .map_err(|_| RenderError::Timeout(timeout))??;

        info!(program = %self.program, chart = %chart, bytes = bytes.len(), "Renderer command finished");
        Ok(Artifact {
            mime_type: options.format.mime_type().to_string(),
            encoding: "base64".to_string(),
            content: STANDARD.encode(bytes),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use chartforge_core::Provenance;

    fn dataset() -> Dataset {
        Dataset::new(vec!["a".into(), "b".into()], vec![1.0, 2.0], Provenance::User)
    }

    fn sh(script: &str) -> CommandRenderer {
        CommandRenderer::new("sh", vec!["-c".into(), script.into()])
    }

    #[tokio::test]
    async fn echoes_job_through_child_process() {
        let artifact = sh("cat")
            .render(ChartType::PieChart, &dataset(), &RenderOptions::default(), Duration::from_secs(5))
            .await
            .unwrap();
        let job: serde_json::Value = serde_json::from_slice(&STANDARD.decode(artifact.content).unwrap()).unwrap();
        assert_eq!(job["chart_type"], "pie_chart");
        assert_eq!(job["format"], "svg");
        assert_eq!(job["data"]["values"][1], 2.0);
        assert_eq!(artifact.mime_type, "image/svg+xml");
    }

    #[tokio::test]
    async fn streams_jobs_larger_than_a_pipe_buffer() {
        let n = 4000;
        let labels = (0..n).map(|i| format!("category-label-{i:05}")).collect();
        let values = (0..n).map(|i| i as f64 * 1.5).collect();
        let big = Dataset::new(labels, values, Provenance::User);

        let artifact = sh("cat")
            .render(ChartType::LineChart, &big, &RenderOptions::default(), Duration::from_secs(10))
            .await
            .unwrap();
        let bytes = STANDARD.decode(artifact.content).unwrap();
        assert!(bytes.len() > 64 * 1024, "job was only {} bytes", bytes.len());
        let job: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(job["data"]["labels"].as_array().unwrap().len(), n);
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_failure() {
        let err = sh("echo broken >&2; exit 3")
            .render(ChartType::PieChart, &dataset(), &RenderOptions::default(), Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            RenderError::Failed(msg) => assert!(msg.contains("broken"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let err = sh("sleep 5")
            .render(ChartType::PieChart, &dataset(), &RenderOptions::default(), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Timeout(_)));
    }

    #[tokio::test]
    async fn missing_program_fails_to_start() {
        let err = CommandRenderer::new("/nonexistent/chartforge-renderer", vec![])
            .render(ChartType::PieChart, &dataset(), &RenderOptions::default(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Failed(_)));
    }
}
