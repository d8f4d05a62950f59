//! `chartforge-orchestrator`: runs one analytics request through selection,
//! data preparation and rendering.

pub mod orchestrator;
pub mod stats;

pub use orchestrator::{NoProgress, Orchestrator, ProgressSink, ProgressUpdate, RunOutcome, Stage, StageTimeouts};
pub use stats::{PipelineStats, StatsSnapshot};
