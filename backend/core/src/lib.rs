pub mod chart;
pub mod dataset;
pub mod error;
pub mod plan;
pub mod request;
pub mod response;
pub mod traits;

pub use chart::{AxisLabels, ChartFamily, ChartType, UnknownChartType};
pub use dataset::{Dataset, Provenance, SeriesPoints, Statistics, Trend};
pub use error::{ChartError, ErrorCode, ErrorDetail};
pub use plan::{ChartPlan, SelectionSource};
pub use request::{AnalyticsRequest, DataColumns, DataInput, DataRecord, OutputFormat, Theme};
pub use response::{AnalyticsResponse, Artifact, AttemptRecord, GenerationResult};
pub use traits::{
    Advisor, AdvisorError, AdvisorSuggestion, LlmProvider, LlmRequest, LlmResponse,
    RenderError, RenderOptions, Renderer,
};
