//! `chartforge-executor`: renders a chart plan through ordered fallback steps.

pub mod executor;
pub mod renderers;
pub mod shape;

pub use executor::{failure_error, ExecutorConfig, GenerationExecutor, Step};
pub use renderers::{
    CommandRenderer, MockRenderer, RendererRegistry, SvgRenderer, COMMAND_METHOD, NATIVE_METHOD,
};
pub use shape::check_shape;
