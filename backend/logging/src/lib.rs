//! Structured logging for ChartForge.
//!
//! Console plus daily-rolling JSON file output, and secret redaction for
//! values that get logged.

pub mod logger;
pub mod redact;

pub use logger::{init_logger, LogSettings};
pub use redact::{redact_sensitive_data, redact_value};
