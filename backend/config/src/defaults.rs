//! Config defaults: applies sensible default values to parsed config.

use crate::schema::{
    AdvisorConfig, BucketSettings, ChartForgeConfig, DataConfig, ExecutorSettings, LoggingConfig,
    PipelineConfig, QuotaConfig, SelectorSettings, ServerConfig,
};

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_CONNECTIONS: usize = 100;

pub const DEFAULT_ADVISOR_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_ADVISOR_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_LABEL_TIMEOUT_MS: u64 = 5_000;

pub const DEFAULT_SELECTION_CAPACITY: f64 = 60.0;
pub const DEFAULT_SELECTION_REFILL: f64 = 1.0;
pub const DEFAULT_LABELS_CAPACITY: f64 = 30.0;
pub const DEFAULT_LABELS_REFILL: f64 = 0.5;
pub const DEFAULT_QUOTA_MODE: &str = "blocking";
pub const DEFAULT_QUOTA_MAX_WAIT_MS: u64 = 2_000;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.4;
pub const DEFAULT_MAX_DATA_POINTS: usize = 1_000;

pub const DEFAULT_RENDER_METHOD: &str = "native";
pub const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 30_000;

pub const DEFAULT_SELECTION_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_PREPARATION_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_RENDERING_TIMEOUT_MS: u64 = 60_000;

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: ChartForgeConfig) -> ChartForgeConfig {
    let config = apply_server_defaults(config);
    let config = apply_advisor_defaults(config);
    let config = apply_quota_defaults(config);
    let config = apply_selector_defaults(config);
    let config = apply_data_defaults(config);
    let config = apply_executor_defaults(config);
    let config = apply_pipeline_defaults(config);
    apply_logging_defaults(config)
}

fn apply_server_defaults(mut config: ChartForgeConfig) -> ChartForgeConfig {
    let server = config.server.get_or_insert_with(ServerConfig::default);
    server.bind.get_or_insert_with(|| DEFAULT_BIND.to_string());
    server.port.get_or_insert(DEFAULT_PORT);
    server.max_connections.get_or_insert(DEFAULT_MAX_CONNECTIONS);
    config
}

fn apply_advisor_defaults(mut config: ChartForgeConfig) -> ChartForgeConfig {
    let advisor = config.advisor.get_or_insert_with(AdvisorConfig::default);
    advisor.enabled.get_or_insert(true);
    advisor.model.get_or_insert_with(|| DEFAULT_ADVISOR_MODEL.to_string());
    advisor.timeout_ms.get_or_insert(DEFAULT_ADVISOR_TIMEOUT_MS);
    advisor.label_timeout_ms.get_or_insert(DEFAULT_LABEL_TIMEOUT_MS);
    advisor.max_tokens.get_or_insert(400);
    advisor.temperature.get_or_insert(0.1);
    config
}

fn apply_quota_defaults(mut config: ChartForgeConfig) -> ChartForgeConfig {
    let quota = config.quota.get_or_insert_with(QuotaConfig::default);
    fill_bucket(quota.selection.get_or_insert_with(BucketSettings::default), DEFAULT_SELECTION_CAPACITY, DEFAULT_SELECTION_REFILL);
    fill_bucket(quota.labels.get_or_insert_with(BucketSettings::default), DEFAULT_LABELS_CAPACITY, DEFAULT_LABELS_REFILL);
    quota.mode.get_or_insert_with(|| DEFAULT_QUOTA_MODE.to_string());
    quota.max_wait_ms.get_or_insert(DEFAULT_QUOTA_MAX_WAIT_MS);
    config
}

fn fill_bucket(bucket: &mut BucketSettings, capacity: f64, refill: f64) {
    bucket.capacity.get_or_insert(capacity);
    bucket.refill_per_sec.get_or_insert(refill);
}

fn apply_selector_defaults(mut config: ChartForgeConfig) -> ChartForgeConfig {
    let selector = config.selector.get_or_insert_with(SelectorSettings::default);
    selector.confidence_threshold.get_or_insert(DEFAULT_CONFIDENCE_THRESHOLD);
    config
}

fn apply_data_defaults(mut config: ChartForgeConfig) -> ChartForgeConfig {
    let data = config.data.get_or_insert_with(DataConfig::default);
    data.allow_synthetic.get_or_insert(true);
    data.max_data_points.get_or_insert(DEFAULT_MAX_DATA_POINTS);
    config
}

fn apply_executor_defaults(mut config: ChartForgeConfig) -> ChartForgeConfig {
    let executor = config.executor.get_or_insert_with(ExecutorSettings::default);
    executor.preferred_method.get_or_insert_with(|| DEFAULT_RENDER_METHOD.to_string());
    executor.attempt_timeout_ms.get_or_insert(DEFAULT_ATTEMPT_TIMEOUT_MS);
    executor.width.get_or_insert(800);
    executor.height.get_or_insert(500);
    // A configured command renderer becomes the last-resort method.
    if executor.command.is_some() && executor.alternate_method.is_none() {
        executor.alternate_method = Some("command".to_string());
    }
    config
}

fn apply_pipeline_defaults(mut config: ChartForgeConfig) -> ChartForgeConfig {
    let pipeline = config.pipeline.get_or_insert_with(PipelineConfig::default);
    pipeline.selection_timeout_ms.get_or_insert(DEFAULT_SELECTION_TIMEOUT_MS);
    pipeline.preparation_timeout_ms.get_or_insert(DEFAULT_PREPARATION_TIMEOUT_MS);
    pipeline.rendering_timeout_ms.get_or_insert(DEFAULT_RENDERING_TIMEOUT_MS);
    config
}

fn apply_logging_defaults(mut config: ChartForgeConfig) -> ChartForgeConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging.level.get_or_insert_with(|| "info".to_string());
    logging.file.get_or_insert(false);
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CommandSettings;

    #[test]
    fn fills_every_section() {
        let cfg = apply_all_defaults(ChartForgeConfig::default());
        assert_eq!(cfg.port(), DEFAULT_PORT);
        assert_eq!(cfg.advisor.unwrap().timeout_ms, Some(DEFAULT_ADVISOR_TIMEOUT_MS));
        let quota = cfg.quota.unwrap();
        assert_eq!(quota.selection.unwrap().capacity, Some(DEFAULT_SELECTION_CAPACITY));
        assert_eq!(quota.mode.as_deref(), Some("blocking"));
        assert_eq!(cfg.pipeline.unwrap().rendering_timeout_ms, Some(DEFAULT_RENDERING_TIMEOUT_MS));
        assert_eq!(cfg.executor.unwrap().alternate_method, None);
    }

    #[test]
    fn does_not_override_user_values() {
        let mut cfg = ChartForgeConfig::default();
        cfg.selector = Some(SelectorSettings {
            confidence_threshold: Some(0.7),
            ..Default::default()
        });
        cfg.quota = Some(QuotaConfig {
            labels: Some(BucketSettings {
                capacity: Some(3.0),
                refill_per_sec: None,
            }),
            ..Default::default()
        });
        let cfg = apply_all_defaults(cfg);
        assert_eq!(cfg.selector.unwrap().confidence_threshold, Some(0.7));
        let labels = cfg.quota.unwrap().labels.unwrap();
        assert_eq!(labels.capacity, Some(3.0));
        assert_eq!(labels.refill_per_sec, Some(DEFAULT_LABELS_REFILL));
    }

    #[test]
    fn command_renderer_becomes_alternate() {
        let mut cfg = ChartForgeConfig::default();
        cfg.executor = Some(ExecutorSettings {
            command: Some(CommandSettings {
                program: "render".into(),
                args: vec![],
            }),
            ..Default::default()
        });
        let cfg = apply_all_defaults(cfg);
        assert_eq!(cfg.executor.unwrap().alternate_method.as_deref(), Some("command"));
    }
}
