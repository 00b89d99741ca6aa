use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::from(logging.level).into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "schedario_cache_detail_hit_total",
            Unit::Count,
            "Total number of detail slot hits."
        );
        describe_counter!(
            "schedario_cache_detail_miss_total",
            Unit::Count,
            "Total number of detail slot misses."
        );
        describe_counter!(
            "schedario_cache_collection_hit_total",
            Unit::Count,
            "Total number of collection slot hits."
        );
        describe_counter!(
            "schedario_cache_collection_miss_total",
            Unit::Count,
            "Total number of collection slot misses."
        );
        describe_counter!(
            "schedario_cache_evict_total",
            Unit::Count,
            "Total number of slots evicted at capacity."
        );
        describe_histogram!(
            "schedario_cache_reconcile_ms",
            Unit::Milliseconds,
            "Mutation reconciliation latency in milliseconds."
        );
        describe_histogram!(
            "schedario_cache_sweep_ms",
            Unit::Milliseconds,
            "Idle-eviction sweep latency in milliseconds."
        );
    });
}
