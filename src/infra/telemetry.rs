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
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
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
            "vetrina_cache_hit_total",
            Unit::Count,
            "Total number of cache hits."
        );
        describe_counter!(
            "vetrina_cache_miss_total",
            Unit::Count,
            "Total number of cache misses."
        );
        describe_counter!(
            "vetrina_cache_invalidated_total",
            Unit::Count,
            "Total number of cache entries removed by invalidation."
        );
        describe_counter!(
            "vetrina_invalidation_total",
            Unit::Count,
            "Total number of change events processed by the invalidation service."
        );
        describe_counter!(
            "vetrina_loader_coalesced_total",
            Unit::Count,
            "Total number of template loads served by joining an in-flight fetch."
        );
        describe_counter!(
            "vetrina_loader_fetch_leader_total",
            Unit::Count,
            "Total number of template loads that led an origin fetch."
        );
        describe_counter!(
            "vetrina_origin_fetch_total",
            Unit::Count,
            "Total number of origin fetches issued."
        );
        describe_histogram!(
            "vetrina_origin_fetch_ms",
            Unit::Milliseconds,
            "Origin fetch latency in milliseconds."
        );
        describe_counter!(
            "vetrina_edge_purge_failed_total",
            Unit::Count,
            "Total number of edge purge submissions that failed."
        );
        describe_histogram!(
            "vetrina_edge_purge_ms",
            Unit::Milliseconds,
            "Edge purge submission latency in milliseconds."
        );
    });
}
