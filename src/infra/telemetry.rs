use std::{io, sync::Once};

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
///
/// Events go to stderr; stdout belongs to the terminal browser.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(io::stderr)
            .with_target(true)
            .boxed(),
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
            "travelora_content_cache_hit_total",
            Unit::Count,
            "Content queries answered from the revalidation cache."
        );
        describe_counter!(
            "travelora_content_cache_miss_total",
            Unit::Count,
            "Content queries forwarded to the content store."
        );
        describe_counter!(
            "travelora_content_query_error_total",
            Unit::Count,
            "Content store queries that failed."
        );
        describe_histogram!(
            "travelora_content_query_ms",
            Unit::Milliseconds,
            "Content store round-trip latency in milliseconds."
        );
        describe_counter!(
            "travelora_dropped_records_total",
            Unit::Count,
            "Post records dropped for missing or malformed fields."
        );
    });
}
