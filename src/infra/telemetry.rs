use std::sync::Once;

use metrics::{Unit, describe_counter};
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

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "quire_posts_published_total",
            Unit::Count,
            "Posts that entered the published state, labelled by trigger."
        );
        describe_counter!(
            "quire_search_queries_total",
            Unit::Count,
            "Non-empty search queries answered from the substring index."
        );
        describe_counter!(
            "quire_cache_hit_total",
            Unit::Count,
            "Read cache hits, labelled by namespace."
        );
        describe_counter!(
            "quire_cache_miss_total",
            Unit::Count,
            "Read cache misses, labelled by namespace."
        );
        describe_counter!(
            "quire_notifications_enqueued_total",
            Unit::Count,
            "Publish notifications handed to the job queue."
        );
    });
}
