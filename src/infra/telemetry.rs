use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::feed::METRIC_FEED_COMPOSE_MS;
use crate::application::posts::{METRIC_COMMENTS_CREATED, METRIC_POSTS_CREATED};
use crate::cache::{METRIC_PAGE_CACHE_CLEAR, METRIC_PAGE_CACHE_HIT, METRIC_PAGE_CACHE_MISS};
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
            METRIC_PAGE_CACHE_HIT,
            Unit::Count,
            "Total number of page cache hits."
        );
        describe_counter!(
            METRIC_PAGE_CACHE_MISS,
            Unit::Count,
            "Total number of page cache misses, including expired entries."
        );
        describe_counter!(
            METRIC_PAGE_CACHE_CLEAR,
            Unit::Count,
            "Total number of full page cache clears."
        );
        describe_counter!(
            METRIC_POSTS_CREATED,
            Unit::Count,
            "Total number of posts published."
        );
        describe_counter!(
            METRIC_COMMENTS_CREATED,
            Unit::Count,
            "Total number of comments added."
        );
        describe_histogram!(
            METRIC_FEED_COMPOSE_MS,
            Unit::Milliseconds,
            "Feed page composition latency in milliseconds."
        );
    });
}
