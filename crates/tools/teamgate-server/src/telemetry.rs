use crate::config::LoggingConfig;
use anyhow::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `filter` when set.
pub fn init_tracing(logging: &LoggingConfig, filter: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(filter))?;
    let registry = tracing_subscriber::registry().with(env_filter);

    match logging.format.to_lowercase().as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()?,
        "compact" => registry
            .with(tracing_subscriber::fmt::layer().compact().with_target(false))
            .try_init()?,
        _ => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()?,
    }

    Ok(())
}
