//! Tracing subscriber setup for the server binary.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{LoggingConfig, RallyError};

/// Installs the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `config.level` is the filter.
/// Output is human-readable unless `config.json_format` is on.
///
/// # Errors
/// [`RallyError::Logging`] if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), RallyError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_thread_ids(true)
                    .with_target(true),
            )
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_thread_ids(true).with_target(false))
            .try_init()?;
    }

    tracing::info!(level = %config.level, json = config.json_format, "logging initialized");
    Ok(())
}
