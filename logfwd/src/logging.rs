use crate::config::{LogFormat, LoggingConfig};
use sentry::types::{Dsn, ParseDsnError};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global subscriber, reporting to Sentry when a DSN is set.
///
/// The returned guard flushes pending Sentry events when dropped.
pub fn init(config: &LoggingConfig) -> Result<Option<sentry::ClientInitGuard>, ParseDsnError> {
    let sentry_guard = match config.sentry_dsn.as_deref() {
        Some(dsn) => {
            let dsn: Dsn = dsn.parse()?;
            Some(sentry::init(sentry::ClientOptions {
                dsn: Some(dsn),
                release: sentry::release_name!(),
                ..Default::default()
            }))
        }
        None => None,
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let fmt_layer = match config.format {
        LogFormat::Json => fmt::layer().json().boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
    };
    let sentry_layer = sentry_guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(sentry_layer)
        .init();

    Ok(sentry_guard)
}
