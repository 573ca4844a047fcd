//! Logging integration for schemata.
//!
//! Configures [`tracing`]-based logging from [`Settings`](crate::settings::Settings)
//! and provides spans for long-running catalog operations.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The log level is read from `settings.log_level` and accepts any
/// `EnvFilter` directive (e.g. "debug" or "schemata_sqlite=trace,info").
/// In debug mode a pretty, human-readable format is used; otherwise output is
/// structured JSON. Calling this more than once is harmless.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for a single catalog operation (introspection,
/// planning), tagged with the database or snapshot it works on.
///
/// ```
/// use schemata_core::logging::catalog_span;
///
/// let span = catalog_span("introspect", "app.db");
/// let _guard = span.enter();
/// tracing::info!("reading tables");
/// ```
pub fn catalog_span(operation: &str, source: &str) -> tracing::Span {
    tracing::info_span!("catalog", op = operation, source = source)
}
