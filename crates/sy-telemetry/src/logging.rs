use tracing_subscriber::{EnvFilter, fmt};

/// Output shape for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines for terminals and test output.
    #[default]
    Text,
    /// One JSON object per event, for log shippers.
    Json,
}

/// Install the process-wide tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set, otherwise from `default_level`
/// (e.g. "info", "sy_dispatch=debug,warn"). Safe to call more than once:
/// later calls leave the installed subscriber alone, so tests can each ask
/// for logging without coordinating.
pub fn init_logging(service_name: &str, default_level: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true);

    match format {
        LogFormat::Text => builder.try_init().ok(),
        LogFormat::Json => builder.json().try_init().ok(),
    };

    tracing::info!(service = service_name, format = ?format, "logging initialised");
}

/// Shorthand for the common text-format setup.
pub fn init_text_logging(service_name: &str, default_level: &str) {
    init_logging(service_name, default_level, LogFormat::Text);
}
