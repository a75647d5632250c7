use tracing_subscriber::EnvFilter;

/// Installs the JSON log subscriber used by both Lambda binaries.
///
/// One JSON object per event on stdout, which CloudWatch Logs ingests as-is.
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .json()
        .flatten_event(true)
        .with_current_span(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .with_ansi(false)
        .init();
}
