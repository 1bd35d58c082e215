//! Subscriber setup for binaries and tests that want log output.
//!
//! Library code only emits through `tracing` macros; installing a
//! subscriber is left to the application unless it opts into this helper.

#[cfg(feature = "tracing-basic")]
use tracing_subscriber::EnvFilter;

/// Output format for [`init_tracing`]
#[cfg(feature = "tracing-basic")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Install a global subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter`.
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
#[cfg(feature = "tracing-basic")]
pub fn init_tracing(default_filter: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = match format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(false)
            .try_init(),
    };
}
