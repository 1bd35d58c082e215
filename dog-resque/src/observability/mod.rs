pub mod metrics;
pub mod tracing;
pub mod analytics;

pub use metrics::{ClassMetrics, LiveMetrics, MetricsSnapshot};
pub use analytics::{DispatchAnalytics, EventStream, ObservabilityLayer};

#[cfg(feature = "tracing-basic")]
pub use self::tracing::{init_tracing, LogFormat};
