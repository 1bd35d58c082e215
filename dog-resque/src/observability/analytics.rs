use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use futures_core::Stream;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::debug;

use super::LiveMetrics;
use crate::{DispatchEvent, StatusId};

const EVENT_CAPACITY: usize = 1024;

/// Stream of dispatch events; lagged receivers skip what they missed
pub type EventStream = Pin<Box<dyn Stream<Item = DispatchEvent> + Send>>;

/// Event broadcast and live counters for one dispatcher
#[derive(Clone)]
pub struct ObservabilityLayer {
    event_broadcaster: broadcast::Sender<DispatchEvent>,
    metrics: Arc<LiveMetrics>,
}

impl ObservabilityLayer {
    pub fn new() -> Self {
        let (event_broadcaster, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            event_broadcaster,
            metrics: Arc::new(LiveMetrics::new()),
        }
    }

    pub fn record_enqueued(&self, id: &StatusId, queue: &str, class: &str) {
        self.emit(DispatchEvent::Enqueued {
            id: id.clone(),
            queue: queue.to_string(),
            class: class.to_string(),
            at: Utc::now(),
        });
        self.metrics.increment_jobs_enqueued(class);
    }

    pub fn record_duplicate(&self, existing: Option<&StatusId>, queue: &str, class: &str) {
        self.emit(DispatchEvent::DuplicateSuppressed {
            existing: existing.cloned(),
            queue: queue.to_string(),
            class: class.to_string(),
            at: Utc::now(),
        });
        self.metrics.increment_duplicates_suppressed(class);
    }

    pub fn record_scheduled(&self, run_at: i64, queue: &str, class: &str) {
        self.emit(DispatchEvent::Scheduled {
            queue: queue.to_string(),
            class: class.to_string(),
            run_at,
            at: Utc::now(),
        });
        self.metrics.increment_jobs_scheduled(class);
    }

    pub fn record_delayed_removed(&self, class: &str, removed: usize) {
        self.emit(DispatchEvent::DelayedRemoved {
            class: class.to_string(),
            removed,
            at: Utc::now(),
        });
        self.metrics.add_delayed_removed(removed);
    }

    pub fn record_failed_retried(&self, count: usize, cleared: bool) {
        self.emit(DispatchEvent::FailedRetried {
            count,
            cleared,
            at: Utc::now(),
        });
        self.metrics.add_failed_retried(count);
    }

    pub fn record_failed_cleared(&self, count: usize) {
        self.emit(DispatchEvent::FailedCleared { count, at: Utc::now() });
        self.metrics.add_failed_cleared(count);
    }

    pub fn record_workers_pruned(&self, count: usize) {
        self.emit(DispatchEvent::WorkersPruned { count, at: Utc::now() });
        self.metrics.add_workers_pruned(count);
    }

    /// Raw receiver for callers that want lag notifications
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.event_broadcaster.subscribe()
    }

    /// Events emitted after this call
    pub fn event_stream(&self) -> EventStream {
        Box::pin(BroadcastStream::new(self.subscribe()).filter_map(|event| event.ok()))
    }

    pub fn metrics(&self) -> &LiveMetrics {
        &self.metrics
    }

    fn emit(&self, event: DispatchEvent) {
        debug!(event = event.event_name(), "Dispatch event");
        // No subscribers is fine
        let _ = self.event_broadcaster.send(event);
    }
}

impl Default for ObservabilityLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ObservabilityLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservabilityLayer")
            .field("subscribers", &self.event_broadcaster.receiver_count())
            .finish()
    }
}

/// Derived ratios over the live counters
pub struct DispatchAnalytics {
    observability: Arc<ObservabilityLayer>,
}

impl DispatchAnalytics {
    pub fn new(observability: Arc<ObservabilityLayer>) -> Self {
        Self { observability }
    }

    /// Percentage of dedup checks that suppressed a push
    pub fn dedup_rate(&self) -> f64 {
        let metrics = self.observability.metrics();
        let suppressed = metrics.duplicates_suppressed() as f64;
        let total = suppressed + metrics.jobs_enqueued() as f64;

        if total == 0.0 {
            0.0
        } else {
            (suppressed / total) * 100.0
        }
    }

    /// Percentage of dispatched jobs that went through the delayed schedule
    pub fn delayed_share(&self) -> f64 {
        let metrics = self.observability.metrics();
        let scheduled = metrics.jobs_scheduled() as f64;
        let total = scheduled + metrics.jobs_enqueued() as f64;

        if total == 0.0 {
            0.0
        } else {
            (scheduled / total) * 100.0
        }
    }
}
