use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// Live counters for dispatcher-side operations
#[derive(Debug, Default)]
pub struct LiveMetrics {
    jobs_enqueued: AtomicU64,
    duplicates_suppressed: AtomicU64,
    jobs_scheduled: AtomicU64,
    delayed_removed: AtomicU64,
    failed_retried: AtomicU64,
    failed_cleared: AtomicU64,
    workers_pruned: AtomicU64,

    per_class: RwLock<HashMap<String, ClassMetrics>>,
}

impl LiveMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_jobs_enqueued(&self, class: &str) {
        self.jobs_enqueued.fetch_add(1, Ordering::Relaxed);
        self.per_class.write().entry(class.to_string()).or_default().enqueued += 1;
    }

    pub fn increment_duplicates_suppressed(&self, class: &str) {
        self.duplicates_suppressed.fetch_add(1, Ordering::Relaxed);
        self.per_class.write().entry(class.to_string()).or_default().suppressed += 1;
    }

    pub fn increment_jobs_scheduled(&self, class: &str) {
        self.jobs_scheduled.fetch_add(1, Ordering::Relaxed);
        self.per_class.write().entry(class.to_string()).or_default().scheduled += 1;
    }

    pub fn add_delayed_removed(&self, count: usize) {
        self.delayed_removed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn add_failed_retried(&self, count: usize) {
        self.failed_retried.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn add_failed_cleared(&self, count: usize) {
        self.failed_cleared.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn add_workers_pruned(&self, count: usize) {
        self.workers_pruned.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn jobs_enqueued(&self) -> u64 {
        self.jobs_enqueued.load(Ordering::Relaxed)
    }

    pub fn duplicates_suppressed(&self) -> u64 {
        self.duplicates_suppressed.load(Ordering::Relaxed)
    }

    pub fn jobs_scheduled(&self) -> u64 {
        self.jobs_scheduled.load(Ordering::Relaxed)
    }

    pub fn delayed_removed(&self) -> u64 {
        self.delayed_removed.load(Ordering::Relaxed)
    }

    pub fn failed_retried(&self) -> u64 {
        self.failed_retried.load(Ordering::Relaxed)
    }

    pub fn failed_cleared(&self) -> u64 {
        self.failed_cleared.load(Ordering::Relaxed)
    }

    pub fn workers_pruned(&self) -> u64 {
        self.workers_pruned.load(Ordering::Relaxed)
    }

    /// Counters for one job class
    pub fn class_metrics(&self, class: &str) -> Option<ClassMetrics> {
        self.per_class.read().get(class).cloned()
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_enqueued: self.jobs_enqueued(),
            duplicates_suppressed: self.duplicates_suppressed(),
            jobs_scheduled: self.jobs_scheduled(),
            delayed_removed: self.delayed_removed(),
            failed_retried: self.failed_retried(),
            failed_cleared: self.failed_cleared(),
            workers_pruned: self.workers_pruned(),
            per_class: self.per_class.read().clone(),
        }
    }
}

/// Counters for a specific job class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassMetrics {
    pub enqueued: u64,
    pub suppressed: u64,
    pub scheduled: u64,
}

impl ClassMetrics {
    /// Share of `enqueue_once` calls that found a pending duplicate, as a
    /// percentage
    pub fn dedup_rate(&self) -> f64 {
        let attempts = self.enqueued + self.suppressed;
        if attempts == 0 {
            0.0
        } else {
            (self.suppressed as f64 / attempts as f64) * 100.0
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub jobs_enqueued: u64,
    pub duplicates_suppressed: u64,
    pub jobs_scheduled: u64,
    pub delayed_removed: u64,
    pub failed_retried: u64,
    pub failed_cleared: u64,
    pub workers_pruned: u64,
    pub per_class: HashMap<String, ClassMetrics>,
}
