use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StatusId;

/// Event protocol for dispatcher-side observability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DispatchEvent {
    /// Payload pushed onto a queue
    Enqueued {
        id: StatusId,
        queue: String,
        class: String,
        at: DateTime<Utc>,
    },

    /// Identical payload already pending, nothing pushed
    DuplicateSuppressed {
        existing: Option<StatusId>,
        queue: String,
        class: String,
        at: DateTime<Utc>,
    },

    /// Payload placed in a delayed bucket
    Scheduled {
        queue: String,
        class: String,
        run_at: i64,
        at: DateTime<Utc>,
    },

    /// Delayed payloads removed
    DelayedRemoved {
        class: String,
        removed: usize,
        at: DateTime<Utc>,
    },

    /// Failed records pushed back onto their queues
    FailedRetried {
        count: usize,
        cleared: bool,
        at: DateTime<Utc>,
    },

    /// Failed list purged
    FailedCleared {
        count: usize,
        at: DateTime<Utc>,
    },

    /// Dead workers unregistered
    WorkersPruned {
        count: usize,
        at: DateTime<Utc>,
    },
}

impl DispatchEvent {
    /// Get event type name as string
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Enqueued { .. } => "enqueued",
            Self::DuplicateSuppressed { .. } => "duplicate_suppressed",
            Self::Scheduled { .. } => "scheduled",
            Self::DelayedRemoved { .. } => "delayed_removed",
            Self::FailedRetried { .. } => "failed_retried",
            Self::FailedCleared { .. } => "failed_cleared",
            Self::WorkersPruned { .. } => "workers_pruned",
        }
    }

    /// Get the timestamp from any event
    pub fn timestamp(&self) -> &DateTime<Utc> {
        match self {
            Self::Enqueued { at, .. }
            | Self::DuplicateSuppressed { at, .. }
            | Self::Scheduled { at, .. }
            | Self::DelayedRemoved { at, .. }
            | Self::FailedRetried { at, .. }
            | Self::FailedCleared { at, .. }
            | Self::WorkersPruned { at, .. } => at,
        }
    }
}
