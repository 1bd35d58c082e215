//! # dog-resque: Resque-compatible job dispatch
//!
//! Client side of the Resque protocol: pushes jobs onto Resque queues,
//! schedules delayed jobs for the scheduler process, and reads back queues,
//! workers and failed jobs. Workers themselves run elsewhere.
//!
//! On top of the plain protocol the dispatcher adds:
//!
//! - **Pending-job dedup**: `enqueue_once` skips the push when an identical
//!   job (same handler, same canonical arguments) is already waiting
//! - **Retry-strategy stamping**: a global or per-handler backoff list is
//!   written into the job arguments for the worker to honour
//! - **Dispatch marker**: every payload carries one wrapper class on the wire
//!   and names its real handler in `resque.jobclass`, resolved on the worker
//!   side through a [`JobRegistry`]
//!
//! ## Quick start
//!
//! ```rust
//! use dog_resque::prelude::*;
//! use dog_resque::backend::memory::MemoryStore;
//!
//! # tokio_test::block_on(async {
//! let resque = Resque::new(MemoryStore::new()).with_retry_policy(
//!     RetryPolicyTable::new().with_global(RetryStrategy::Backoff(vec![0, 60, 600])),
//! );
//!
//! let job = Job::new("emails", "SendWelcome").with_arg("user_id", 42);
//! resque.enqueue_once(&job, false).await?;
//! resque.enqueue_once(&job, false).await?;
//!
//! assert_eq!(resque.queue("emails").size().await?, 1);
//! # Ok::<(), QueueError>(())
//! # }).unwrap();
//! ```

pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod failure;
pub mod job;
pub mod observability;
pub mod queue;
pub mod resque;
pub mod retry;
pub mod scheduler;
pub mod status;
pub mod types;
pub mod worker;

// Core API exports
pub use resque::Resque;
pub use config::{RedisConfig, ResqueConfig};
pub use error::{JobError, QueueError, QueueResult};
pub use types::{
    DelayedTimestamp, DispatchEvent, Job, JobPayload, JobStatus, PendingJob, StatusId,
    StatusRecord, WorkerId, JOB_CLASS_KEY, RETRY_STRATEGY_KEY,
};
pub use retry::{RetryPolicyTable, RetryStrategy};
pub use job::{JobHandler, JobRegistry, ResqueJob};
pub use codec::{canonical_json, JsonCodec};
pub use backend::{Keyspace, SharedStore, StoreBackend};

// Views
pub use queue::Queue;
pub use worker::{CurrentJob, LivenessProbe, LocalProcessProbe, Worker, WorkerRegistry};
pub use failure::FailedJob;
pub use scheduler::DelayedSchedule;
pub use status::StatusTracker;

// Observability exports
pub use observability::{LiveMetrics, ObservabilityLayer};

// Backend implementations
#[cfg(feature = "memory")]
pub use backend::memory::MemoryStore;

#[cfg(feature = "redis")]
pub use backend::redis::RedisStore;

/// Common imports for dispatching and handling jobs
pub mod prelude {
    pub use crate::{Resque, ResqueConfig, ResqueJob, StoreBackend};

    pub use crate::{Job, JobError, JobStatus, QueueError, QueueResult, StatusId};

    pub use crate::{RetryPolicyTable, RetryStrategy};

    pub use crate::JobRegistry;

    pub use crate::{LiveMetrics, ObservabilityLayer};

    pub use async_trait::async_trait;
}
