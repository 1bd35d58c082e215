use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::backend::{Keyspace, SharedStore, StoreBackend};
use crate::codec::JsonCodec;
use crate::config::{ResqueConfig, DEFAULT_WRAPPER_CLASS};
use crate::failure::FailedJob;
use crate::observability::ObservabilityLayer;
use crate::queue::Queue;
use crate::retry::RetryPolicyTable;
use crate::scheduler::DelayedSchedule;
use crate::status::StatusTracker;
use crate::worker::{LivenessProbe, LocalProcessProbe, Worker, WorkerRegistry};
use crate::{
    DelayedTimestamp, Job, JobPayload, JobStatus, QueueResult, ResqueJob, StatusId,
};

/// Client-side dispatcher for a Resque store.
///
/// Every operation is a sequence of single-command store calls. Nothing is
/// cached and nothing spans a transaction, so composite operations can
/// interleave with other clients. In particular two concurrent
/// [`enqueue_once`](Self::enqueue_once) calls with identical arguments may
/// both push.
#[derive(Clone)]
pub struct Resque {
    store: SharedStore,
    keys: Keyspace,
    codec: JsonCodec,
    retry: Arc<RetryPolicyTable>,
    context_options: Arc<Map<String, Value>>,
    wrapper_class: String,
    probe: Arc<dyn LivenessProbe>,
    observability: Arc<ObservabilityLayer>,
}

impl Resque {
    /// Create a dispatcher over `backend` with default settings
    pub fn new<B: StoreBackend + 'static>(backend: B) -> Self {
        Self::from_shared(Arc::new(backend))
    }

    /// Create a dispatcher over an already shared store
    pub fn from_shared(store: SharedStore) -> Self {
        Self {
            store,
            keys: Keyspace::default(),
            codec: JsonCodec,
            retry: Arc::new(RetryPolicyTable::new()),
            context_options: Arc::new(Map::new()),
            wrapper_class: DEFAULT_WRAPPER_CLASS.to_string(),
            probe: Arc::new(LocalProcessProbe),
            observability: Arc::new(ObservabilityLayer::new()),
        }
    }

    /// Create a dispatcher from configuration
    pub fn from_config<B: StoreBackend + 'static>(config: &ResqueConfig, backend: B) -> QueueResult<Self> {
        Ok(Self::new(backend)
            .with_prefix(config.prefix.as_str())
            .with_wrapper_class(config.wrapper_class.as_str())
            .with_context_options(config.context_options.clone())
            .with_retry_policy(config.retry_table()?))
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.keys = Keyspace::new(prefix);
        self
    }

    pub fn with_retry_policy(mut self, table: RetryPolicyTable) -> Self {
        self.retry = Arc::new(table);
        self
    }

    /// Options merged into every job's arguments, winning over caller keys
    pub fn with_context_options(mut self, options: Map<String, Value>) -> Self {
        self.context_options = Arc::new(options);
        self
    }

    pub fn with_wrapper_class(mut self, class: impl Into<String>) -> Self {
        self.wrapper_class = class.into();
        self
    }

    pub fn with_liveness_probe<P: LivenessProbe + 'static>(mut self, probe: P) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    pub fn with_observability(mut self, observability: ObservabilityLayer) -> Self {
        self.observability = Arc::new(observability);
        self
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keys
    }

    pub fn retry_policy(&self) -> &RetryPolicyTable {
        &self.retry
    }

    pub fn wrapper_class(&self) -> &str {
        &self.wrapper_class
    }

    pub fn observability(&self) -> &ObservabilityLayer {
        &self.observability
    }

    pub fn status_tracker(&self) -> StatusTracker {
        StatusTracker::new(self.store.clone(), self.keys.clone())
    }

    pub fn worker_registry(&self) -> WorkerRegistry {
        WorkerRegistry::new(self.store.clone(), self.keys.clone())
    }

    fn schedule(&self) -> DelayedSchedule {
        DelayedSchedule::new(self.store.clone(), self.keys.clone())
    }

    /// Stamped argument map for `job`: context options, then the resolved
    /// retry strategy, then the dispatch marker
    fn prepare(&self, job: &Job) -> QueueResult<Map<String, Value>> {
        let mut prepared = job.clone();
        prepared.merge_options(&self.context_options);
        if let Some(strategy) = self.retry.resolve(job.class()) {
            prepared.attach_retry_strategy(strategy)?;
        }
        prepared.wrap();
        Ok(prepared.into_args())
    }

    fn delayed_payload(&self, job: &Job) -> QueueResult<String> {
        let args = self.prepare(job)?;
        let payload = JobPayload::delayed(self.wrapper_class.as_str(), job.queue(), Value::Object(args));
        self.codec.encode(&payload)
    }

    /// Register the queue name and append a fresh payload to it
    async fn push(&self, queue: &str, class: &str, args: Value, track_status: bool) -> QueueResult<StatusId> {
        let id = StatusId::new();
        let payload = JobPayload::immediate(class, args, &id);
        let raw = self.codec.encode(&payload)?;

        self.store.sadd(&self.keys.queues(), queue).await?;
        self.store.rpush(&self.keys.queue(queue), &raw).await?;
        if track_status {
            self.status_tracker().create(&id).await?;
        }
        Ok(id)
    }

    /// Push a job onto its queue.
    ///
    /// Returns the status id when `track_status` is set, `None` otherwise.
    #[instrument(skip(self, job), fields(queue = %job.queue(), class = %job.class()))]
    pub async fn enqueue(&self, job: &Job, track_status: bool) -> QueueResult<Option<StatusId>> {
        let args = self.prepare(job)?;
        let id = self
            .push(job.queue(), &self.wrapper_class, Value::Object(args), track_status)
            .await?;

        self.observability.record_enqueued(&id, job.queue(), job.class());
        info!(status_id = %id, "Enqueued job");
        Ok(track_status.then_some(id))
    }

    /// Push a typed job onto its queue
    pub async fn enqueue_typed<J: ResqueJob>(&self, job: &J, track_status: bool) -> QueueResult<Option<StatusId>> {
        self.enqueue(&job.to_job()?, track_status).await
    }

    /// Push a job unless an identical one is already pending in its queue.
    ///
    /// Identity means the same handler and the same stamped arguments,
    /// compared in canonical form. The check scans the whole queue. On a
    /// match nothing is pushed and the existing status id is returned when
    /// `track_status` is set and that job is tracked.
    #[instrument(skip(self, job), fields(queue = %job.queue(), class = %job.class()))]
    pub async fn enqueue_once(&self, job: &Job, track_status: bool) -> QueueResult<Option<StatusId>> {
        let args = self.prepare(job)?;
        let candidate = self.codec.canonical(&Value::Object(args))?;

        for pending in self.queue(job.queue()).jobs().await? {
            if pending.payload.job_class() != Some(job.class()) {
                continue;
            }
            let existing = self.codec.canonical(&Value::Object(pending.args()))?;
            if existing != candidate {
                continue;
            }

            let existing_id = match pending.id() {
                Some(id) if track_status => {
                    self.status_tracker().is_tracking(&id).await?.then_some(id)
                }
                _ => None,
            };
            self.observability
                .record_duplicate(existing_id.as_ref(), job.queue(), job.class());
            debug!(existing = ?existing_id, "Identical job already pending");
            return Ok(existing_id);
        }

        self.enqueue(job, track_status).await
    }

    /// Schedule a job to be moved onto its queue at `timestamp` (epoch seconds)
    #[instrument(skip(self, job), fields(queue = %job.queue(), class = %job.class()))]
    pub async fn enqueue_at(&self, timestamp: i64, job: &Job) -> QueueResult<()> {
        let raw = self.delayed_payload(job)?;
        self.schedule().push(timestamp, &raw).await?;

        self.observability
            .record_scheduled(timestamp, job.queue(), job.class());
        info!(run_at = timestamp, "Scheduled job");
        Ok(())
    }

    pub async fn enqueue_at_datetime(&self, at: DateTime<Utc>, job: &Job) -> QueueResult<()> {
        self.enqueue_at(at.timestamp(), job).await
    }

    /// Schedule a job `seconds` from now
    pub async fn enqueue_in(&self, seconds: u64, job: &Job) -> QueueResult<()> {
        let offset = i64::try_from(seconds).unwrap_or(i64::MAX);
        self.enqueue_at(Utc::now().timestamp().saturating_add(offset), job)
            .await
    }

    /// Remove every delayed copy of `job`, whatever its timestamp.
    ///
    /// Copies are matched by their exact encoded bytes. Payloads are encoded
    /// with sorted keys, so entries written by clients that order keys
    /// differently are not found. Removal is not atomic across buckets: a
    /// copy pushed concurrently may survive, and a bucket refilled between
    /// its length check and the index update can be left without an index
    /// entry, hidden from the scheduler.
    #[instrument(skip(self, job), fields(queue = %job.queue(), class = %job.class()))]
    pub async fn remove_delayed(&self, job: &Job) -> QueueResult<usize> {
        let raw = self.delayed_payload(job)?;
        let removed = self.schedule().remove_from_all(&raw).await?;

        self.observability.record_delayed_removed(job.class(), removed);
        debug!(removed, "Removed delayed job");
        Ok(removed)
    }

    /// Remove delayed copies of `job` from one timestamp bucket.
    ///
    /// Matching and concurrency caveats are those of
    /// [`remove_delayed`](Self::remove_delayed).
    #[instrument(skip(self, job), fields(queue = %job.queue(), class = %job.class()))]
    pub async fn remove_from_timestamp(&self, timestamp: i64, job: &Job) -> QueueResult<usize> {
        let raw = self.delayed_payload(job)?;
        let removed = self.schedule().remove_from(timestamp, &raw).await?;

        self.observability.record_delayed_removed(job.class(), removed);
        debug!(removed, "Removed delayed job from timestamp");
        Ok(removed)
    }

    /// Known queues, sorted by name
    pub async fn queues(&self) -> QueueResult<Vec<Queue>> {
        let mut names = self.store.smembers(&self.keys.queues()).await?;
        names.sort();
        Ok(names.into_iter().map(|name| self.queue(name)).collect())
    }

    pub fn queue(&self, name: impl Into<String>) -> Queue {
        Queue::new(name, self.store.clone(), self.keys.clone())
    }

    /// Drop all pending jobs of one queue
    #[instrument(skip(self))]
    pub async fn clear_queue(&self, name: &str) -> QueueResult<usize> {
        self.queue(name).clear().await
    }

    pub async fn workers(&self) -> QueueResult<Vec<Worker>> {
        self.worker_registry().all().await
    }

    pub async fn worker(&self, id: &str) -> QueueResult<Option<Worker>> {
        self.worker_registry().load(id).await
    }

    /// Workers that are currently running a job
    pub async fn running_workers(&self) -> QueueResult<Vec<Worker>> {
        Ok(self
            .workers()
            .await?
            .into_iter()
            .filter(Worker::is_working)
            .collect())
    }

    pub async fn number_of_workers(&self) -> QueueResult<usize> {
        self.worker_registry().count().await
    }

    pub async fn number_of_working_workers(&self) -> QueueResult<usize> {
        Ok(self.running_workers().await?.len())
    }

    /// Unregister workers on this host whose process is gone
    #[instrument(skip(self))]
    pub async fn prune_dead_workers(&self) -> QueueResult<usize> {
        let pruned = self.worker_registry().prune_dead(self.probe.as_ref()).await?;
        self.observability.record_workers_pruned(pruned);
        Ok(pruned)
    }

    /// Delayed timestamps, ascending, with their bucket sizes
    pub async fn delayed_job_timestamps(&self) -> QueueResult<Vec<DelayedTimestamp>> {
        self.schedule().entries().await
    }

    pub async fn first_delayed_job_timestamp(&self) -> QueueResult<Option<DelayedTimestamp>> {
        self.schedule().first_entry().await
    }

    /// Number of distinct delayed timestamps
    pub async fn delayed_schedule_size(&self) -> QueueResult<usize> {
        self.schedule().size().await
    }

    /// Decode every payload scheduled at `timestamp`
    pub async fn jobs_for_timestamp(&self, timestamp: i64) -> QueueResult<Vec<JobPayload>> {
        self.schedule()
            .bucket(timestamp)
            .await?
            .iter()
            .map(|raw| self.codec.decode(raw, "delayed job"))
            .collect()
    }

    /// Up to `count` failed records starting at index `start`.
    ///
    /// One malformed record fails the whole call.
    pub async fn failed_jobs(&self, start: usize, count: usize) -> QueueResult<Vec<FailedJob>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let start = isize::try_from(start).unwrap_or(isize::MAX);
        let stop = start.saturating_add(isize::try_from(count - 1).unwrap_or(isize::MAX));

        self.store
            .lrange(&self.keys.failed(), start, stop)
            .await?
            .iter()
            .map(|raw| self.codec.decode(raw, "failed job"))
            .collect()
    }

    /// The `count` most recent failed records, oldest first
    pub async fn latest_failed_jobs(&self, count: usize) -> QueueResult<Vec<FailedJob>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let start = isize::try_from(count).map_or(isize::MIN, |n| -n);

        self.store
            .lrange(&self.keys.failed(), start, -1)
            .await?
            .iter()
            .map(|raw| self.codec.decode(raw, "failed job"))
            .collect()
    }

    pub async fn number_of_failed_jobs(&self) -> QueueResult<usize> {
        self.store.llen(&self.keys.failed()).await
    }

    /// Push every failed job back onto its queue, optionally clearing the
    /// failed list first.
    ///
    /// Jobs go back with their recorded class and first argument as they
    /// are; no retry strategy is resolved again. All records are decoded
    /// before anything is cleared.
    #[instrument(skip(self))]
    pub async fn retry_failed_jobs(&self, clear: bool) -> QueueResult<usize> {
        let failed_key = self.keys.failed();
        let failed: Vec<FailedJob> = self
            .store
            .lrange(&failed_key, 0, -1)
            .await?
            .iter()
            .map(|raw| self.codec.decode(raw, "failed job"))
            .collect::<QueueResult<_>>()?;

        if clear {
            self.store.del(&failed_key).await?;
        }

        for job in &failed {
            let args = job
                .payload
                .args
                .first()
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()));
            self.push(job.queue_name(), job.name(), args, false).await?;
        }

        self.observability.record_failed_retried(failed.len(), clear);
        info!(count = failed.len(), clear, "Retried failed jobs");
        Ok(failed.len())
    }

    /// Delete the failed list, returning how many records it held
    #[instrument(skip(self))]
    pub async fn clear_failed_jobs(&self) -> QueueResult<usize> {
        let failed_key = self.keys.failed();
        let count = self.store.llen(&failed_key).await?;
        if count > 0 {
            self.store.del(&failed_key).await?;
        }

        self.observability.record_failed_cleared(count);
        info!(count, "Cleared failed jobs");
        Ok(count)
    }

    /// Tracked status of a job, `None` when it is not tracked
    pub async fn job_status(&self, id: &StatusId) -> QueueResult<Option<JobStatus>> {
        self.status_tracker().status(id).await
    }
}

impl std::fmt::Debug for Resque {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resque")
            .field("backend", &self.store.backend_name())
            .field("prefix", &self.keys.prefix())
            .field("wrapper_class", &self.wrapper_class)
            .finish()
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryStore;
    use crate::retry::RetryStrategy;
    use crate::{JOB_CLASS_KEY, RETRY_STRATEGY_KEY};
    use serde_json::json;
    use tracing_test::traced_test;

    fn welcome(user_id: u64) -> Job {
        Job::new("emails", "SendWelcome").with_arg("user_id", user_id)
    }

    #[tokio::test]
    #[traced_test]
    async fn test_enqueue_stamps_marker_and_strategy() {
        let store = MemoryStore::new();
        let resque = Resque::new(store.clone())
            .with_retry_policy(RetryPolicyTable::new().with_global(RetryStrategy::Backoff(vec![0, 60])));

        let id = resque.enqueue(&welcome(42), true).await.unwrap();
        assert!(id.is_some());

        let pending = resque.queue("emails").jobs().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload.class, DEFAULT_WRAPPER_CLASS);
        let args = pending[0].args();
        assert_eq!(args[JOB_CLASS_KEY], json!("SendWelcome"));
        assert_eq!(args[RETRY_STRATEGY_KEY], json!([0, 60]));
        assert_eq!(pending[0].id(), id);

        assert!(store.sismember("resque:queues", "emails").await.unwrap());
        assert!(logs_contain("Enqueued job"));
    }

    #[tokio::test]
    async fn test_untracked_enqueue_returns_none() {
        let resque = Resque::new(MemoryStore::new());
        assert_eq!(resque.enqueue(&welcome(1), false).await.unwrap(), None);
        assert_eq!(resque.queue("emails").size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_context_options_override_caller_args() {
        let mut options = Map::new();
        options.insert("kernel.environment".to_string(), json!("prod"));
        let resque = Resque::new(MemoryStore::new()).with_context_options(options);

        let job = welcome(1).with_arg("kernel.environment", "dev");
        resque.enqueue(&job, false).await.unwrap();

        let args = resque.queue("emails").jobs().await.unwrap()[0].args();
        assert_eq!(args["kernel.environment"], json!("prod"));
        assert_eq!(args["user_id"], json!(1));
    }

    #[tokio::test]
    async fn test_prefix_scopes_keys() {
        let store = MemoryStore::new();
        let resque = Resque::new(store.clone()).with_prefix("myapp");
        resque.enqueue(&welcome(1), false).await.unwrap();

        assert_eq!(store.llen("myapp:queue:emails").await.unwrap(), 1);
        assert_eq!(store.llen("resque:queue:emails").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_first_delayed_timestamp_empty() {
        let resque = Resque::new(MemoryStore::new());
        assert_eq!(resque.first_delayed_job_timestamp().await.unwrap(), None);
        assert!(resque.delayed_job_timestamps().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_from_config() {
        let mut config = ResqueConfig::default();
        config.prefix = "cfg".to_string();
        config.wrapper_class = "App\\Job".to_string();
        config.auto_retry = Some(json!({"SendWelcome": [5]}));

        let resque = Resque::from_config(&config, MemoryStore::new()).unwrap();
        assert_eq!(resque.keyspace().prefix(), "cfg");
        assert_eq!(resque.wrapper_class(), "App\\Job");
        assert!(resque.retry_policy().resolve("SendWelcome").is_some());

        config.auto_retry = Some(json!(7));
        assert!(Resque::from_config(&config, MemoryStore::new()).is_err());
    }
}
