use chrono::Utc;
use tracing::debug;

use crate::backend::{Keyspace, SharedStore};
use crate::codec::JsonCodec;
use crate::{JobStatus, QueueResult, StatusId, StatusRecord};

/// Status records under `job:<id>:status`.
///
/// The dispatcher creates the record when tracking is requested; workers
/// move it forward as the job runs.
#[derive(Clone)]
pub struct StatusTracker {
    store: SharedStore,
    keys: Keyspace,
    codec: JsonCodec,
}

impl StatusTracker {
    pub(crate) fn new(store: SharedStore, keys: Keyspace) -> Self {
        Self {
            store,
            keys,
            codec: JsonCodec,
        }
    }

    /// Start tracking a job in the waiting state
    pub async fn create(&self, id: &StatusId) -> QueueResult<()> {
        let now = Utc::now().timestamp();
        let record = StatusRecord {
            status: JobStatus::Waiting.code(),
            updated: now,
            started: Some(now),
        };
        self.write(id, &record).await?;
        debug!(status_id = %id, "Status tracking started");
        Ok(())
    }

    /// Stored record, if the job is tracked
    pub async fn record(&self, id: &StatusId) -> QueueResult<Option<StatusRecord>> {
        match self.store.get(&self.keys.job_status(id.as_str())).await? {
            Some(raw) => Ok(Some(self.codec.decode(&raw, "status record")?)),
            None => Ok(None),
        }
    }

    /// Current status. Unknown codes read as `None`.
    pub async fn status(&self, id: &StatusId) -> QueueResult<Option<JobStatus>> {
        Ok(self
            .record(id)
            .await?
            .and_then(|record| JobStatus::from_code(record.status)))
    }

    /// Move a tracked job to a new status; untracked ids are left alone
    pub async fn update(&self, id: &StatusId, status: JobStatus) -> QueueResult<bool> {
        let Some(mut record) = self.record(id).await? else {
            return Ok(false);
        };
        record.status = status.code();
        record.updated = Utc::now().timestamp();
        self.write(id, &record).await?;
        Ok(true)
    }

    pub async fn is_tracking(&self, id: &StatusId) -> QueueResult<bool> {
        self.store.exists(&self.keys.job_status(id.as_str())).await
    }

    /// Forget a job's status
    pub async fn stop(&self, id: &StatusId) -> QueueResult<bool> {
        self.store.del(&self.keys.job_status(id.as_str())).await
    }

    async fn write(&self, id: &StatusId, record: &StatusRecord) -> QueueResult<()> {
        let raw = self.codec.encode(record)?;
        self.store.set(&self.keys.job_status(id.as_str()), &raw).await
    }
}
