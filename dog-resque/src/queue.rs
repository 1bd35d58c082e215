use tracing::debug;

use crate::backend::{Keyspace, SharedStore};
use crate::codec::JsonCodec;
use crate::{JobPayload, PendingJob, QueueResult};

/// A named queue list.
///
/// The view holds no state of its own; every call re-reads the store.
#[derive(Clone)]
pub struct Queue {
    name: String,
    store: SharedStore,
    keys: Keyspace,
    codec: JsonCodec,
}

impl Queue {
    pub(crate) fn new(name: impl Into<String>, store: SharedStore, keys: Keyspace) -> Self {
        Self {
            name: name.into(),
            store,
            keys,
            codec: JsonCodec,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of pending payloads
    pub async fn size(&self) -> QueueResult<usize> {
        self.store.llen(&self.keys.queue(&self.name)).await
    }

    /// Raw payloads in queue order
    pub(crate) async fn raw_jobs(&self) -> QueueResult<Vec<String>> {
        self.store.lrange(&self.keys.queue(&self.name), 0, -1).await
    }

    /// Decode every pending payload. One malformed entry fails the call.
    pub async fn jobs(&self) -> QueueResult<Vec<PendingJob>> {
        self.raw_jobs()
            .await?
            .iter()
            .map(|raw| {
                Ok(PendingJob {
                    queue: self.name.clone(),
                    payload: self.codec.decode::<JobPayload>(raw, "queued job")?,
                })
            })
            .collect()
    }

    /// Drop every pending payload, returning how many there were
    pub async fn clear(&self) -> QueueResult<usize> {
        let key = self.keys.queue(&self.name);
        let count = self.store.llen(&key).await?;
        if count > 0 {
            self.store.del(&key).await?;
        }
        debug!(queue = %self.name, count, "Queue cleared");
        Ok(count)
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("backend", &self.store.backend_name())
            .finish()
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::backend::{memory::MemoryStore, StoreBackend};
    use crate::{QueueError, StatusId};
    use serde_json::json;
    use std::sync::Arc;

    fn queue(store: &MemoryStore) -> Queue {
        Queue::new("emails", Arc::new(store.clone()), Keyspace::default())
    }

    #[tokio::test]
    async fn test_jobs_and_clear() {
        let store = MemoryStore::new();
        let payload = JobPayload::immediate("W", json!({"user_id": 1}), &StatusId::new());
        store
            .rpush("resque:queue:emails", &serde_json::to_string(&payload).unwrap())
            .await
            .unwrap();

        let queue = queue(&store);
        assert_eq!(queue.size().await.unwrap(), 1);
        let jobs = queue.jobs().await.unwrap();
        assert_eq!(jobs[0].payload, payload);

        assert_eq!(queue.clear().await.unwrap(), 1);
        assert_eq!(queue.size().await.unwrap(), 0);
        assert_eq!(queue.clear().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_malformed_entry_fails_listing() {
        let store = MemoryStore::new();
        store.rpush("resque:queue:emails", "not json").await.unwrap();

        let err = queue(&store).jobs().await.unwrap_err();
        assert!(matches!(err, QueueError::Decode(_)));
    }
}
