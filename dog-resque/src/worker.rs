//! Read-only worker views and maintenance of the worker registry.
//!
//! Workers register themselves; this side only reads what they wrote and
//! removes entries left behind by processes that died without cleaning up.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::{Keyspace, SharedStore};
use crate::codec::JsonCodec;
use crate::{JobPayload, QueueError, QueueResult, WorkerId};

const STAT_PROCESSED: &str = "processed";
const STAT_FAILED: &str = "failed";

/// The job a worker is currently running, as the worker recorded it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentJob {
    pub queue: String,
    pub run_at: String,
    pub payload: JobPayload,
}

/// Snapshot of a registered worker
#[derive(Debug, Clone, PartialEq)]
pub struct Worker {
    pub id: WorkerId,
    pub current_job: Option<CurrentJob>,
    pub started_at: Option<String>,
    pub processed: u64,
    pub failed: u64,
}

impl Worker {
    pub fn hostname(&self) -> &str {
        &self.id.hostname
    }

    pub fn pid(&self) -> u32 {
        self.id.pid
    }

    pub fn queues(&self) -> &[String] {
        &self.id.queues
    }

    pub fn is_working(&self) -> bool {
        self.current_job.is_some()
    }
}

/// Answers whether a worker process is still alive
pub trait LivenessProbe: Send + Sync {
    /// Host name workers on this machine register under
    fn hostname(&self) -> QueueResult<String>;

    fn is_alive(&self, pid: u32) -> bool;
}

/// Probe for processes on the local machine
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProcessProbe;

impl LivenessProbe for LocalProcessProbe {
    fn hostname(&self) -> QueueResult<String> {
        hostname::get()
            .map_err(|e| QueueError::Internal(format!("cannot read hostname: {}", e)))
            .map(|name| name.to_string_lossy().into_owned())
    }

    #[cfg(target_os = "linux")]
    fn is_alive(&self, pid: u32) -> bool {
        std::path::Path::new(&format!("/proc/{}", pid)).exists()
    }

    #[cfg(not(target_os = "linux"))]
    fn is_alive(&self, pid: u32) -> bool {
        std::process::Command::new("ps")
            .args(["-p", &pid.to_string()])
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }
}

/// View over the `workers` set and the per-worker keys
#[derive(Clone)]
pub struct WorkerRegistry {
    store: SharedStore,
    keys: Keyspace,
    codec: JsonCodec,
}

impl WorkerRegistry {
    pub(crate) fn new(store: SharedStore, keys: Keyspace) -> Self {
        Self {
            store,
            keys,
            codec: JsonCodec,
        }
    }

    /// Registered worker ids, sorted
    pub async fn ids(&self) -> QueueResult<Vec<String>> {
        let mut ids = self.store.smembers(&self.keys.workers()).await?;
        ids.sort();
        Ok(ids)
    }

    pub async fn exists(&self, id: &str) -> QueueResult<bool> {
        self.store.sismember(&self.keys.workers(), id).await
    }

    pub async fn count(&self) -> QueueResult<usize> {
        self.store.scard(&self.keys.workers()).await
    }

    /// Load one worker, or `None` when it is not registered
    pub async fn load(&self, id: &str) -> QueueResult<Option<Worker>> {
        if !self.exists(id).await? {
            return Ok(None);
        }
        let worker_id: WorkerId = id.parse()?;

        let current_job = match self.store.get(&self.keys.worker(id)).await? {
            Some(raw) => Some(self.codec.decode::<CurrentJob>(&raw, "worker job")?),
            None => None,
        };
        let started_at = self.store.get(&self.keys.worker_started(id)).await?;
        let processed = self.stat(STAT_PROCESSED, id).await?;
        let failed = self.stat(STAT_FAILED, id).await?;

        Ok(Some(Worker {
            id: worker_id,
            current_job,
            started_at,
            processed,
            failed,
        }))
    }

    /// Every registered worker. A malformed id or job record fails the call.
    pub async fn all(&self) -> QueueResult<Vec<Worker>> {
        let mut workers = Vec::new();
        for id in self.ids().await? {
            if let Some(worker) = self.load(&id).await? {
                workers.push(worker);
            }
        }
        Ok(workers)
    }

    /// Remove a worker and everything it registered
    pub async fn unregister(&self, id: &str) -> QueueResult<bool> {
        let removed = self.store.srem(&self.keys.workers(), id).await?;
        self.store.del(&self.keys.worker(id)).await?;
        self.store.del(&self.keys.worker_started(id)).await?;
        self.store.del(&self.keys.worker_stat(STAT_PROCESSED, id)).await?;
        self.store.del(&self.keys.worker_stat(STAT_FAILED, id)).await?;
        debug!(worker = %id, removed, "Worker unregistered");
        Ok(removed)
    }

    /// Unregister workers on this host whose process is gone.
    ///
    /// Workers on other hosts are left alone since their pids mean nothing
    /// here. Ids that do not parse are skipped.
    pub async fn prune_dead(&self, probe: &dyn LivenessProbe) -> QueueResult<usize> {
        let hostname = probe.hostname()?;
        let mut pruned = 0;

        for id in self.ids().await? {
            let worker_id = match id.parse::<WorkerId>() {
                Ok(worker_id) => worker_id,
                Err(e) => {
                    warn!(worker = %id, error = %e, "Skipping unparseable worker id");
                    continue;
                }
            };
            if worker_id.hostname != hostname || probe.is_alive(worker_id.pid) {
                continue;
            }
            if self.unregister(&id).await? {
                pruned += 1;
            }
        }

        if pruned > 0 {
            info!(pruned, hostname = %hostname, "Pruned dead workers");
        }
        Ok(pruned)
    }

    async fn stat(&self, stat: &str, id: &str) -> QueueResult<u64> {
        match self.store.get(&self.keys.worker_stat(stat, id)).await? {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|e| QueueError::decode("worker stat", e)),
            None => Ok(0),
        }
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::backend::{memory::MemoryStore, StoreBackend};
    use std::collections::HashSet;
    use std::sync::Arc;

    struct FakeProbe {
        hostname: String,
        alive: HashSet<u32>,
    }

    impl LivenessProbe for FakeProbe {
        fn hostname(&self) -> QueueResult<String> {
            Ok(self.hostname.clone())
        }

        fn is_alive(&self, pid: u32) -> bool {
            self.alive.contains(&pid)
        }
    }

    async fn register(store: &MemoryStore, id: &str) {
        store.sadd("resque:workers", id).await.unwrap();
        store.set(&format!("resque:worker:{}:started", id), "Mon Jan 1").await.unwrap();
        store.set(&format!("resque:stat:processed:{}", id), "7").await.unwrap();
    }

    #[tokio::test]
    async fn test_load_worker_snapshot() {
        let store = MemoryStore::new();
        register(&store, "web-1:10:emails").await;
        store
            .set(
                "resque:worker:web-1:10:emails",
                r#"{"queue":"emails","run_at":"now","payload":{"class":"W","args":[{}]}}"#,
            )
            .await
            .unwrap();

        let registry = WorkerRegistry::new(Arc::new(store), Keyspace::default());
        let worker = registry.load("web-1:10:emails").await.unwrap().unwrap();

        assert_eq!(worker.pid(), 10);
        assert_eq!(worker.queues(), ["emails"]);
        assert_eq!(worker.processed, 7);
        assert_eq!(worker.failed, 0);
        assert!(worker.is_working());
        assert_eq!(worker.started_at.as_deref(), Some("Mon Jan 1"));
        assert!(registry.load("web-1:11:emails").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prune_only_dead_local_workers() {
        let store = MemoryStore::new();
        register(&store, "here:1:emails").await;
        register(&store, "here:2:emails").await;
        register(&store, "elsewhere:3:emails").await;

        let probe = FakeProbe {
            hostname: "here".to_string(),
            alive: [1].into_iter().collect(),
        };
        let registry = WorkerRegistry::new(Arc::new(store.clone()), Keyspace::default());

        assert_eq!(registry.prune_dead(&probe).await.unwrap(), 1);
        assert_eq!(registry.ids().await.unwrap(), vec!["elsewhere:3:emails", "here:1:emails"]);
        assert!(!store.exists("resque:worker:here:2:emails:started").await.unwrap());
        assert!(!store.exists("resque:stat:processed:here:2:emails").await.unwrap());
    }

    #[tokio::test]
    async fn test_local_probe_sees_itself() {
        let probe = LocalProcessProbe;
        assert!(!probe.hostname().unwrap().is_empty());
        assert!(probe.is_alive(std::process::id()));
    }
}
