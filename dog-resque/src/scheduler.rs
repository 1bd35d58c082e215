//! Delayed schedule: one list per run timestamp plus a sorted index of the
//! timestamps that have a list. The scheduler process moves due buckets onto
//! their queues; this side only writes, inspects and removes entries.
//!
//! Removal is not atomic. An emptied bucket disappears on its own, but its
//! index entry is dropped by a separate call after a length check. A push
//! from another client whose index write lands before that call leaves a
//! bucket the index no longer lists. The payload itself is never deleted.

use tracing::debug;

use crate::backend::{Keyspace, SharedStore};
use crate::{DelayedTimestamp, QueueError, QueueResult};

#[derive(Clone)]
pub struct DelayedSchedule {
    store: SharedStore,
    keys: Keyspace,
}

impl DelayedSchedule {
    pub(crate) fn new(store: SharedStore, keys: Keyspace) -> Self {
        Self { store, keys }
    }

    /// Append a payload to the bucket for `timestamp` and index it
    pub async fn push(&self, timestamp: i64, raw: &str) -> QueueResult<()> {
        self.store.rpush(&self.keys.delayed(timestamp), raw).await?;
        self.store
            .zadd(&self.keys.delayed_schedule(), &timestamp.to_string(), timestamp)
            .await?;
        Ok(())
    }

    /// Indexed timestamps, ascending
    pub async fn timestamps(&self) -> QueueResult<Vec<i64>> {
        self.store
            .zrange(&self.keys.delayed_schedule(), 0, -1)
            .await?
            .iter()
            .map(|member| {
                member
                    .parse::<i64>()
                    .map_err(|e| QueueError::decode("delayed timestamp", e))
            })
            .collect()
    }

    /// Timestamps paired with their bucket lengths
    pub async fn entries(&self) -> QueueResult<Vec<DelayedTimestamp>> {
        let mut entries = Vec::new();
        for timestamp in self.timestamps().await? {
            entries.push(DelayedTimestamp::new(timestamp, self.bucket_len(timestamp).await?));
        }
        Ok(entries)
    }

    /// Earliest timestamp with its bucket length
    pub async fn first_entry(&self) -> QueueResult<Option<DelayedTimestamp>> {
        let first = self.store.zrange(&self.keys.delayed_schedule(), 0, 0).await?;
        match first.first() {
            Some(member) => {
                let timestamp = member
                    .parse::<i64>()
                    .map_err(|e| QueueError::decode("delayed timestamp", e))?;
                Ok(Some(DelayedTimestamp::new(timestamp, self.bucket_len(timestamp).await?)))
            }
            None => Ok(None),
        }
    }

    pub async fn bucket_len(&self, timestamp: i64) -> QueueResult<usize> {
        self.store.llen(&self.keys.delayed(timestamp)).await
    }

    /// Raw payloads in one bucket
    pub async fn bucket(&self, timestamp: i64) -> QueueResult<Vec<String>> {
        self.store.lrange(&self.keys.delayed(timestamp), 0, -1).await
    }

    /// Remove a payload from every bucket, returning how many copies went
    pub async fn remove_from_all(&self, raw: &str) -> QueueResult<usize> {
        let mut removed = 0;
        for timestamp in self.timestamps().await? {
            removed += self.remove_from(timestamp, raw).await?;
        }
        Ok(removed)
    }

    /// Remove a payload from one bucket, retiring the bucket if it empties
    pub async fn remove_from(&self, timestamp: i64, raw: &str) -> QueueResult<usize> {
        let removed = self.store.lrem(&self.keys.delayed(timestamp), 0, raw).await?;
        if removed > 0 {
            self.cleanup(timestamp).await?;
        }
        Ok(removed)
    }

    /// Drop the index entry of an empty bucket.
    ///
    /// The bucket key itself is never deleted: the store removes a list once
    /// its last element goes, and a blind delete would destroy payloads
    /// pushed since the length check.
    pub async fn cleanup(&self, timestamp: i64) -> QueueResult<bool> {
        if self.bucket_len(timestamp).await? > 0 {
            return Ok(false);
        }
        self.store
            .zrem(&self.keys.delayed_schedule(), &timestamp.to_string())
            .await?;
        debug!(timestamp, "Retired empty delayed bucket");
        Ok(true)
    }

    /// Number of distinct timestamps
    pub async fn size(&self) -> QueueResult<usize> {
        self.store.zcard(&self.keys.delayed_schedule()).await
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryStore;
    use std::sync::Arc;

    fn schedule() -> DelayedSchedule {
        DelayedSchedule::new(Arc::new(MemoryStore::new()), Keyspace::default())
    }

    #[tokio::test]
    async fn test_entries_ascending_with_counts() {
        let schedule = schedule();
        schedule.push(200, "b").await.unwrap();
        schedule.push(100, "a").await.unwrap();
        schedule.push(200, "c").await.unwrap();

        assert_eq!(
            schedule.entries().await.unwrap(),
            vec![DelayedTimestamp::new(100, 1), DelayedTimestamp::new(200, 2)]
        );
        assert_eq!(schedule.size().await.unwrap(), 2);
        assert_eq!(schedule.first_entry().await.unwrap(), Some(DelayedTimestamp::new(100, 1)));
    }

    #[tokio::test]
    async fn test_remove_from_all_retires_buckets() {
        let schedule = schedule();
        schedule.push(100, "x").await.unwrap();
        schedule.push(200, "x").await.unwrap();
        schedule.push(200, "y").await.unwrap();

        assert_eq!(schedule.remove_from_all("x").await.unwrap(), 2);
        assert_eq!(schedule.timestamps().await.unwrap(), vec![200]);
        assert_eq!(schedule.bucket(200).await.unwrap(), vec!["y"]);
    }

    #[tokio::test]
    async fn test_remove_missing_payload_keeps_bucket() {
        let schedule = schedule();
        schedule.push(100, "x").await.unwrap();

        assert_eq!(schedule.remove_from(100, "nope").await.unwrap(), 0);
        assert_eq!(schedule.remove_from(300, "x").await.unwrap(), 0);
        assert_eq!(schedule.size().await.unwrap(), 1);
    }
}
