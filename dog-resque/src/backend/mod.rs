pub mod keys;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

pub use keys::Keyspace;

use async_trait::async_trait;
use std::sync::Arc;

use crate::QueueResult;

/// Shared, type-erased store handle held by the dispatcher and its views
pub type SharedStore = Arc<dyn StoreBackend>;

/// Store primitives the dispatcher is written against.
///
/// The methods mirror the Redis commands of the same name, including index
/// semantics: list and sorted-set ranges take inclusive `start`/`stop` and
/// accept negative offsets counted from the end. Keys whose collection
/// becomes empty cease to exist.
///
/// Each call is atomic on its own. Nothing in this trait groups calls into a
/// transaction.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Append to the tail of a list, returning the new length
    async fn rpush(&self, key: &str, value: &str) -> QueueResult<usize>;

    /// Read an inclusive index range of a list
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> QueueResult<Vec<String>>;

    /// Length of a list (0 when missing)
    async fn llen(&self, key: &str) -> QueueResult<usize>;

    /// Remove occurrences of `value`: `count > 0` from the head, `count < 0`
    /// from the tail, `0` for all. Returns the number removed.
    async fn lrem(&self, key: &str, count: isize, value: &str) -> QueueResult<usize>;

    /// Add a set member, returning whether it was newly added
    async fn sadd(&self, key: &str, member: &str) -> QueueResult<bool>;

    /// Remove a set member, returning whether it was present
    async fn srem(&self, key: &str, member: &str) -> QueueResult<bool>;

    async fn smembers(&self, key: &str) -> QueueResult<Vec<String>>;

    async fn scard(&self, key: &str) -> QueueResult<usize>;

    async fn sismember(&self, key: &str, member: &str) -> QueueResult<bool>;

    async fn get(&self, key: &str) -> QueueResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> QueueResult<()>;

    /// Delete a key of any type, returning whether it existed
    async fn del(&self, key: &str) -> QueueResult<bool>;

    async fn exists(&self, key: &str) -> QueueResult<bool>;

    /// Add or re-score a sorted-set member, returning whether it was new
    async fn zadd(&self, key: &str, member: &str, score: i64) -> QueueResult<bool>;

    /// Members by ascending score (ties ordered by member), inclusive range
    async fn zrange(&self, key: &str, start: isize, stop: isize) -> QueueResult<Vec<String>>;

    async fn zrem(&self, key: &str, member: &str) -> QueueResult<bool>;

    async fn zcard(&self, key: &str) -> QueueResult<usize>;

    /// Backend identifier for logs
    fn backend_name(&self) -> &'static str;
}

/// Resolve a Redis-style inclusive range against a collection length.
///
/// Returns `None` when the range selects nothing.
pub(crate) fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[cfg(test)]
mod tests {
    use super::resolve_range;

    #[test]
    fn test_full_range() {
        assert_eq!(resolve_range(5, 0, -1), Some((0, 4)));
    }

    #[test]
    fn test_negative_start_clamps() {
        assert_eq!(resolve_range(3, -100, 100), Some((0, 2)));
        assert_eq!(resolve_range(10, -3, -1), Some((7, 9)));
    }

    #[test]
    fn test_empty_selections() {
        assert_eq!(resolve_range(0, 0, -1), None);
        assert_eq!(resolve_range(5, 6, 10), None);
        assert_eq!(resolve_range(5, 3, 1), None);
        assert_eq!(resolve_range(5, 0, -10), None);
    }
}
