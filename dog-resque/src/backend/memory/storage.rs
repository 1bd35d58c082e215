use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    QueueResult, QueueError,
    backend::{StoreBackend, resolve_range},
};

/// A single stored value, typed like its Redis counterpart
#[derive(Debug, Clone)]
enum Entry {
    Str(String),
    List(VecDeque<String>),
    Set(BTreeSet<String>),
    SortedSet(HashMap<String, i64>),
}

impl Entry {
    fn is_empty_collection(&self) -> bool {
        match self {
            Entry::Str(_) => false,
            Entry::List(list) => list.is_empty(),
            Entry::Set(set) => set.is_empty(),
            Entry::SortedSet(zset) => zset.is_empty(),
        }
    }
}

/// In-memory store for testing and development.
///
/// Clones share the same data, so a test can hand one clone to the
/// dispatcher and inspect the store through another.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, Entry>>>,
}

fn wrong_type(key: &str, expected: &'static str) -> QueueError {
    QueueError::WrongType { key: key.to_string(), expected }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub fn key_count(&self) -> usize {
        self.data.read().len()
    }

    /// Drop every key
    pub fn flush(&self) {
        self.data.write().clear();
    }

    fn with_list<T>(&self, key: &str, f: impl FnOnce(&VecDeque<String>) -> T) -> QueueResult<Option<T>> {
        let data = self.data.read();
        match data.get(key) {
            None => Ok(None),
            Some(Entry::List(list)) => Ok(Some(f(list))),
            Some(_) => Err(wrong_type(key, "list")),
        }
    }

    fn with_set<T>(&self, key: &str, f: impl FnOnce(&BTreeSet<String>) -> T) -> QueueResult<Option<T>> {
        let data = self.data.read();
        match data.get(key) {
            None => Ok(None),
            Some(Entry::Set(set)) => Ok(Some(f(set))),
            Some(_) => Err(wrong_type(key, "set")),
        }
    }

    fn with_sorted_set<T>(&self, key: &str, f: impl FnOnce(&HashMap<String, i64>) -> T) -> QueueResult<Option<T>> {
        let data = self.data.read();
        match data.get(key) {
            None => Ok(None),
            Some(Entry::SortedSet(zset)) => Ok(Some(f(zset))),
            Some(_) => Err(wrong_type(key, "sorted set")),
        }
    }

    /// Apply a mutation to an existing collection and drop the key if it
    /// ends up empty.
    fn mutate<T>(
        &self,
        key: &str,
        create: impl FnOnce() -> Entry,
        f: impl FnOnce(&mut Entry) -> QueueResult<T>,
    ) -> QueueResult<T> {
        let mut data = self.data.write();
        let entry = data.entry(key.to_string()).or_insert_with(create);
        let result = f(entry);
        if entry.is_empty_collection() {
            data.remove(key);
        }
        result
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn rpush(&self, key: &str, value: &str) -> QueueResult<usize> {
        self.mutate(key, || Entry::List(VecDeque::new()), |entry| match entry {
            Entry::List(list) => {
                list.push_back(value.to_string());
                Ok(list.len())
            }
            _ => Err(wrong_type(key, "list")),
        })
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> QueueResult<Vec<String>> {
        let items = self.with_list(key, |list| {
            match resolve_range(list.len(), start, stop) {
                Some((from, to)) => list.range(from..=to).cloned().collect(),
                None => Vec::new(),
            }
        })?;
        Ok(items.unwrap_or_default())
    }

    async fn llen(&self, key: &str) -> QueueResult<usize> {
        Ok(self.with_list(key, |list| list.len())?.unwrap_or(0))
    }

    async fn lrem(&self, key: &str, count: isize, value: &str) -> QueueResult<usize> {
        if !self.data.read().contains_key(key) {
            return Ok(0);
        }
        self.mutate(key, || Entry::List(VecDeque::new()), |entry| match entry {
            Entry::List(list) => {
                let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() };
                let mut removed = 0;
                if count >= 0 {
                    let mut kept = VecDeque::with_capacity(list.len());
                    for item in list.drain(..) {
                        if removed < limit && item == value {
                            removed += 1;
                        } else {
                            kept.push_back(item);
                        }
                    }
                    *list = kept;
                } else {
                    let mut kept = VecDeque::with_capacity(list.len());
                    while let Some(item) = list.pop_back() {
                        if removed < limit && item == value {
                            removed += 1;
                        } else {
                            kept.push_front(item);
                        }
                    }
                    *list = kept;
                }
                Ok(removed)
            }
            _ => Err(wrong_type(key, "list")),
        })
    }

    async fn sadd(&self, key: &str, member: &str) -> QueueResult<bool> {
        self.mutate(key, || Entry::Set(BTreeSet::new()), |entry| match entry {
            Entry::Set(set) => Ok(set.insert(member.to_string())),
            _ => Err(wrong_type(key, "set")),
        })
    }

    async fn srem(&self, key: &str, member: &str) -> QueueResult<bool> {
        if !self.data.read().contains_key(key) {
            return Ok(false);
        }
        self.mutate(key, || Entry::Set(BTreeSet::new()), |entry| match entry {
            Entry::Set(set) => Ok(set.remove(member)),
            _ => Err(wrong_type(key, "set")),
        })
    }

    async fn smembers(&self, key: &str) -> QueueResult<Vec<String>> {
        Ok(self.with_set(key, |set| set.iter().cloned().collect())?.unwrap_or_default())
    }

    async fn scard(&self, key: &str) -> QueueResult<usize> {
        Ok(self.with_set(key, |set| set.len())?.unwrap_or(0))
    }

    async fn sismember(&self, key: &str, member: &str) -> QueueResult<bool> {
        Ok(self.with_set(key, |set| set.contains(member))?.unwrap_or(false))
    }

    async fn get(&self, key: &str) -> QueueResult<Option<String>> {
        let data = self.data.read();
        match data.get(key) {
            None => Ok(None),
            Some(Entry::Str(value)) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type(key, "string")),
        }
    }

    async fn set(&self, key: &str, value: &str) -> QueueResult<()> {
        self.data.write().insert(key.to_string(), Entry::Str(value.to_string()));
        Ok(())
    }

    async fn del(&self, key: &str) -> QueueResult<bool> {
        Ok(self.data.write().remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> QueueResult<bool> {
        Ok(self.data.read().contains_key(key))
    }

    async fn zadd(&self, key: &str, member: &str, score: i64) -> QueueResult<bool> {
        self.mutate(key, || Entry::SortedSet(HashMap::new()), |entry| match entry {
            Entry::SortedSet(zset) => Ok(zset.insert(member.to_string(), score).is_none()),
            _ => Err(wrong_type(key, "sorted set")),
        })
    }

    async fn zrange(&self, key: &str, start: isize, stop: isize) -> QueueResult<Vec<String>> {
        let members = self.with_sorted_set(key, |zset| {
            let mut ordered: Vec<(&i64, &String)> = zset.iter().map(|(m, s)| (s, m)).collect();
            ordered.sort();
            match resolve_range(ordered.len(), start, stop) {
                Some((from, to)) => ordered[from..=to].iter().map(|(_, m)| (*m).clone()).collect(),
                None => Vec::new(),
            }
        })?;
        Ok(members.unwrap_or_default())
    }

    async fn zrem(&self, key: &str, member: &str) -> QueueResult<bool> {
        if !self.data.read().contains_key(key) {
            return Ok(false);
        }
        self.mutate(key, || Entry::SortedSet(HashMap::new()), |entry| match entry {
            Entry::SortedSet(zset) => Ok(zset.remove(member).is_some()),
            _ => Err(wrong_type(key, "sorted set")),
        })
    }

    async fn zcard(&self, key: &str) -> QueueResult<usize> {
        Ok(self.with_sorted_set(key, |zset| zset.len())?.unwrap_or(0))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
