//! Namespaced key layout shared with Resque workers and the delayed scheduler.

/// Default namespace used by Resque workers
pub const DEFAULT_PREFIX: &str = "resque";

/// Key builder for one store namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    prefix: String,
}

impl Keyspace {
    /// Create a keyspace. A trailing `:` on the prefix is ignored and an
    /// empty prefix falls back to [`DEFAULT_PREFIX`].
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches(':');
        let prefix = if trimmed.is_empty() {
            DEFAULT_PREFIX.to_string()
        } else {
            trimmed.to_string()
        };
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Set of known queue names
    pub fn queues(&self) -> String {
        format!("{}:queues", self.prefix)
    }

    /// Pending list for one queue
    pub fn queue(&self, name: &str) -> String {
        format!("{}:queue:{}", self.prefix, name)
    }

    /// Set of registered worker ids
    pub fn workers(&self) -> String {
        format!("{}:workers", self.prefix)
    }

    /// Current-job record of a worker
    pub fn worker(&self, id: &str) -> String {
        format!("{}:worker:{}", self.prefix, id)
    }

    pub fn worker_started(&self, id: &str) -> String {
        format!("{}:worker:{}:started", self.prefix, id)
    }

    /// Per-worker counter such as `stat:processed:<id>`
    pub fn worker_stat(&self, stat: &str, id: &str) -> String {
        format!("{}:stat:{}:{}", self.prefix, stat, id)
    }

    /// Sorted index of timestamps that hold delayed jobs
    pub fn delayed_schedule(&self) -> String {
        format!("{}:delayed_queue_schedule", self.prefix)
    }

    /// Bucket of delayed payloads for one timestamp
    pub fn delayed(&self, timestamp: i64) -> String {
        format!("{}:delayed:{}", self.prefix, timestamp)
    }

    pub fn failed(&self) -> String {
        format!("{}:failed", self.prefix)
    }

    pub fn job_status(&self, id: &str) -> String {
        format!("{}:job:{}:status", self.prefix, id)
    }
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let keys = Keyspace::default();
        assert_eq!(keys.queue("emails"), "resque:queue:emails");
        assert_eq!(keys.delayed(1700000000), "resque:delayed:1700000000");
        assert_eq!(keys.delayed_schedule(), "resque:delayed_queue_schedule");
        assert_eq!(keys.worker_stat("processed", "h:1:q"), "resque:stat:processed:h:1:q");
        assert_eq!(keys.job_status("abc"), "resque:job:abc:status");
    }

    #[test]
    fn test_prefix_normalization() {
        assert_eq!(Keyspace::new("app:").failed(), "app:failed");
        assert_eq!(Keyspace::new("").prefix(), DEFAULT_PREFIX);
        assert_eq!(Keyspace::new(":::").prefix(), DEFAULT_PREFIX);
    }
}
