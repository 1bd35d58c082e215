use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::QueueError;

/// Identifier of an enqueued payload, doubling as its status handle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusId(pub String);

impl StatusId {
    /// Generate a new 32-character hex identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Create a status id from a string
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StatusId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StatusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for StatusId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for StatusId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Worker identity in the `hostname:pid:queue1,queue2` form workers register
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerId {
    pub hostname: String,
    pub pid: u32,
    pub queues: Vec<String>,
}

impl WorkerId {
    pub fn new(hostname: impl Into<String>, pid: u32, queues: Vec<String>) -> Self {
        Self {
            hostname: hostname.into(),
            pid,
            queues,
        }
    }

    /// Whether the worker listens on every queue
    pub fn is_wildcard(&self) -> bool {
        self.queues.iter().any(|q| q == "*")
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.hostname, self.pid, self.queues.join(","))
    }
}

impl FromStr for WorkerId {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (hostname, pid, queues) = match (parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(p), Some(q)) if !h.is_empty() => (h, p, q),
            _ => return Err(QueueError::InvalidWorkerId(s.to_string())),
        };
        let pid = pid
            .parse::<u32>()
            .map_err(|_| QueueError::InvalidWorkerId(s.to_string()))?;
        let queues = queues
            .split(',')
            .filter(|q| !q.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self::new(hostname, pid, queues))
    }
}
