//! Retry strategies and their resolution per handler.
//!
//! A strategy is stamped into a job's arguments at enqueue time so the
//! worker that eventually runs it knows how to reschedule on failure. The
//! table is built once at startup and shared read-only.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::{QueueError, QueueResult};

/// Key of the global default inside an `auto_retry` object
pub const DEFAULT_STRATEGY_KEY: &str = "default";

/// Retry parameters attached to a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RetryStrategy {
    /// Backoff seconds per attempt, applied to any failure
    Backoff(Vec<u64>),

    /// Backoff seconds per attempt, keyed by failure category
    ByFailure(BTreeMap<String, Vec<u64>>),
}

impl RetryStrategy {
    /// An empty strategy means "never retry"
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Backoff(delays) => delays.is_empty(),
            Self::ByFailure(categories) => categories.is_empty(),
        }
    }

    /// Delay before retry number `attempt` (0-based) for a failure
    /// category, or `None` once attempts are exhausted or the category has
    /// no entry.
    pub fn delay_for(&self, attempt: usize, category: Option<&str>) -> Option<Duration> {
        let delays = match self {
            Self::Backoff(delays) => delays,
            Self::ByFailure(categories) => categories.get(category?)?,
        };
        delays.get(attempt).copied().map(Duration::from_secs)
    }

    fn from_value(value: &Value, context: &str) -> QueueResult<Self> {
        serde_json::from_value(value.clone()).map_err(|e| {
            QueueError::Config(format!("invalid retry strategy for '{}': {}", context, e))
        })
    }
}

/// Global default plus per-handler overrides
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryPolicyTable {
    global: Option<RetryStrategy>,
    per_job: HashMap<String, RetryStrategy>,
}

impl RetryPolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_global(mut self, strategy: RetryStrategy) -> Self {
        self.global = Some(strategy);
        self
    }

    /// Register an override; an empty strategy opts the handler out
    pub fn with_job(mut self, class: impl Into<String>, strategy: RetryStrategy) -> Self {
        self.per_job.insert(class.into(), strategy);
        self
    }

    /// Build from an `auto_retry` setting.
    ///
    /// An array is the global default. An object uses its `default` entry as
    /// the global default and every other entry as a per-handler override.
    /// `null` and empty values produce an empty table.
    pub fn from_auto_retry(value: &Value) -> QueueResult<Self> {
        let mut table = Self::new();
        match value {
            Value::Null => {}
            Value::Array(items) if items.is_empty() => {}
            Value::Array(_) => {
                table.global = Some(RetryStrategy::from_value(value, DEFAULT_STRATEGY_KEY)?);
            }
            Value::Object(entries) => {
                for (class, strategy) in entries {
                    let strategy = RetryStrategy::from_value(strategy, class)?;
                    if class == DEFAULT_STRATEGY_KEY {
                        table.global = Some(strategy);
                    } else {
                        table.per_job.insert(class.clone(), strategy);
                    }
                }
            }
            other => {
                return Err(QueueError::Config(format!(
                    "auto_retry must be an array or an object, got {}",
                    other
                )))
            }
        }
        Ok(table)
    }

    /// Strategy to stamp on a job of `class`, if any
    pub fn resolve(&self, class: &str) -> Option<&RetryStrategy> {
        if let Some(strategy) = self.per_job.get(class) {
            return (!strategy.is_empty()).then_some(strategy);
        }
        self.global.as_ref().filter(|s| !s.is_empty())
    }

    pub fn global(&self) -> Option<&RetryStrategy> {
        self.global.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_none() && self.per_job.is_empty()
    }
}
