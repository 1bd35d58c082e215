use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{QueueError, QueueResult, ResqueJob, retry::RetryStrategy};

/// Argument key holding the handler identity (the dispatch marker)
pub const JOB_CLASS_KEY: &str = "resque.jobclass";

/// Argument key holding the resolved retry strategy
pub const RETRY_STRATEGY_KEY: &str = "resque.retry_strategy";

/// A unit of work waiting to be dispatched.
///
/// The queue and handler identity are fixed at construction. Arguments
/// stay mutable until the job is handed to the dispatcher, which stamps
/// the reserved keys and serializes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    queue: String,
    class: String,
    args: Map<String, Value>,
}

impl Job {
    /// Create a job with no arguments
    pub fn new(queue: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            class: class.into(),
            args: Map::new(),
        }
    }

    /// Build a job from a typed job definition
    pub fn from_typed<J: ResqueJob>(job: &J) -> QueueResult<Self> {
        match serde_json::to_value(job)? {
            Value::Object(args) => Ok(Self::new(J::QUEUE, J::JOB_CLASS).with_args(args)),
            other => Err(QueueError::Serialization(format!(
                "job '{}' must serialize to an object, got {}",
                J::JOB_CLASS,
                other
            ))),
        }
    }

    /// Set a single argument
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Replace all arguments
    pub fn with_args(mut self, args: Map<String, Value>) -> Self {
        self.args = args;
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Handler identity
    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn args(&self) -> &Map<String, Value> {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.args
    }

    pub fn into_args(self) -> Map<String, Value> {
        self.args
    }

    /// Whether the dispatch marker has been stamped
    pub fn is_wrapped(&self) -> bool {
        self.args.get(JOB_CLASS_KEY).and_then(Value::as_str) == Some(self.class.as_str())
    }

    /// Retry strategy stamped on this job, if any
    pub fn retry_strategy(&self) -> Option<RetryStrategy> {
        self.args
            .get(RETRY_STRATEGY_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Merge option values into the arguments; options win on key clashes
    pub(crate) fn merge_options(&mut self, options: &Map<String, Value>) {
        for (key, value) in options {
            self.args.insert(key.clone(), value.clone());
        }
    }

    pub(crate) fn attach_retry_strategy(&mut self, strategy: &RetryStrategy) -> QueueResult<()> {
        self.args.insert(RETRY_STRATEGY_KEY.to_string(), serde_json::to_value(strategy)?);
        Ok(())
    }

    /// Stamp the dispatch marker
    pub(crate) fn wrap(&mut self) {
        self.args.insert(JOB_CLASS_KEY.to_string(), Value::String(self.class.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_and_wrap() {
        let mut job = Job::new("emails", "SendWelcome").with_arg("user_id", 42);
        assert!(!job.is_wrapped());

        job.wrap();
        assert!(job.is_wrapped());
        assert_eq!(job.args()[JOB_CLASS_KEY], json!("SendWelcome"));
        assert_eq!(job.args()["user_id"], json!(42));
    }

    #[test]
    fn test_options_override_caller_args() {
        let mut job = Job::new("q", "C").with_arg("env", "dev").with_arg("keep", true);
        let mut options = Map::new();
        options.insert("env".to_string(), json!("prod"));

        job.merge_options(&options);
        assert_eq!(job.args()["env"], json!("prod"));
        assert_eq!(job.args()["keep"], json!(true));
    }

    #[test]
    fn test_retry_strategy_roundtrips_through_args() {
        let mut job = Job::new("q", "C");
        job.attach_retry_strategy(&RetryStrategy::Backoff(vec![0, 60])).unwrap();

        assert_eq!(job.args()[RETRY_STRATEGY_KEY], json!([0, 60]));
        assert_eq!(job.retry_strategy(), Some(RetryStrategy::Backoff(vec![0, 60])));
    }
}
