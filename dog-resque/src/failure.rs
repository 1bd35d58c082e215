use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::JobPayload;

/// Record a worker appends to the failed list when a job raises
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedJob {
    #[serde(default)]
    pub failed_at: Option<String>,

    pub payload: JobPayload,

    #[serde(default)]
    pub exception: Option<String>,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub backtrace: Value,

    #[serde(default)]
    pub worker: Option<String>,

    pub queue: String,
}

impl FailedJob {
    pub fn queue_name(&self) -> &str {
        &self.queue
    }

    /// Wire class of the failed payload
    pub fn name(&self) -> &str {
        &self.payload.class
    }

    /// First positional argument, as it was queued
    pub fn args(&self) -> Map<String, Value> {
        self.payload.first_arg().cloned().unwrap_or_default()
    }

    /// Handler identity stamped at dispatch time
    pub fn job_class(&self) -> Option<&str> {
        self.payload.job_class()
    }
}
