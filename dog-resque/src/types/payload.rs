use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Job, StatusId, JOB_CLASS_KEY};
use crate::{QueueError, QueueResult};

/// Wire record stored in queue lists, delayed buckets and failed records.
///
/// Immediate payloads carry `id` and `queue_time`. Delayed payloads carry
/// `queue` instead, because the bucket is keyed by timestamp rather than by
/// queue name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    /// Class the worker instantiates (the dispatch wrapper)
    pub class: String,

    #[serde(default)]
    pub args: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_time: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
}

impl JobPayload {
    /// Payload for an immediate push
    pub fn immediate(class: impl Into<String>, args: Value, id: &StatusId) -> Self {
        let now = Utc::now();
        let queue_time = now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0;

        Self {
            class: class.into(),
            args: vec![args],
            id: Some(id.as_str().to_string()),
            queue_time: Some(queue_time),
            queue: None,
        }
    }

    /// Payload for a delayed bucket
    pub fn delayed(class: impl Into<String>, queue: impl Into<String>, args: Value) -> Self {
        Self {
            class: class.into(),
            args: vec![args],
            id: None,
            queue_time: None,
            queue: Some(queue.into()),
        }
    }

    /// Decode a stored record
    pub fn decode(raw: &str) -> QueueResult<Self> {
        serde_json::from_str(raw).map_err(|e| QueueError::decode("job payload", e))
    }

    /// First positional argument when it is a keyed map
    pub fn first_arg(&self) -> Option<&Map<String, Value>> {
        self.args.first().and_then(Value::as_object)
    }

    /// Handler identity stamped by the dispatcher, if present
    pub fn job_class(&self) -> Option<&str> {
        self.first_arg()
            .and_then(|args| args.get(JOB_CLASS_KEY))
            .and_then(Value::as_str)
    }

    pub fn status_id(&self) -> Option<StatusId> {
        self.id.as_deref().map(StatusId::from)
    }
}

/// A payload read back from a queue list
#[derive(Debug, Clone, PartialEq)]
pub struct PendingJob {
    pub queue: String,
    pub payload: JobPayload,
}

impl PendingJob {
    /// Handler identity, falling back to the wire class for payloads that
    /// were not pushed through the dispatcher
    pub fn class(&self) -> &str {
        self.payload.job_class().unwrap_or(&self.payload.class)
    }

    pub fn args(&self) -> Map<String, Value> {
        self.payload.first_arg().cloned().unwrap_or_default()
    }

    pub fn id(&self) -> Option<StatusId> {
        self.payload.status_id()
    }

    /// Rebuild the job value object (stamped keys included)
    pub fn to_job(&self) -> Job {
        Job::new(self.queue.clone(), self.class()).with_args(self.args())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_resque_payload() {
        let raw = r#"{"class":"W","args":[{"resque.jobclass":"SendWelcome","user_id":42}],"id":"abc","queue_time":1.5}"#;
        let payload = JobPayload::decode(raw).unwrap();

        assert_eq!(payload.job_class(), Some("SendWelcome"));
        assert_eq!(payload.status_id(), Some(StatusId::from("abc")));
        assert_eq!(payload.first_arg().unwrap()["user_id"], json!(42));
    }

    #[test]
    fn test_decode_failure_is_decode_error() {
        let err = JobPayload::decode("{not json").unwrap_err();
        assert!(matches!(err, QueueError::Decode(_)));
    }

    #[test]
    fn test_pending_job_falls_back_to_wire_class() {
        let pending = PendingJob {
            queue: "legacy".to_string(),
            payload: JobPayload::decode(r#"{"class":"Plain","args":[]}"#).unwrap(),
        };
        assert_eq!(pending.class(), "Plain");
        assert!(pending.args().is_empty());
        assert_eq!(pending.to_job().queue(), "legacy");
    }

    #[test]
    fn test_delayed_payload_omits_id() {
        let payload = JobPayload::delayed("W", "emails", json!({"a": 1}));
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["queue"], json!("emails"));
    }
}
