use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::ResqueJob;
use crate::{JobError, PendingJob, QueueError, QueueResult, JOB_CLASS_KEY};

/// Type-erased job handler for runtime dispatch
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run a job from its keyed arguments
    async fn perform(
        &self,
        args: &Map<String, Value>,
        context: Arc<dyn Any + Send + Sync>,
    ) -> Result<(), JobError>;

    /// Get the handler identity this handler serves
    fn job_class(&self) -> &'static str;
}

struct TypedJobHandler<J: ResqueJob> {
    _phantom: std::marker::PhantomData<J>,
}

impl<J: ResqueJob> TypedJobHandler<J> {
    fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<J: ResqueJob> JobHandler for TypedJobHandler<J> {
    async fn perform(
        &self,
        args: &Map<String, Value>,
        context: Arc<dyn Any + Send + Sync>,
    ) -> Result<(), JobError> {
        // Reserved keys ride along in the map; serde skips unknown fields
        let job: J = serde_json::from_value(Value::Object(args.clone()))
            .map_err(|e| JobError::Permanent(format!("Failed to deserialize job: {}", e)))?;

        let typed_context = context
            .downcast_ref::<J::Context>()
            .ok_or_else(|| JobError::Permanent("Invalid context type".to_string()))?
            .clone();

        job.perform(typed_context).await
    }

    fn job_class(&self) -> &'static str {
        J::JOB_CLASS
    }
}

/// Maps handler identities to typed handlers.
///
/// This is the worker-side half of the dispatch marker: the wire class of
/// every payload is the same wrapper, and the registry picks the real
/// handler from `resque.jobclass`.
pub struct JobRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a job type
    pub fn register<J: ResqueJob>(&mut self) -> QueueResult<()> {
        let handler = Arc::new(TypedJobHandler::<J>::new());
        let class = handler.job_class().to_string();

        if self.handlers.contains_key(&class) {
            return Err(QueueError::Internal(format!("Job class '{}' already registered", class)));
        }

        self.handlers.insert(class, handler);
        Ok(())
    }

    /// Run a job from its stamped arguments
    pub async fn perform(
        &self,
        args: &Map<String, Value>,
        context: Arc<dyn Any + Send + Sync>,
    ) -> Result<(), JobError> {
        let class = args
            .get(JOB_CLASS_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| JobError::Permanent(format!("Missing '{}' marker", JOB_CLASS_KEY)))?;

        let handler = self
            .handlers
            .get(class)
            .ok_or_else(|| JobError::Permanent(format!("Unknown job class: {}", class)))?;

        handler.perform(args, context).await
    }

    /// Run a payload read back from a queue
    pub async fn perform_pending(
        &self,
        pending: &PendingJob,
        context: Arc<dyn Any + Send + Sync>,
    ) -> Result<(), JobError> {
        let args = pending
            .payload
            .first_arg()
            .ok_or_else(|| JobError::Permanent("Payload has no keyed arguments".to_string()))?;
        self.perform(args, context).await
    }

    /// Look up a handler, failing with a typed error
    pub fn handler(&self, class: &str) -> QueueResult<Arc<dyn JobHandler>> {
        self.handlers
            .get(class)
            .cloned()
            .ok_or_else(|| QueueError::JobTypeNotRegistered(class.to_string()))
    }

    pub fn is_registered(&self, class: &str) -> bool {
        self.handlers.contains_key(class)
    }

    /// Registered handler identities, sorted
    pub fn registered_classes(&self) -> Vec<String> {
        let mut classes: Vec<String> = self.handlers.keys().cloned().collect();
        classes.sort();
        classes
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
