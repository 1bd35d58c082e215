pub mod registry;

pub use registry::{JobHandler, JobRegistry};

use crate::{Job, JobError, QueueResult};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// Trait for defining jobs that can be dispatched to Resque workers.
///
/// The serialized form of the implementing type becomes the job's keyed
/// arguments, so it must serialize to a JSON object.
#[async_trait]
pub trait ResqueJob: Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Context type passed to job execution
    type Context: Send + Sync + Clone + 'static;

    /// Handler identity written into the dispatch marker
    const JOB_CLASS: &'static str;

    /// Queue the job is pushed onto
    const QUEUE: &'static str = "default";

    /// Run the job inside a worker
    async fn perform(&self, ctx: Self::Context) -> Result<(), JobError>;

    /// Get the handler identity
    fn job_class(&self) -> &'static str {
        Self::JOB_CLASS
    }

    /// Convert into a dispatchable job value
    fn to_job(&self) -> QueueResult<Job> {
        Job::from_typed(self)
    }
}
