pub mod ids;
pub mod job;
pub mod payload;
pub mod status;
pub mod delayed;
pub mod events;

pub use ids::{StatusId, WorkerId};
pub use job::{Job, JOB_CLASS_KEY, RETRY_STRATEGY_KEY};
pub use payload::{JobPayload, PendingJob};
pub use status::{JobStatus, StatusRecord};
pub use delayed::DelayedTimestamp;
pub use events::DispatchEvent;
