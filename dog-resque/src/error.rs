use thiserror::Error;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Infrastructure errors for dispatch and introspection
#[derive(Error, Debug, Clone)]
pub enum QueueError {
    /// The store could not be reached or rejected a command
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("WRONGTYPE key '{key}' does not hold a {expected}")]
    WrongType { key: String, expected: &'static str },

    /// A stored record could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid worker id: {0}")]
    InvalidWorkerId(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Job type not registered: {0}")]
    JobTypeNotRegistered(String),

    #[error("Job execution failed: {0}")]
    JobFailed(#[from] JobError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    /// Build a decode error with the offending record attached
    pub fn decode(what: &str, err: impl std::fmt::Display) -> Self {
        Self::Decode(format!("{}: {}", what, err))
    }

    /// Check whether the error came from the store connection
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

/// Job execution outcome - determines retry behavior
#[derive(Error, Debug, Clone)]
pub enum JobError {
    /// Retryable error - worker may schedule a retry
    #[error("Retryable error: {0}")]
    Retryable(String),

    /// Permanent error - fail immediately, no retry
    #[error("Permanent error: {0}")]
    Permanent(String),
}

impl JobError {
    /// Create a retryable error
    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable(msg.into())
    }

    /// Create a permanent error
    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        match self {
            Self::Retryable(msg) | Self::Permanent(msg) => msg,
        }
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for QueueError {
    fn from(err: redis::RedisError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}
