use serde::{Deserialize, Serialize};

/// Tracked job lifecycle, using the numeric codes workers write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Waiting = 1,
    Running = 2,
    Failed = 3,
    Complete = 4,
}

impl JobStatus {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Waiting),
            2 => Some(Self::Running),
            3 => Some(Self::Failed),
            4 => Some(Self::Complete),
            _ => None,
        }
    }

    /// Failed and complete jobs will not change status again
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Complete)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Running => "running",
            Self::Failed => "failed",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Stored status record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: u8,
    pub updated: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<i64>,
}
