use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Idle,
    Submitting,
    Generating,
    Success,
    Error,
}

impl ProgressStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Submitting | Self::Generating)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// One tick of a generation as seen by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    pub generation_id: Uuid,
    pub status: ProgressStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressEvent {
    fn new(generation_id: Uuid, status: ProgressStatus, progress: u8) -> Self {
        Self {
            generation_id,
            status,
            progress,
            url: None,
            error: None,
        }
    }

    pub fn idle(generation_id: Uuid) -> Self {
        Self::new(generation_id, ProgressStatus::Idle, 0)
    }

    pub fn submitting(generation_id: Uuid) -> Self {
        Self::new(generation_id, ProgressStatus::Submitting, 0)
    }

    pub fn generating(generation_id: Uuid, progress: u8) -> Self {
        Self::new(generation_id, ProgressStatus::Generating, progress.min(100))
    }

    pub fn success(generation_id: Uuid, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::new(generation_id, ProgressStatus::Success, 100)
        }
    }

    pub fn error(generation_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::new(generation_id, ProgressStatus::Error, 0)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
