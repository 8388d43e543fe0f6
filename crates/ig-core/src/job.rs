use std::fmt;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::model_types::AspectRatio;

/// Reference image for image-to-image generation.
#[derive(Clone, PartialEq)]
pub enum ReferenceImage {
    Url(String),
    Bytes(Vec<u8>),
}

impl ReferenceImage {
    /// Value sent in the `image` field: URLs verbatim, raw bytes as base64
    pub fn to_wire(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Bytes(bytes) => STANDARD.encode(bytes),
        }
    }
}

impl fmt::Debug for ReferenceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub reference_image: Option<ReferenceImage>,
    pub image_fidelity: Option<f32>,
    pub variant_count: Option<u32>,
    pub aspect_ratio: AspectRatio,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: None,
            reference_image: None,
            image_fidelity: None,
            variant_count: None,
            aspect_ratio: AspectRatio::default(),
        }
    }

    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = Some(negative_prompt.into());
        self
    }

    pub fn with_reference_image(mut self, image: ReferenceImage) -> Self {
        self.reference_image = Some(image);
        self
    }

    pub fn with_image_fidelity(mut self, fidelity: f32) -> Self {
        self.image_fidelity = Some(fidelity);
        self
    }

    pub fn with_variant_count(mut self, count: u32) -> Self {
        self.variant_count = Some(count);
        self
    }

    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(Error::InvalidRequest("prompt must not be empty".into()));
        }
        if let Some(fidelity) = self.image_fidelity {
            if !(0.0..=1.0).contains(&fidelity) {
                return Err(Error::InvalidRequest(format!(
                    "image_fidelity must be within [0, 1], got {fidelity}"
                )));
            }
        }
        if self.variant_count == Some(0) {
            return Err(Error::InvalidRequest("variant_count must be at least 1".into()));
        }
        Ok(())
    }
}

/// Remote task state. Statuses this client does not know yet are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Submitted,
    Processing,
    Succeeded,
    Failed,
    Unknown(String),
}

impl TaskStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Submitted | Self::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Submitted => "submitted",
            Self::Processing => "processing",
            Self::Succeeded => "succeed",
            Self::Failed => "failed",
            Self::Unknown(raw) => raw,
        }
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "submitted" => Self::Submitted,
            "processing" => Self::Processing,
            "succeed" | "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            _ => {
                log::warn!("Unrecognized task status: {}", raw);
                Self::Unknown(raw)
            }
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskImage {
    pub index: u32,
    pub url: String,
}

/// Latest snapshot of a remote task. Replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    pub status_message: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub images: Vec<TaskImage>,
}

impl Task {
    /// URL of the first image with a non-empty URL, in result order
    pub fn first_image_url(&self) -> Option<&str> {
        self.images
            .iter()
            .map(|image| image.url.trim())
            .find(|url| !url.is_empty())
    }
}
