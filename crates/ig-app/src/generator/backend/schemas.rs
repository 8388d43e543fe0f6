use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ig_core::{AspectRatio, Error, GenerationRequest, ImageModel, Result, Task, TaskImage, TaskStatus};

/// Body of `POST /v1/images/generations`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateTaskBody<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_fidelity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    pub aspect_ratio: AspectRatio,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<&'a str>,
}

impl<'a> CreateTaskBody<'a> {
    pub fn new(request: &'a GenerationRequest, model: ImageModel, callback_url: Option<&'a str>) -> Self {
        Self {
            model: model.id(),
            prompt: &request.prompt,
            negative_prompt: request.negative_prompt.as_deref(),
            image: request.reference_image.as_ref().map(|image| image.to_wire()),
            image_fidelity: request.image_fidelity,
            n: request.variant_count,
            aspect_ratio: request.aspect_ratio,
            callback_url,
        }
    }
}

/// `{code, message, data}` wrapper around every response
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub request_id: Option<String>,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskData {
    pub task_id: Option<String>,
    pub task_status: Option<TaskStatus>,
    pub task_status_msg: Option<String>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub task_result: Option<TaskResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskResult {
    #[serde(default)]
    pub images: Vec<TaskImage>,
}

impl TaskData {
    pub fn into_task(self) -> Result<Task> {
        let id = self
            .task_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::ProtocolViolation("response is missing data.task_id".into()))?;

        let mut images = self.task_result.map(|r| r.images).unwrap_or_default();
        images.sort_by_key(|image| image.index);

        Ok(Task {
            id,
            status: self
                .task_status
                .unwrap_or_else(|| TaskStatus::Unknown(String::new())),
            status_message: self.task_status_msg,
            created_at: self.created_at.and_then(millis_to_datetime),
            updated_at: self.updated_at.and_then(millis_to_datetime),
            images,
        })
    }
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}
