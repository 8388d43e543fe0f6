pub mod error;
pub mod job;
pub mod progress;
mod model_types;

pub use error::{Error, Result};
pub use job::{GenerationRequest, ReferenceImage, Task, TaskImage, TaskStatus};
pub use model_types::{AspectRatio, ImageModel};
pub use progress::{ProgressEvent, ProgressStatus};
