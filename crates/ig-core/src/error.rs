use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can end a generation.
///
/// Transport-level variants (`RateLimited`, `Http`, `Transport`) are absorbed by the
/// retry layers and only reach the caller once those are exhausted. Everything else
/// ends polling as soon as it is seen.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("too many requests: the image service is rate limiting this client ({0})")]
    RateLimited(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("image service error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("generation failed: {0}")]
    RemoteFailure(String),

    #[error("timed out waiting for task {task_id} after {attempts} polls")]
    Timeout { task_id: String, attempts: u32 },

    #[error("progress stream dropped by the caller")]
    Abandoned,
}

impl Error {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Failures worth another status fetch. A payload the service actually sent
    /// (`Api`, `ProtocolViolation`) will read the same on the next poll.
    pub fn is_poll_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Http { .. } | Self::Transport(_))
    }
}
