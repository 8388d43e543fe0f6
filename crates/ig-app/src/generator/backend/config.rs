use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use ig_core::{Error, ImageModel, Result};
use crate::generator::backend::auth::Credentials;
use crate::generator::poller::PollConfig;
use crate::generator::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://api.klingai.com";

#[derive(Debug, Clone)]
pub struct GenBackendConfig {
    pub base_url: String,
    pub credentials: Credentials,
    pub model: ImageModel,
    pub callback_url: Option<String>,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub poll: PollConfig,
}

impl GenBackendConfig {
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            base_url: base_url.into(),
            credentials,
            model: ImageModel::default(),
            callback_url: None,
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            poll: PollConfig::default(),
        }
    }

    /// Reads `.env` (if present) and the process environment
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) => debug!("No .env file loaded: {}", e),
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let credentials = Credentials::new(
            get("KLING_ACCESS_KEY").unwrap_or_default(),
            get("KLING_SECRET_KEY").unwrap_or_default(),
        );
        let base_url = get("KLING_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut config = Self::new(base_url, credentials);
        config.callback_url = get("KLING_CALLBACK_URL");

        if let Some(model) = get("KLING_MODEL") {
            config.model = model
                .parse()
                .map_err(|_| Error::Configuration(format!("KLING_MODEL has unknown model {model:?}")))?;
        }

        let timeout_secs = parse_var(&get, "KLING_REQUEST_TIMEOUT_SECS", 30u64)?;
        config.request_timeout = Duration::from_secs(timeout_secs);

        config.retry = RetryPolicy {
            max_attempts: parse_var(&get, "KLING_RETRY_MAX_ATTEMPTS", config.retry.max_attempts)?,
            base_delay: Duration::from_millis(parse_var(&get, "KLING_RETRY_BASE_DELAY_MS", 1000u64)?),
            exponential_backoff: parse_var(&get, "KLING_RETRY_BACKOFF", true)?,
        };

        config.poll.interval = Duration::from_millis(parse_var(&get, "KLING_POLL_INTERVAL_MS", 5000u64)?);
        config.poll.max_attempts = parse_var(&get, "KLING_POLL_MAX_ATTEMPTS", config.poll.max_attempts)?;
        config.poll.max_failures = parse_var(&get, "KLING_POLL_MAX_FAILURES", config.poll.max_failures)?;

        Ok(config)
    }
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Configuration(format!("{key} must be a valid value ({e}): {raw:?}"))),
        None => Ok(default),
    }
}
