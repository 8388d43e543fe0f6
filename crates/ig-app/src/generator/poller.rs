use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use ig_core::{Error, Result, Task, TaskStatus};
use crate::events::ProgressSink;
use crate::generator::backend::TaskBackend;
use crate::generator::cache::ResultCache;

/// Progress reported once the first status fetch succeeds
pub const PROGRESS_FLOOR: u8 = 30;
/// Estimates for pending tasks stay strictly below this
pub const PROGRESS_CEILING: u8 = 90;

const FAILED_FALLBACK: &str = "the image service reported the task as failed";

#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
    /// Consecutive fetch failures before the loop starts backing off
    pub max_failures: u32,
    pub max_failure_backoff: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 60,
            max_failures: 3,
            max_failure_backoff: Duration::from_secs(30),
        }
    }
}

impl PollConfig {
    /// Linear estimate in `[PROGRESS_FLOOR, PROGRESS_CEILING)`. The remote side reports
    /// no percentage, so this only tracks how much of the poll budget is spent.
    pub fn estimate_progress(&self, attempt: u32) -> u8 {
        let max = u64::from(self.max_attempts.max(1));
        let spent = u64::from(attempt.min(self.max_attempts));
        let span = u64::from(PROGRESS_CEILING - PROGRESS_FLOOR);
        let estimate = u64::from(PROGRESS_FLOOR) + span * spent / max;
        estimate.min(u64::from(PROGRESS_CEILING - 1)) as u8
    }

    /// Pause after `failures` consecutive failed fetches
    pub fn failure_backoff(&self, failures: u32) -> Duration {
        if failures < self.max_failures {
            return self.interval;
        }
        let scaled = self.interval.as_secs_f64() * 1.5f64.powi(failures as i32);
        Duration::from_secs_f64(scaled.min(self.max_failure_backoff.as_secs_f64()))
    }

    /// Wall-clock ceiling of one polling session
    pub fn budget(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

/// Drives one remote task to a terminal state.
pub struct TaskPoller<'a> {
    backend: &'a dyn TaskBackend,
    cache: &'a dyn ResultCache,
    config: &'a PollConfig,
}

impl<'a> TaskPoller<'a> {
    pub fn new(backend: &'a dyn TaskBackend, cache: &'a dyn ResultCache, config: &'a PollConfig) -> Self {
        Self { backend, cache, config }
    }

    /// Polls `task_id` until it succeeds, fails or the attempt budget runs out.
    ///
    /// On success the first image URL is cached under `prompt`, reported as the terminal
    /// success event and returned. Every other outcome is returned as an error for the
    /// caller to report.
    pub async fn poll_until_terminal(
        &self,
        task_id: &str,
        prompt: &str,
        sink: &mut ProgressSink,
    ) -> Result<String> {
        let mut failures = 0u32;
        let mut generating = false;

        for attempt in 1..=self.config.max_attempts {
            if sink.is_closed() {
                debug!(task_id, attempt, "Progress reader gone, abandoning task");
                return Err(Error::Abandoned);
            }

            let delay = match self.backend.fetch_task(task_id).await {
                Ok(task) => {
                    failures = 0;
                    if !generating {
                        generating = true;
                        sink.generating(PROGRESS_FLOOR).await;
                    }

                    match &task.status {
                        TaskStatus::Succeeded => return self.finish(&task, prompt, sink).await,
                        TaskStatus::Failed => {
                            let message = task
                                .status_message
                                .as_deref()
                                .map(str::trim)
                                .filter(|m| !m.is_empty())
                                .unwrap_or(FAILED_FALLBACK);
                            return Err(Error::RemoteFailure(message.to_string()));
                        }
                        TaskStatus::Submitted | TaskStatus::Processing => {
                            let progress = self.config.estimate_progress(attempt);
                            debug!(task_id, attempt, progress, status = task.status.as_str(), "Task pending");
                            sink.generating(progress).await;
                        }
                        TaskStatus::Unknown(raw) => {
                            warn!(task_id, attempt, status = raw.as_str(), "Unknown task status, still polling");
                        }
                    }
                    self.config.interval
                }
                Err(err) if !err.is_poll_transient() => return Err(err),
                Err(err) => {
                    failures += 1;
                    let delay = self.config.failure_backoff(failures);
                    warn!(
                        task_id,
                        attempt,
                        failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Status fetch failed"
                    );
                    delay
                }
            };

            if attempt < self.config.max_attempts {
                sleep(delay).await;
            }
        }

        Err(Error::Timeout {
            task_id: task_id.to_string(),
            attempts: self.config.max_attempts,
        })
    }

    async fn finish(&self, task: &Task, prompt: &str, sink: &mut ProgressSink) -> Result<String> {
        let url = task
            .first_image_url()
            .ok_or_else(|| {
                Error::ProtocolViolation(format!("task {} succeeded without an image URL", task.id))
            })?
            .to_string();

        if task.images.len() > 1 {
            debug!(task_id = %task.id, variants = task.images.len(), "Using the first variant only");
        }

        self.cache.put(prompt, &url);
        info!(task_id = %task.id, url = %url, "Generation succeeded");
        sink.success(url.clone()).await;

        Ok(url)
    }
}
