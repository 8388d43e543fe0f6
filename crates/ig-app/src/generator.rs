use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use futures::{FutureExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;
use ig_core::{Error, GenerationRequest, ProgressEvent, Result};
use crate::events::{self, ProgressSink, ProgressStream};
use crate::generator::backend::config::GenBackendConfig;
use crate::generator::backend::{GenBackend, TaskBackend};
use crate::generator::cache::{ResultCache, SessionCache};
use crate::generator::poller::{PollConfig, TaskPoller};

pub mod backend;
pub mod cache;
pub mod poller;
pub mod retry;

#[cfg(test)]
pub(crate) mod test_support;

/// Turns prompts into image URLs, reporting every step as a [`ProgressEvent`].
///
/// Owns the session's result cache: identical prompts are served from it once one
/// generation for them has succeeded. Identical prompts that are in flight at the same
/// time are not merged.
pub struct Generator {
    backend: Arc<dyn TaskBackend>,
    cache: Arc<dyn ResultCache>,
    poll: PollConfig,
}

impl Generator {
    pub fn new(config: GenBackendConfig) -> Result<Self> {
        let poll = config.poll.clone();
        let backend = GenBackend::new(config)?;
        Ok(Self::with_backend(Arc::new(backend), poll))
    }

    pub fn with_backend(backend: Arc<dyn TaskBackend>, poll: PollConfig) -> Self {
        Self {
            backend,
            cache: Arc::new(SessionCache::default()),
            poll,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &dyn ResultCache {
        self.cache.as_ref()
    }

    /// Generates an image for `prompt` with default options.
    pub async fn generate<F>(&self, prompt: impl Into<String>, on_progress: F)
    where
        F: FnMut(ProgressEvent),
    {
        self.generate_request(GenerationRequest::new(prompt), on_progress).await
    }

    /// Runs `request` to completion, handing every event to `on_progress`.
    ///
    /// The last event is always exactly one `success` or `error`; failures are never
    /// returned any other way.
    pub async fn generate_request<F>(&self, request: GenerationRequest, mut on_progress: F)
    where
        F: FnMut(ProgressEvent),
    {
        let (mut sink, mut stream) = events::channel(Uuid::new_v4());

        let producer = async move {
            self.run_guarded(request, &mut sink).await;
        };
        let consumer = async {
            while let Some(event) = stream.next().await {
                on_progress(event);
            }
        };

        futures::join!(producer, consumer);
    }

    /// Starts `request` on the runtime and returns its progress as a stream.
    ///
    /// Dropping the stream abandons the generation before its next status fetch.
    pub fn generate_stream(self: &Arc<Self>, request: GenerationRequest) -> ProgressStream {
        let (mut sink, stream) = events::channel(Uuid::new_v4());
        let generator = Arc::clone(self);

        tokio::spawn(async move {
            generator.run_guarded(request, &mut sink).await;
        });

        stream
    }

    async fn run_guarded(&self, request: GenerationRequest, sink: &mut ProgressSink) {
        let outcome = AssertUnwindSafe(self.run(request, sink)).catch_unwind().await;
        if outcome.is_err() {
            warn!(generation_id = %sink.generation_id(), "Generation panicked");
            sink.error("internal error while generating").await;
        }
    }

    async fn run(&self, request: GenerationRequest, sink: &mut ProgressSink) {
        if let Err(err) = self.drive(&request, sink).await {
            if err == Error::Abandoned {
                debug!(generation_id = %sink.generation_id(), "Generation abandoned");
            } else {
                warn!(generation_id = %sink.generation_id(), error = %err, "Generation failed");
            }
            sink.error(err.to_string()).await;
        }
    }

    async fn drive(&self, request: &GenerationRequest, sink: &mut ProgressSink) -> Result<()> {
        request.validate()?;

        if let Some(entry) = self.cache.get(&request.prompt) {
            info!(generation_id = %sink.generation_id(), url = %entry.url, "Serving prompt from cache");
            sink.success(entry.url).await;
            return Ok(());
        }

        sink.submitting().await;
        let task = self.backend.submit(request).await?;

        let poller = TaskPoller::new(self.backend.as_ref(), self.cache.as_ref(), &self.poll);
        poller.poll_until_terminal(&task.id, &request.prompt, sink).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ig_core::{ProgressStatus, TaskStatus};
    use crate::generator::test_support::{failed, succeeded, task, ScriptedBackend};

    fn generator(backend: Arc<ScriptedBackend>) -> Generator {
        Generator::with_backend(backend, PollConfig::default())
    }

    async fn collect(generator: &Generator, request: GenerationRequest) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        generator.generate_request(request, |event| events.push(event)).await;
        events
    }

    #[tokio::test(start_paused = true)]
    async fn red_fox_scenario() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .with_submits(vec![Ok(task("T1", TaskStatus::Submitted))])
                .with_fetches(vec![
                    Ok(task("T1", TaskStatus::Processing)),
                    Ok(task("T1", TaskStatus::Processing)),
                    Ok(task("T1", TaskStatus::Processing)),
                    Ok(succeeded("T1", "https://x/y.png")),
                ]),
        );
        let generator = generator(backend.clone());

        let events = collect(&generator, GenerationRequest::new("red fox in snow")).await;

        let statuses: Vec<ProgressStatus> = events.iter().map(|e| e.status).collect();
        assert_eq!(statuses[0], ProgressStatus::Submitting);
        assert_eq!(events[0].progress, 0);
        assert_eq!(*statuses.last().unwrap(), ProgressStatus::Success);
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

        let generating: Vec<u8> = events
            .iter()
            .filter(|e| e.status == ProgressStatus::Generating)
            .map(|e| e.progress)
            .collect();
        assert!(!generating.is_empty());
        assert!(generating.windows(2).all(|w| w[0] <= w[1]));
        assert!(generating.iter().all(|p| (30..90).contains(p)));

        let last = events.last().unwrap();
        assert_eq!(last.progress, 100);
        assert_eq!(last.url.as_deref(), Some("https://x/y.png"));
        assert_eq!(
            generator.cache().get("red fox in snow").unwrap().url,
            "https://x/y.png"
        );

        let id = events[0].generation_id;
        assert!(events.iter().all(|e| e.generation_id == id));
    }

    #[tokio::test(start_paused = true)]
    async fn identical_prompt_is_served_from_cache() {
        let backend = Arc::new(ScriptedBackend::echo());
        let generator = generator(backend.clone());

        let first = collect(&generator, GenerationRequest::new("red fox in snow")).await;
        let second = collect(&generator, GenerationRequest::new("red fox in snow")).await;

        assert_eq!(first.last().unwrap().status, ProgressStatus::Success);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].status, ProgressStatus::Success);
        assert_eq!(second[0].url, first.last().unwrap().url);
        assert_eq!(backend.submit_calls(), 1);
        assert_eq!(backend.fetch_calls(), 1);

        // Whitespace makes a different key.
        collect(&generator, GenerationRequest::new("red fox in snow ")).await;
        assert_eq!(backend.submit_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn submission_failure_becomes_error_event() {
        let backend = Arc::new(
            ScriptedBackend::new().with_submits(vec![Err(Error::RateLimited("HTTP 429".into()))]),
        );
        let generator = generator(backend.clone());

        let events = collect(&generator, GenerationRequest::new("fox")).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, ProgressStatus::Submitting);
        let last = &events[1];
        assert_eq!(last.status, ProgressStatus::Error);
        assert_eq!(last.progress, 0);
        assert!(last.error.as_deref().unwrap().contains("too many requests"));
        assert_eq!(backend.fetch_calls(), 0);
        assert!(generator.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_becomes_error_event() {
        let backend = Arc::new(
            ScriptedBackend::new().with_fetches(vec![Ok(failed("task-fox", Some("prompt rejected")))]),
        );
        let generator = generator(backend);

        let events = collect(&generator, GenerationRequest::new("fox")).await;

        let last = events.last().unwrap();
        assert_eq!(last.status, ProgressStatus::Error);
        assert!(!last.error.as_deref().unwrap().is_empty());
        assert!(last.error.as_deref().unwrap().contains("prompt rejected"));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_request_never_reaches_backend() {
        let backend = Arc::new(ScriptedBackend::echo());
        let generator = generator(backend.clone());

        let events = collect(&generator, GenerationRequest::new("  ")).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, ProgressStatus::Error);
        assert_eq!(backend.submit_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_reported_as_error_not_success() {
        let backend = Arc::new(ScriptedBackend::new());
        let generator = Generator::with_backend(
            backend,
            PollConfig {
                max_attempts: 4,
                ..PollConfig::default()
            },
        );

        let events = collect(&generator, GenerationRequest::new("fox")).await;

        let last = events.last().unwrap();
        assert_eq!(last.status, ProgressStatus::Error);
        assert!(last.error.as_deref().unwrap().contains("timed out"));
        assert!(events.iter().all(|e| e.status != ProgressStatus::Success));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_prompts_keep_separate_streams() {
        let generator = Arc::new(generator(Arc::new(ScriptedBackend::echo())));

        let cat = generator.generate_stream(GenerationRequest::new("cat"));
        let dog = generator.generate_stream(GenerationRequest::new("dog"));
        let (cat_id, dog_id) = (cat.generation_id(), dog.generation_id());
        assert_ne!(cat_id, dog_id);

        let (cat_events, dog_events) =
            tokio::join!(cat.collect::<Vec<_>>(), dog.collect::<Vec<_>>());

        assert!(cat_events.iter().all(|e| e.generation_id == cat_id));
        assert!(dog_events.iter().all(|e| e.generation_id == dog_id));
        assert_eq!(
            cat_events.last().unwrap().url.as_deref(),
            Some("https://img.test/task-cat.png")
        );
        assert_eq!(
            dog_events.last().unwrap().url.as_deref(),
            Some("https://img.test/task-dog.png")
        );
        assert_eq!(generator.cache().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_stream_stops_polling() {
        let backend = Arc::new(ScriptedBackend::new());
        let generator = Arc::new(generator(backend.clone()));

        let mut stream = generator.generate_stream(GenerationRequest::new("fox"));
        assert_eq!(stream.next().await.unwrap().status, ProgressStatus::Submitting);
        drop(stream);

        tokio::time::sleep(PollConfig::default().budget() * 2).await;
        assert!(backend.fetch_calls() <= 2);
    }
}
