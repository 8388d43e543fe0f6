use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use async_trait::async_trait;
use ig_core::{Error, GenerationRequest, Result, Task, TaskImage, TaskStatus};
use crate::generator::backend::TaskBackend;

pub fn task(id: &str, status: TaskStatus) -> Task {
    Task {
        id: id.to_string(),
        status,
        status_message: None,
        created_at: None,
        updated_at: None,
        images: Vec::new(),
    }
}

pub fn succeeded(id: &str, url: &str) -> Task {
    Task {
        images: vec![TaskImage { index: 0, url: url.to_string() }],
        ..task(id, TaskStatus::Succeeded)
    }
}

pub fn failed(id: &str, message: Option<&str>) -> Task {
    Task {
        status_message: message.map(str::to_string),
        ..task(id, TaskStatus::Failed)
    }
}

/// Backend that replays scripted results.
///
/// Once a script runs dry, submissions create `task-<prompt>` and fetches either keep
/// reporting `processing` or, with `echo`, succeed with `https://img.test/<task id>.png`.
#[derive(Default)]
pub struct ScriptedBackend {
    submits: Mutex<VecDeque<Result<Task>>>,
    fetches: Mutex<VecDeque<Result<Task>>>,
    echo: bool,
    pub submit_calls: AtomicU32,
    pub fetch_calls: AtomicU32,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn echo() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    pub fn with_submits(self, results: Vec<Result<Task>>) -> Self {
        self.submits.lock().unwrap().extend(results);
        self
    }

    pub fn with_fetches(self, results: Vec<Result<Task>>) -> Self {
        self.fetches.lock().unwrap().extend(results);
        self
    }

    pub fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskBackend for ScriptedBackend {
    async fn submit(&self, request: &GenerationRequest) -> Result<Task> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.submits.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(task(&format!("task-{}", request.prompt), TaskStatus::Submitted))
        })
    }

    async fn fetch_task(&self, task_id: &str) -> Result<Task> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        // Let concurrently running generations interleave.
        tokio::task::yield_now().await;
        let scripted = self.fetches.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            if self.echo {
                Ok(succeeded(task_id, &format!("https://img.test/{task_id}.png")))
            } else {
                Ok(task(task_id, TaskStatus::Processing))
            }
        })
    }
}

pub fn transport_error() -> Error {
    Error::Transport("connection reset by peer".into())
}
