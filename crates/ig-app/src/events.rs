use std::pin::Pin;
use std::task::{Context, Poll};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::trace;
use uuid::Uuid;
use ig_core::{ProgressEvent, ProgressStatus};

/// Events buffered between a running generation and its reader
pub const PROGRESS_BUFFER: usize = 32;

pub fn channel(generation_id: Uuid) -> (ProgressSink, ProgressStream) {
    let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
    let sink = ProgressSink {
        tx,
        generation_id,
        last: None,
        finished: false,
    };
    let stream = ProgressStream {
        generation_id,
        inner: ReceiverStream::new(rx),
    };
    (sink, stream)
}

/// Writing half of one generation's progress.
///
/// Drops repeated ticks, keeps `generating` ticks non-decreasing and lets through at most
/// one terminal event.
pub struct ProgressSink {
    tx: mpsc::Sender<ProgressEvent>,
    generation_id: Uuid,
    last: Option<(ProgressStatus, u8)>,
    finished: bool,
}

impl ProgressSink {
    pub fn generation_id(&self) -> Uuid {
        self.generation_id
    }

    /// True once the reader has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub async fn emit(&mut self, mut event: ProgressEvent) {
        if self.finished {
            trace!(generation_id = %self.generation_id, "Dropping event after terminal state");
            return;
        }

        if event.status == ProgressStatus::Generating {
            if let Some((ProgressStatus::Generating, previous)) = self.last {
                if event.progress <= previous {
                    return;
                }
            }
        }

        event.generation_id = self.generation_id;
        self.last = Some((event.status, event.progress));
        self.finished = event.is_terminal();

        if self.tx.send(event).await.is_err() {
            trace!(generation_id = %self.generation_id, "Progress reader dropped");
        }
    }

    pub async fn submitting(&mut self) {
        self.emit(ProgressEvent::submitting(self.generation_id)).await
    }

    pub async fn generating(&mut self, progress: u8) {
        self.emit(ProgressEvent::generating(self.generation_id, progress)).await
    }

    pub async fn success(&mut self, url: impl Into<String>) {
        self.emit(ProgressEvent::success(self.generation_id, url)).await
    }

    pub async fn error(&mut self, message: impl Into<String>) {
        self.emit(ProgressEvent::error(self.generation_id, message)).await
    }
}

/// Reading half: ends after the terminal event. Dropping it abandons the generation.
pub struct ProgressStream {
    generation_id: Uuid,
    inner: ReceiverStream<ProgressEvent>,
}

impl ProgressStream {
    pub fn generation_id(&self) -> Uuid {
        self.generation_id
    }
}

impl Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn generating_ticks_never_go_backwards() {
        let (mut sink, stream) = channel(Uuid::new_v4());
        sink.submitting().await;
        sink.generating(30).await;
        sink.generating(31).await;
        sink.generating(31).await;
        sink.generating(30).await;
        sink.generating(40).await;
        drop(sink);

        let progress: Vec<u8> = stream.map(|e| e.progress).collect().await;
        assert_eq!(progress, vec![0, 30, 31, 40]);
    }

    #[tokio::test]
    async fn nothing_follows_a_terminal_event() {
        let id = Uuid::new_v4();
        let (mut sink, stream) = channel(id);
        sink.success("https://x/y.png").await;
        sink.error("late failure").await;
        assert!(sink.is_finished());
        drop(sink);

        let events: Vec<ProgressEvent> = stream.collect().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, ProgressStatus::Success);
        assert_eq!(events[0].generation_id, id);
    }

    #[tokio::test]
    async fn sink_notices_dropped_reader() {
        let (mut sink, stream) = channel(Uuid::new_v4());
        drop(stream);
        assert!(sink.is_closed());
        sink.generating(50).await;
    }
}
