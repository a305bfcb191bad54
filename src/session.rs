//! Async driver for live streams.
//!
//! A [`LiveSession`] owns one feed task per followed source. Feed tasks
//! forward raw chunks over a single `mpsc` channel, tagged with the session
//! generation, and the session applies them to its [`StreamReconciler`]
//! one at a time. Parsing therefore stays single-threaded while the feeds
//! run concurrently.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::batch::MergedView;
use crate::entry::{LogEntry, SourceId};
use crate::source::LogSource;
use crate::stream::{ChunkUpdate, StreamReconciler};

/// Default number of lines a live stream starts from.
pub const DEFAULT_FOLLOW_TAIL: usize = 10;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
enum FeedEvent {
    Chunk(String),
    Failed(String),
    Ended,
}

#[derive(Debug)]
struct FeedMessage {
    generation: u64,
    source_id: SourceId,
    event: FeedEvent,
}

/// What one call to [`LiveSession::next_update`] changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// A chunk was ingested.
    Entries {
        source_id: SourceId,
        update: ChunkUpdate,
    },
    /// A feed ended, cleanly or with an error.
    SourceFinished {
        source_id: SourceId,
        error: Option<String>,
        update: ChunkUpdate,
    },
}

struct ActiveFeeds {
    generation: u64,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    rx: mpsc::Receiver<FeedMessage>,
}

impl Drop for ActiveFeeds {
    fn drop(&mut self) {
        self.cancel.cancel();
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// A restartable live stream over a set of sources.
pub struct LiveSession {
    source: Arc<dyn LogSource>,
    reconciler: StreamReconciler,
    tail: Option<usize>,
    active: Option<ActiveFeeds>,
}

impl LiveSession {
    pub fn new(source: Arc<dyn LogSource>, reconciler: StreamReconciler) -> Self {
        Self {
            source,
            reconciler,
            tail: Some(DEFAULT_FOLLOW_TAIL),
            active: None,
        }
    }

    /// Lines of history each feed starts from (`None` for everything).
    #[must_use]
    pub fn with_tail(mut self, tail: Option<usize>) -> Self {
        self.tail = tail;
        self
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Entries of the running session, in arrival order.
    pub fn entries(&self) -> &[LogEntry] {
        self.reconciler.entries()
    }

    /// Start following `source_ids`. Any running session is stopped first and
    /// its pending output discarded. Must be called within a tokio runtime.
    pub fn start(&mut self, source_ids: &[SourceId]) -> u64 {
        if self.active.is_some() {
            self.stop();
        }
        let generation = self.reconciler.start(source_ids);
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let mut seen = HashSet::with_capacity(source_ids.len());
        let mut tasks = Vec::with_capacity(source_ids.len());
        for source_id in source_ids.iter().filter(|id| seen.insert(Arc::clone(id))) {
            tasks.push(tokio::spawn(run_feed(
                Arc::clone(&self.source),
                Arc::clone(source_id),
                self.tail,
                generation,
                tx.clone(),
                cancel.child_token(),
            )));
        }

        self.active = Some(ActiveFeeds {
            generation,
            cancel,
            tasks,
            rx,
        });
        generation
    }

    /// Wait for the next feed message and apply it.
    ///
    /// Returns `None` when no session is running or every feed has ended.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        loop {
            let active = self.active.as_mut()?;
            let message = active.rx.recv().await?;
            if message.generation != active.generation {
                continue;
            }
            let generation = message.generation;
            let source_id = message.source_id;
            return Some(match message.event {
                FeedEvent::Chunk(text) => SessionUpdate::Entries {
                    update: self.reconciler.ingest(generation, &source_id, &text),
                    source_id,
                },
                FeedEvent::Failed(error) => SessionUpdate::SourceFinished {
                    update: self
                        .reconciler
                        .finish_source(generation, &source_id, Some(error.clone())),
                    error: Some(error),
                    source_id,
                },
                FeedEvent::Ended => SessionUpdate::SourceFinished {
                    update: self.reconciler.finish_source(generation, &source_id, None),
                    error: None,
                    source_id,
                },
            });
        }
    }

    /// Halt every feed and return the terminal, sorted view.
    ///
    /// Messages still queued in the channel are discarded.
    pub fn stop(&mut self) -> MergedView {
        drop(self.active.take());
        self.reconciler.stop()
    }
}

async fn run_feed(
    source: Arc<dyn LogSource>,
    source_id: SourceId,
    tail: Option<usize>,
    generation: u64,
    tx: mpsc::Sender<FeedMessage>,
    cancel: CancellationToken,
) {
    let message = |event| FeedMessage {
        generation,
        source_id: Arc::clone(&source_id),
        event,
    };

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        opened = source.follow(&source_id, tail) => opened,
    };
    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            let _ = tx.send(message(FeedEvent::Failed(e.message))).await;
            return;
        }
    };

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            item = stream.next() => match item {
                Some(Ok(chunk)) => FeedEvent::Chunk(chunk),
                Some(Err(e)) => FeedEvent::Failed(e.message),
                None => FeedEvent::Ended,
            },
        };
        let done = !matches!(event, FeedEvent::Chunk(_));
        if tx.send(message(event)).await.is_err() || done {
            return;
        }
    }
}
