//! The ingestion queue: bounded, strict FIFO, one job at a time.

use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::events::{EventBus, LibraryEvent};

use super::job::{self, JobContext, JobError};
use super::source_url;

#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("\"{title}\" ({id}) already has this source")]
    AlreadyExists { id: String, title: String },

    #[error("the ingestion queue is full")]
    QueueFull,

    #[error("the ingestion queue is shut down")]
    ShutDown,
}

#[derive(Debug, Error)]
pub enum CancelError {
    #[error("no job is currently running")]
    NoActiveJob,
}

struct RunningJob {
    source: String,
    cancel: CancellationToken,
}

/// Accepts sources without blocking and drains them with a single worker
/// task, so at most one fetch runs at any time.
pub struct IngestionQueue {
    catalog: Arc<Catalog>,
    tx: mpsc::Sender<String>,
    running: Arc<Mutex<Option<RunningJob>>>,
    last_error: Arc<Mutex<Option<String>>>,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl IngestionQueue {
    /// Spawn the worker and return the queue handle.
    pub fn start(ctx: JobContext, events: Arc<EventBus>, capacity: usize) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(capacity);
        let running = Arc::new(Mutex::new(None));
        let last_error = Arc::new(Mutex::new(None));
        let shutdown = CancellationToken::new();
        let catalog = ctx.catalog.clone();

        let worker = tokio::spawn(worker_loop(
            ctx,
            events,
            rx,
            running.clone(),
            last_error.clone(),
            shutdown.clone(),
        ));

        Arc::new(Self {
            catalog,
            tx,
            running,
            last_error,
            shutdown,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue a source for ingestion. Never blocks: a full queue is an
    /// error the caller sees immediately. Free-text input becomes a
    /// provider search; URLs already present in the catalog are
    /// rejected.
    pub fn enqueue(&self, input: &str) -> Result<(), EnqueueError> {
        let source = if source_url::looks_like_url(input) {
            let entries = self.catalog.all_entries();
            if let Some(existing) = source_url::find_duplicate(input, &entries) {
                return Err(EnqueueError::AlreadyExists {
                    id: existing.id.clone(),
                    title: existing.song_name(),
                });
            }
            input.trim().to_string()
        } else {
            source_url::search_query(input)
        };

        self.tx.try_send(source).map_err(|err| match err {
            TrySendError::Full(_) => EnqueueError::QueueFull,
            TrySendError::Closed(_) => EnqueueError::ShutDown,
        })
    }

    /// Ask the running job to stop. The worker reports the job as
    /// cancelled once the fetch tool has been killed.
    pub fn cancel(&self) -> Result<(), CancelError> {
        let guard = self.running.lock().expect("running lock poisoned");
        match guard.as_ref() {
            Some(running) => {
                info!("Cancelling job for {}", running.source);
                running.cancel.cancel();
                Ok(())
            }
            None => Err(CancelError::NoActiveJob),
        }
    }

    /// Source of the currently running job, if any.
    pub fn current(&self) -> Option<String> {
        self.running
            .lock()
            .expect("running lock poisoned")
            .as_ref()
            .map(|running| running.source.clone())
    }

    /// Error of the most recently finished job, cleared by a success.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .expect("last error lock poisoned")
            .clone()
    }

    /// Stop accepting work, cancel the running job and wait for the
    /// worker to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let _ = self.cancel();
        let handle = self
            .worker
            .lock()
            .expect("worker lock poisoned")
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn worker_loop(
    ctx: JobContext,
    events: Arc<EventBus>,
    mut rx: mpsc::Receiver<String>,
    running: Arc<Mutex<Option<RunningJob>>>,
    last_error: Arc<Mutex<Option<String>>>,
    shutdown: CancellationToken,
) {
    loop {
        let source = tokio::select! {
            _ = shutdown.cancelled() => break,
            source = rx.recv() => match source {
                Some(source) => source,
                None => break,
            },
        };

        let cancel = CancellationToken::new();
        *running.lock().expect("running lock poisoned") = Some(RunningJob {
            source: source.clone(),
            cancel: cancel.clone(),
        });
        events.emit(LibraryEvent::JobStarted {
            url: source.clone(),
        });

        let result = job::run(&ctx, &source, &cancel).await;

        *running.lock().expect("running lock poisoned") = None;
        let error = match result {
            Ok(_) => None,
            Err(JobError::Cancelled) => {
                info!("Job for {} was cancelled", source);
                Some(JobError::Cancelled.to_string())
            }
            Err(err) => {
                warn!("Job for {} failed: {}", source, err);
                Some(err.to_string())
            }
        };
        *last_error.lock().expect("last error lock poisoned") = error.clone();
        events.emit(LibraryEvent::JobFinished { error });
    }
}
