use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use apku_journal::Journal;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, info_span, Instrument};

use crate::batch::BatchPolicy;
use crate::events::RunnerEventSender;
use crate::exec::{execute, Timeline};
use crate::outcome::ExecutionOutcome;
use crate::request::{ExecutionRequest, RequestHandle, RequestId, SubmitError};

#[derive(Clone)]
pub struct RunnerOptions {
    pub events: RunnerEventSender,
    pub journal: Option<Arc<Journal>>,
    pub batch: BatchPolicy,
}

impl RunnerOptions {
    pub fn new(events: RunnerEventSender) -> Self {
        Self {
            events,
            journal: None,
            batch: BatchPolicy::default(),
        }
    }

    pub fn with_journal(mut self, journal: Arc<Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_batch_policy(mut self, batch: BatchPolicy) -> Self {
        self.batch = batch;
        self
    }
}

struct Job {
    id: RequestId,
    request: ExecutionRequest,
    done: oneshot::Sender<ExecutionOutcome>,
}

/// Serial executor for external tools: one background thread, one FIFO
/// queue, one process at a time.
pub struct ProcessRunner {
    queue: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    stopped: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ProcessRunner {
    pub fn start(options: RunnerOptions) -> io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let stopped = Arc::new(AtomicBool::new(false));
        let worker_stopped = Arc::clone(&stopped);

        // The worker owns a private runtime so callers need not be async.
        let thread = std::thread::Builder::new()
            .name("apku-runner".into())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(err) => {
                        error!("process runner: failed to build tokio runtime: {err}");
                        return;
                    }
                };
                rt.block_on(worker_loop(rx, options, worker_stopped));
            })?;

        Ok(Self {
            queue: Mutex::new(Some(tx)),
            stopped,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Enqueues a request and returns immediately.
    pub fn submit(&self, request: ExecutionRequest) -> Result<RequestHandle, SubmitError> {
        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = queue.as_ref() else {
            return Err(SubmitError::ShutDown);
        };
        let id = RequestId::new();
        let (done, outcome) = oneshot::channel();
        debug!(%id, command = %request.command_line(), "queued {}", request.label);
        tx.send(Job { id, request, done })
            .map_err(|_| SubmitError::ShutDown)?;
        Ok(RequestHandle::new(id, outcome))
    }

    /// Stops accepting requests and drops the ones still waiting. A process
    /// that is already running is left to finish.
    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.take().is_some() {
            info!("process runner shutting down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Waits for the worker thread after `shutdown`.
    pub fn join(&self) {
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("process runner worker panicked");
            }
        }
    }
}

impl Drop for ProcessRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn worker_loop(
    mut rx: mpsc::UnboundedReceiver<Job>,
    options: RunnerOptions,
    stopped: Arc<AtomicBool>,
) {
    let timeline = Timeline::new(options.events.clone(), options.journal.clone());
    while let Some(job) = rx.recv().await {
        if stopped.load(Ordering::SeqCst) {
            debug!(id = %job.id, "dropping queued request {}", job.request.label);
            continue;
        }
        let span = info_span!("request", id = %job.id, label = %job.request.label);
        let outcome = execute(job.id, &job.request, options.batch, &timeline)
            .instrument(span)
            .await;
        let _ = job.done.send(outcome);
    }
    debug!("process runner queue closed");
}
