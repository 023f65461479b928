use std::io::Write;
use std::sync::Arc;

use apku_journal::{Journal, JournalOptions};
use apku_runner::{
    ExecutionOutcome, ExecutionRequest, ProcessRunner, RunnerEvent, RunnerEventQueue,
    RunnerOptions,
};
use tokio::sync::mpsc;
use tracing::debug;

/// Owns the runner and renders its events on the calling task.
pub(crate) struct Console {
    runner: ProcessRunner,
    queue: Arc<RunnerEventQueue>,
    notify: mpsc::Receiver<()>,
    journal: Option<Arc<Journal>>,
    echo_log: bool,
}

impl Console {
    pub(crate) fn start(use_journal: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let (queue, notify) = RunnerEventQueue::new();
        let mut options = RunnerOptions::new(queue.sender());
        let journal = if use_journal {
            let journal = Journal::open(JournalOptions::from_env());
            options = options.with_journal(Arc::clone(&journal));
            Some(journal)
        } else {
            None
        };
        let runner = ProcessRunner::start(options)?;
        Ok(Self {
            runner,
            queue,
            notify,
            journal,
            echo_log: true,
        })
    }

    /// Stops echoing tool output to stdout; status lines still go to stderr.
    pub(crate) fn set_echo_log(&mut self, echo: bool) {
        self.echo_log = echo;
    }

    /// Submits one request and renders events until its outcome arrives.
    pub(crate) async fn run(
        &mut self,
        request: ExecutionRequest,
    ) -> Result<ExecutionOutcome, Box<dyn std::error::Error>> {
        let handle = self.runner.submit(request)?;
        let id = handle.id;
        let mut wait = std::pin::pin!(handle.wait());
        let outcome = loop {
            tokio::select! {
                outcome = &mut wait => break outcome,
                Some(()) = self.notify.recv() => {
                    present(&self.queue, self.echo_log);
                }
            }
        };
        present(&self.queue, self.echo_log);
        debug!(%id, "request settled");
        outcome.ok_or_else(|| "request was dropped before it ran".into())
    }

    pub(crate) async fn close(self) -> Result<(), Box<dyn std::error::Error>> {
        let Console {
            runner, journal, ..
        } = self;
        runner.shutdown();
        tokio::task::spawn_blocking(move || runner.join()).await?;
        if let Some(journal) = journal {
            journal.sync();
        }
        Ok(())
    }
}

fn present(queue: &RunnerEventQueue, echo_log: bool) {
    let mut stdout = std::io::stdout().lock();
    for event in queue.drain() {
        match event {
            RunnerEvent::Log { text, .. } => {
                if echo_log {
                    let _ = stdout.write_all(text.as_bytes());
                }
            }
            RunnerEvent::Status { text } => eprintln!(":: {text}"),
            RunnerEvent::Progress { visible } => debug!(visible, "progress"),
            RunnerEvent::Finished {
                request_id,
                label,
                outcome,
            } => debug!(%request_id, "{label} -> {outcome}"),
        }
    }
    let _ = stdout.flush();
}
