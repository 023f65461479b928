use std::time::Duration;

use apku_runner::OutputSink;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

use crate::parser::parse;
use crate::report::ParsedReport;

pub const DEFAULT_QUIET: Duration = Duration::from_millis(500);

enum Feed {
    Chunk(String),
    Finish,
}

/// Accumulates streamed output and re-parses all of it once the stream has
/// been quiet for a while.
#[derive(Clone, Debug)]
pub struct ReportWatcher {
    tx: mpsc::UnboundedSender<Feed>,
}

impl ReportWatcher {
    /// Starts the watcher task on the current tokio runtime. The returned
    /// handle completes after `finish` once the last report was delivered.
    pub fn spawn<F>(quiet: Duration, on_report: F) -> (Self, JoinHandle<()>)
    where
        F: FnMut(ParsedReport) + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(watch(rx, quiet, on_report));
        (Self { tx }, task)
    }

    pub fn push(&self, chunk: &str) {
        let _ = self.tx.send(Feed::Chunk(chunk.to_string()));
    }

    /// Parses whatever is pending right away and stops the watcher.
    pub fn finish(&self) {
        let _ = self.tx.send(Feed::Finish);
    }
}

impl OutputSink for ReportWatcher {
    fn accept(&self, text: &str) {
        self.push(text);
    }
}

async fn watch<F>(mut rx: mpsc::UnboundedReceiver<Feed>, quiet: Duration, mut on_report: F)
where
    F: FnMut(ParsedReport),
{
    let mut text = String::new();
    let mut pending = false;
    let mut deadline = Instant::now();

    loop {
        tokio::select! {
            feed = rx.recv() => match feed {
                Some(Feed::Chunk(chunk)) => {
                    trace!(bytes = chunk.len(), "report chunk");
                    text.push_str(&chunk);
                    pending = true;
                    deadline = Instant::now() + quiet;
                }
                Some(Feed::Finish) | None => break,
            },
            _ = sleep_until(deadline), if pending => {
                pending = false;
                debug!(bytes = text.len(), "quiet period elapsed, parsing report");
                on_report(parse(&text));
            }
        }
    }

    if pending {
        debug!(bytes = text.len(), "watcher finished, parsing pending report");
        on_report(parse(&text));
    }
}
