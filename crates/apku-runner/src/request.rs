use std::fmt;
use std::sync::Arc;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::outcome::ExecutionOutcome;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-request receiver for batched output and failure markers.
pub trait OutputSink: Send + Sync {
    fn accept(&self, text: &str);
}

impl<F> OutputSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn accept(&self, text: &str) {
        self(text)
    }
}

impl OutputSink for tokio::sync::mpsc::UnboundedSender<String> {
    fn accept(&self, text: &str) {
        let _ = self.send(text.to_string());
    }
}

#[derive(Clone)]
pub struct ExecutionRequest {
    pub command: Vec<String>,
    pub label: String,
    pub sink: Option<Arc<dyn OutputSink>>,
}

impl ExecutionRequest {
    pub fn new<I, S>(command: I, label: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            label: label.into(),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Tokens joined by a single space, as echoed into the log.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

impl fmt::Debug for ExecutionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionRequest")
            .field("command", &self.command)
            .field("label", &self.label)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

/// Returned by `submit`. Dropping it is fine; the request still runs.
#[derive(Debug)]
pub struct RequestHandle {
    pub id: RequestId,
    outcome: oneshot::Receiver<ExecutionOutcome>,
}

impl RequestHandle {
    pub(crate) fn new(id: RequestId, outcome: oneshot::Receiver<ExecutionOutcome>) -> Self {
        Self { id, outcome }
    }

    /// `None` means the request was dropped from the queue by `shutdown`.
    pub async fn wait(self) -> Option<ExecutionOutcome> {
        self.outcome.await.ok()
    }

    /// Must not be called from inside an async runtime.
    pub fn blocking_wait(self) -> Option<ExecutionOutcome> {
        self.outcome.blocking_recv().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    ShutDown,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::ShutDown => write!(f, "process runner has been shut down"),
        }
    }
}

impl std::error::Error for SubmitError {}
