use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::outcome::ExecutionOutcome;
use crate::request::RequestId;

/// Updates the runner owes the presentation layer. The runner never touches
/// rendering state itself; whoever owns the UI drains these in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunnerEvent {
    /// Text appended to the shared output log.
    Log { request_id: RequestId, text: String },
    Status { text: String },
    Progress { visible: bool },
    Finished {
        request_id: RequestId,
        label: String,
        outcome: ExecutionOutcome,
    },
}

#[derive(Clone)]
pub struct RunnerEventSender {
    inner: Arc<RunnerEventQueue>,
}

pub struct RunnerEventQueue {
    queue: Mutex<VecDeque<RunnerEvent>>,
    notify: mpsc::Sender<()>,
}

impl RunnerEventQueue {
    pub fn new() -> (Arc<Self>, mpsc::Receiver<()>) {
        let (notify, notify_rx) = mpsc::channel(1);
        (
            Arc::new(Self {
                queue: Mutex::new(VecDeque::new()),
                notify,
            }),
            notify_rx,
        )
    }

    pub fn sender(self: &Arc<Self>) -> RunnerEventSender {
        RunnerEventSender {
            inner: Arc::clone(self),
        }
    }

    pub fn drain(&self) -> Vec<RunnerEvent> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    fn push(&self, event: RunnerEvent) {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let was_empty = queue.is_empty();

        // Indicator updates only matter as their latest value; log text and
        // terminal events are never merged or dropped.
        match &event {
            RunnerEvent::Progress { .. } => {
                if let Some(existing) = queue
                    .iter_mut()
                    .find(|ev| matches!(ev, RunnerEvent::Progress { .. }))
                {
                    *existing = event;
                    return;
                }
            }
            RunnerEvent::Status { .. } => {
                if let Some(existing) = queue
                    .iter_mut()
                    .find(|ev| matches!(ev, RunnerEvent::Status { .. }))
                {
                    *existing = event;
                    return;
                }
            }
            _ => {}
        }

        queue.push_back(event);
        if was_empty {
            let _ = self.notify.try_send(());
        }
    }
}

impl RunnerEventSender {
    pub fn send(&self, event: RunnerEvent) {
        self.inner.push(event);
    }
}
