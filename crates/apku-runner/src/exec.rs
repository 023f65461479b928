use std::process::Stdio;
use std::sync::Arc;

use apku_journal::{Journal, RecordKind};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::batch::{BatchPolicy, OutputBatch};
use crate::events::{RunnerEvent, RunnerEventSender};
use crate::outcome::{normalize_exit, separator, ExecutionOutcome, SpawnFailure};
use crate::request::{ExecutionRequest, OutputSink, RequestId};

const LINE_CHANNEL_CAPACITY: usize = 256;

/// Single ordered writer for everything one request shows the user.
pub(crate) struct Timeline {
    events: RunnerEventSender,
    journal: Option<Arc<Journal>>,
}

impl Timeline {
    pub(crate) fn new(events: RunnerEventSender, journal: Option<Arc<Journal>>) -> Self {
        Self { events, journal }
    }

    fn log(&self, request_id: RequestId, kind: RecordKind, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(journal) = &self.journal {
            journal.append(Some(&request_id.to_string()), kind, text);
        }
        self.events.send(RunnerEvent::Log {
            request_id,
            text: text.to_string(),
        });
    }

    fn status(&self, text: impl Into<String>) {
        self.events.send(RunnerEvent::Status { text: text.into() });
    }

    fn progress(&self, visible: bool) {
        self.events.send(RunnerEvent::Progress { visible });
    }
}

enum StreamEvent {
    Line(String),
    Failed(String),
}

/// Runs one request to completion. Every failure class ends up in the
/// returned outcome; nothing propagates.
pub(crate) async fn execute(
    request_id: RequestId,
    request: &ExecutionRequest,
    policy: BatchPolicy,
    timeline: &Timeline,
) -> ExecutionOutcome {
    let sink = request.sink.as_deref();

    timeline.progress(true);
    timeline.status(request.label.clone());
    timeline.log(
        request_id,
        RecordKind::Begin,
        &format!("> {}\n", request.command_line()),
    );
    info!(%request_id, command = %request.command_line(), "starting {}", request.label);

    let outcome = match stream_process(request_id, request, policy, timeline, sink).await {
        Ok(exit_code) => ExecutionOutcome::from_exit_code(exit_code),
        Err(failure) => {
            warn!(%request_id, "{} failed to run: {failure}", request.label);
            ExecutionOutcome::SpawnError {
                message: failure.to_string(),
            }
        }
    };

    let marker = outcome.marker();
    timeline.log(request_id, RecordKind::Outcome, &marker);
    if outcome.forwards_to_sink() {
        if let Some(sink) = sink {
            sink.accept(&marker);
        }
    }
    timeline.progress(false);
    timeline.status(outcome.status_text());
    timeline.log(request_id, RecordKind::Separator, &separator());
    timeline.events.send(RunnerEvent::Finished {
        request_id,
        label: request.label.clone(),
        outcome: outcome.clone(),
    });
    info!(%request_id, "{} finished: {outcome}", request.label);
    outcome
}

async fn stream_process(
    request_id: RequestId,
    request: &ExecutionRequest,
    policy: BatchPolicy,
    timeline: &Timeline,
    sink: Option<&dyn OutputSink>,
) -> Result<i32, SpawnFailure> {
    let (program, args) = request
        .command
        .split_first()
        .ok_or(SpawnFailure::EmptyCommand)?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let mut child = cmd
        .spawn()
        .map_err(|err| SpawnFailure::from_spawn(program, err))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| SpawnFailure::Io("stdout pipe missing".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| SpawnFailure::Io("stderr pipe missing".into()))?;

    // Both pipes feed one channel, so lines interleave in arrival order.
    let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
    tokio::spawn(read_lines(stdout, tx.clone()));
    tokio::spawn(read_lines(stderr, tx));

    let flush = |batch: &mut OutputBatch| {
        if let Some(text) = batch.take(Instant::now()) {
            debug!(%request_id, lines = text.lines().count(), "flushing output batch");
            timeline.log(request_id, RecordKind::Output, &text);
            if let Some(sink) = sink {
                sink.accept(&text);
            }
        }
    };
    pump_output(&mut child, rx, policy, flush).await
}

/// Batches merged output until both pipes close, then reaps the child. A
/// read failure kills the child before returning, so no tool outlives its
/// request.
async fn pump_output<F>(
    child: &mut Child,
    mut lines: mpsc::Receiver<StreamEvent>,
    policy: BatchPolicy,
    mut flush: F,
) -> Result<i32, SpawnFailure>
where
    F: FnMut(&mut OutputBatch),
{
    let mut batch = OutputBatch::new(policy, Instant::now());
    loop {
        let deadline = batch.deadline();
        tokio::select! {
            next = lines.recv() => match next {
                Some(StreamEvent::Line(line)) => {
                    batch.push(&line);
                    if batch.should_flush(Instant::now()) {
                        flush(&mut batch);
                    }
                }
                Some(StreamEvent::Failed(message)) => {
                    flush(&mut batch);
                    if let Err(err) = child.kill().await {
                        warn!("failed to kill tool after read error: {err}");
                    }
                    return Err(SpawnFailure::Io(message));
                }
                None => break,
            },
            _ = tokio::time::sleep_until(deadline), if !batch.is_empty() => {
                flush(&mut batch);
            }
        }
    }
    flush(&mut batch);

    let status = child
        .wait()
        .await
        .map_err(|err| SpawnFailure::Io(err.to_string()))?;
    Ok(normalize_exit(status))
}

async fn read_lines<R>(reader: R, tx: mpsc::Sender<StreamEvent>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if buf.ends_with(b"\n") {
                    buf.pop();
                    if buf.ends_with(b"\r") {
                        buf.pop();
                    }
                }
                let line = String::from_utf8_lossy(&buf).into_owned();
                if tx.send(StreamEvent::Line(line)).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                let _ = tx.send(StreamEvent::Failed(err.to_string())).await;
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_failure_kills_the_running_tool() {
        let mut child = Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .spawn()
            .unwrap();
        let (tx, rx) = mpsc::channel(4);
        tx.send(StreamEvent::Line("partial".into())).await.unwrap();
        tx.send(StreamEvent::Failed("pipe broke".into())).await.unwrap();

        let mut flushed = Vec::new();
        let result = pump_output(&mut child, rx, BatchPolicy::default(), |batch| {
            if let Some(text) = batch.take(Instant::now()) {
                flushed.push(text);
            }
        })
        .await;

        assert_eq!(result.unwrap_err().to_string(), "pipe broke");
        assert_eq!(flushed, vec!["partial\n".to_string()]);
        assert!(child.try_wait().unwrap().is_some());
    }

    #[tokio::test]
    async fn closed_pipes_reap_the_exit_code() {
        let mut child = Command::new("sh").args(["-c", "exit 4"]).spawn().unwrap();
        let (tx, rx) = mpsc::channel(1);
        drop(tx);

        let code = pump_output(&mut child, rx, BatchPolicy::default(), |_| {}).await;
        assert_eq!(code.unwrap(), 4);
    }
}
