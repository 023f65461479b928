use std::sync::{Arc, Mutex};
use std::time::Duration;

use apku_journal::{Journal, JournalOptions};
use pretty_assertions::assert_eq;

use crate::*;

fn sh(script: &str) -> Vec<String> {
    vec!["sh".into(), "-c".into(), script.into()]
}

fn start_runner() -> (ProcessRunner, Arc<RunnerEventQueue>) {
    let (queue, _notify) = RunnerEventQueue::new();
    let runner = ProcessRunner::start(RunnerOptions::new(queue.sender())).unwrap();
    (runner, queue)
}

#[derive(Default)]
struct Collect(Mutex<Vec<String>>);

impl OutputSink for Collect {
    fn accept(&self, text: &str) {
        self.0.lock().unwrap().push(text.to_string());
    }
}

impl Collect {
    fn chunks(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

fn log_text(events: &[RunnerEvent], id: RequestId) -> String {
    events
        .iter()
        .filter_map(|ev| match ev {
            RunnerEvent::Log { request_id, text } if *request_id == id => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

fn log_texts(events: &[RunnerEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|ev| match ev {
            RunnerEvent::Log { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn successful_command_logs_begin_output_marker_and_separator() {
    let (runner, queue) = start_runner();
    let handle = runner
        .submit(ExecutionRequest::new(sh("echo hello; echo world"), "Greeting..."))
        .unwrap();
    let id = handle.id;

    assert_eq!(handle.wait().await, Some(ExecutionOutcome::Success));

    let events = queue.drain();
    let text = log_text(&events, id);
    assert!(text.starts_with("> sh -c echo hello; echo world\n"));
    assert!(text.contains("hello\nworld\n"));
    assert!(text.contains("[SUCCESS] Command completed with exit code: 0"));
    assert!(!text.contains("[ERROR]"));
    assert!(text.ends_with(&separator()));
    assert!(events.contains(&RunnerEvent::Finished {
        request_id: id,
        label: "Greeting...".into(),
        outcome: ExecutionOutcome::Success,
    }));
}

#[tokio::test]
async fn non_zero_exit_reports_one_failure_marker_to_log_and_sink() {
    let (runner, queue) = start_runner();
    let sink = Arc::new(Collect::default());
    let handle = runner
        .submit(
            ExecutionRequest::new(sh("echo partial; exit 3"), "Failing...")
                .with_sink(sink.clone()),
        )
        .unwrap();
    let id = handle.id;

    assert_eq!(
        handle.wait().await,
        Some(ExecutionOutcome::Failure { exit_code: 3 })
    );

    let text = log_text(&queue.drain(), id);
    assert_eq!(text.matches("[ERROR]").count(), 1);
    assert!(text.contains("Command failed with exit code: 3"));
    assert_eq!(
        sink.chunks(),
        vec![
            "partial\n".to_string(),
            "\n[ERROR] Command failed with exit code: 3\n".to_string(),
        ]
    );
}

#[tokio::test]
async fn spawn_errors_are_reported_and_the_queue_keeps_going() {
    let (runner, queue) = start_runner();
    let sink = Arc::new(Collect::default());
    let missing = runner
        .submit(
            ExecutionRequest::new(["/nonexistent/apku-no-such-tool", "-v"], "Missing...")
                .with_sink(sink.clone()),
        )
        .unwrap();
    let empty = runner
        .submit(ExecutionRequest::new(Vec::<String>::new(), "Empty..."))
        .unwrap();
    let after = runner
        .submit(ExecutionRequest::new(sh("echo still here"), "After..."))
        .unwrap();

    match missing.wait().await {
        Some(ExecutionOutcome::SpawnError { message }) => {
            assert!(message.contains("apku-no-such-tool"), "{message}");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(
        empty.wait().await,
        Some(ExecutionOutcome::SpawnError {
            message: "empty command".into()
        })
    );
    assert_eq!(after.wait().await, Some(ExecutionOutcome::Success));

    let chunks = sink.chunks();
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].starts_with("\n[EXCEPTION] "));

    let events = queue.drain();
    assert!(events.contains(&RunnerEvent::Status {
        text: SUCCESS_STATUS.into()
    }));
    assert!(log_texts(&events).iter().any(|t| t.contains("still here")));
}

#[tokio::test]
async fn bursty_output_is_delivered_in_batches_of_at_most_ten_lines() {
    let (runner, queue) = start_runner();
    let sink = Arc::new(Collect::default());
    let handle = runner
        .submit(
            ExecutionRequest::new(sh("i=1; while [ $i -le 35 ]; do echo line$i; i=$((i+1)); done"), "Burst...")
                .with_sink(sink.clone()),
        )
        .unwrap();
    assert_eq!(handle.wait().await, Some(ExecutionOutcome::Success));

    let chunks = sink.chunks();
    assert!(chunks.iter().all(|chunk| chunk.lines().count() <= DEFAULT_MAX_LINES));
    let expected: String = (1..=35).map(|i| format!("line{i}\n")).collect();
    assert_eq!(chunks.concat(), expected);

    // The log sees exactly the same batches as the sink.
    let events = queue.drain();
    let outputs: Vec<String> = log_texts(&events)
        .into_iter()
        .filter(|t| t.starts_with("line"))
        .collect();
    assert_eq!(outputs, chunks);
}

#[tokio::test]
async fn sparse_output_is_flushed_without_waiting_for_more_lines() {
    let (runner, _queue) = start_runner();
    let sink = Arc::new(Collect::default());
    let handle = runner
        .submit(
            ExecutionRequest::new(sh("echo first; sleep 0.5; echo second"), "Sparse...")
                .with_sink(sink.clone()),
        )
        .unwrap();
    assert_eq!(handle.wait().await, Some(ExecutionOutcome::Success));

    assert_eq!(
        sink.chunks(),
        vec!["first\n".to_string(), "second\n".to_string()]
    );
}

#[tokio::test]
async fn stdout_and_stderr_share_one_stream() {
    let (runner, _queue) = start_runner();
    let sink = Arc::new(Collect::default());
    let handle = runner
        .submit(
            ExecutionRequest::new(sh("echo to-out; echo to-err 1>&2"), "Merged...")
                .with_sink(sink.clone()),
        )
        .unwrap();
    assert_eq!(handle.wait().await, Some(ExecutionOutcome::Success));

    let all = sink.chunks().concat();
    assert!(all.contains("to-out\n"));
    assert!(all.contains("to-err\n"));
}

#[tokio::test]
async fn requests_run_in_submission_order_without_interleaving() {
    let (runner, queue) = start_runner();
    let handles: Vec<RequestHandle> = (1..=3)
        .map(|n| {
            let script = format!("echo start{n}; sleep 0.05; echo end{n}");
            runner
                .submit(ExecutionRequest::new(sh(&script), format!("Job {n}")))
                .unwrap()
        })
        .collect();
    let ids: Vec<RequestId> = handles.iter().map(|h| h.id).collect();
    for handle in handles {
        assert_eq!(handle.wait().await, Some(ExecutionOutcome::Success));
    }

    let events = queue.drain();
    let mut sections: Vec<RequestId> = Vec::new();
    for ev in &events {
        if let RunnerEvent::Log { request_id, .. } = ev {
            if sections.last() != Some(request_id) {
                sections.push(*request_id);
            }
        }
    }
    assert_eq!(sections, ids);

    let begins: Vec<String> = log_texts(&events)
        .into_iter()
        .filter(|t| t.starts_with("> "))
        .collect();
    assert_eq!(begins.len(), 3);
    for (n, begin) in begins.iter().enumerate() {
        assert!(begin.contains(&format!("start{}", n + 1)));
    }
}

#[tokio::test]
async fn shutdown_drops_queued_requests_but_lets_the_running_one_finish() {
    let (runner, queue) = start_runner();
    let running = runner
        .submit(ExecutionRequest::new(sh("sleep 0.3; echo done"), "Running..."))
        .unwrap();
    let running_id = running.id;
    let queued = runner
        .submit(ExecutionRequest::new(sh("echo never"), "Queued..."))
        .unwrap();

    // Wait until the first request has actually started.
    let mut seen = Vec::new();
    for _ in 0..200 {
        seen.extend(queue.drain());
        let started = seen.iter().any(|ev| {
            matches!(ev, RunnerEvent::Log { request_id, .. } if *request_id == running_id)
        });
        if started {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    runner.shutdown();
    assert!(runner.is_shut_down());
    assert_eq!(
        runner
            .submit(ExecutionRequest::new(sh("echo late"), "Late..."))
            .unwrap_err(),
        SubmitError::ShutDown
    );

    assert_eq!(running.wait().await, Some(ExecutionOutcome::Success));
    assert_eq!(queued.wait().await, None);
    tokio::task::spawn_blocking(move || runner.join())
        .await
        .unwrap();

    seen.extend(queue.drain());
    assert!(!log_texts(&seen).iter().any(|t| t.contains("never")));
}

#[tokio::test]
async fn journal_mirrors_the_log_timeline() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::open(JournalOptions::in_dir(dir.path()));
    let (queue, _notify) = RunnerEventQueue::new();
    let runner = ProcessRunner::start(
        RunnerOptions::new(queue.sender()).with_journal(Arc::clone(&journal)),
    )
    .unwrap();

    let handle = runner
        .submit(ExecutionRequest::new(sh("echo journaled; exit 2"), "Journal..."))
        .unwrap();
    let id = handle.id;
    assert_eq!(
        handle.wait().await,
        Some(ExecutionOutcome::Failure { exit_code: 2 })
    );
    journal.sync();

    let records = apku_journal::read_records(journal.path()).unwrap();
    assert!(records
        .iter()
        .all(|r| r.request_id.as_deref() == Some(id.to_string().as_str())));
    assert_eq!(
        apku_journal::render_text(&records),
        log_text(&queue.drain(), id)
    );
}
