//! File-backed mirror of the shared output log.
//!
//! Every piece of text the runner appends to the presentation log is also
//! recorded here as one JSON line, so a session can be inspected after the
//! terminal or window is gone. Writes happen on a dedicated thread; callers
//! only pay for a channel send.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, sync_channel, Receiver, Sender, SyncSender};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_MAX_BYTES: u64 = 4 * 1024 * 1024;
const JOURNAL_FILE: &str = "journal.jsonl";

#[derive(Clone, Debug)]
pub struct JournalOptions {
    pub dir: PathBuf,
    pub enabled: bool,
    pub max_bytes: u64,
}

impl JournalOptions {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            enabled: true,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    pub fn file_path(&self) -> PathBuf {
        self.dir.join(JOURNAL_FILE)
    }

    /// `APKU_JOURNAL=0` turns the journal off; `APKU_JOURNAL_DIR` relocates it.
    pub fn from_env() -> Self {
        let dir = std::env::var("APKU_JOURNAL_DIR")
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .map(|dir| apku_util::expand_user(dir.trim()))
            .unwrap_or_else(|| apku_util::data_dir().join("journal"));
        let enabled = match std::env::var("APKU_JOURNAL") {
            Ok(value) => apku_util::parse_flag(&value),
            Err(_) => true,
        };
        Self {
            dir,
            enabled,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Begin,
    Output,
    Outcome,
    Separator,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub at_unix_millis: i64,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub kind: RecordKind,
    pub text: String,
}

enum Message {
    Record(JournalRecord),
    Sync(SyncSender<()>),
}

pub struct Journal {
    session_id: String,
    path: PathBuf,
    enabled: bool,
    sender: Sender<Message>,
}

impl Journal {
    pub fn open(options: JournalOptions) -> Arc<Self> {
        // Unbounded: `append` runs on the runner's async worker and must not block.
        let (sender, receiver) = channel();
        let path = options.file_path();
        let journal = Arc::new(Self {
            session_id: new_session_id(),
            path: path.clone(),
            enabled: options.enabled,
            sender,
        });
        if options.enabled {
            start_writer_thread(path, options.max_bytes, receiver);
        }
        journal
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn append(&self, request_id: Option<&str>, kind: RecordKind, text: &str) {
        if !self.enabled || text.is_empty() {
            return;
        }
        let record = JournalRecord {
            at_unix_millis: apku_util::now_millis(),
            session_id: self.session_id.clone(),
            request_id: request_id.map(str::to_string),
            kind,
            text: text.to_string(),
        };
        let _ = self.sender.send(Message::Record(record));
    }

    /// Blocks until every record appended so far has reached the file.
    pub fn sync(&self) {
        if !self.enabled {
            return;
        }
        let (ack_tx, ack_rx) = sync_channel(1);
        if self.sender.send(Message::Sync(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }
}

pub fn read_records(path: &Path) -> io::Result<Vec<JournalRecord>> {
    let file = fs::File::open(path)?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalRecord>(&line) {
            Ok(record) => records.push(record),
            Err(err) => warn!("journal: skipping malformed record: {err}"),
        }
    }
    Ok(records)
}

/// Reassembles the plain-text log a presentation layer would have shown.
pub fn render_text(records: &[JournalRecord]) -> String {
    records.iter().map(|record| record.text.as_str()).collect()
}

fn start_writer_thread(path: PathBuf, max_bytes: u64, receiver: Receiver<Message>) {
    std::thread::Builder::new()
        .name("apku-journal".into())
        .spawn(move || {
            while let Ok(message) = receiver.recv() {
                match message {
                    Message::Record(record) => write_record(&path, max_bytes, &record),
                    Message::Sync(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
        })
        .map(|_| ())
        .unwrap_or_else(|err| warn!("journal: failed to start writer thread: {err}"));
}

fn write_record(path: &Path, max_bytes: u64, record: &JournalRecord) {
    if let Some(dir) = path.parent() {
        if let Err(err) = fs::create_dir_all(dir) {
            warn!("journal: failed to create {}: {err}", dir.display());
            return;
        }
    }
    if let Err(err) = rotate_if_needed(path, max_bytes) {
        warn!("journal: rotation failed for {}: {err}", path.display());
        return;
    }

    let mut file = match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => file,
        Err(err) => {
            warn!("journal: failed to open {}: {err}", path.display());
            return;
        }
    };
    if let Ok(line) = serde_json::to_string(record) {
        let _ = writeln!(file, "{line}");
    }
}

fn rotate_if_needed(path: &Path, max_bytes: u64) -> io::Result<()> {
    if let Ok(meta) = fs::metadata(path) {
        if meta.len() >= max_bytes {
            let rotated = path.with_extension("jsonl.1");
            let _ = fs::remove_file(&rotated);
            fs::rename(path, rotated)?;
        }
    }
    Ok(())
}

fn new_session_id() -> String {
    let now = apku_util::now_millis();
    let pid = std::process::id();
    format!("{now:x}-{pid:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_reach_disk_in_append_order() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(JournalOptions::in_dir(dir.path()));

        journal.append(Some("req-1"), RecordKind::Begin, "> adb devices\n");
        journal.append(Some("req-1"), RecordKind::Output, "List of devices attached\n");
        journal.append(None, RecordKind::Separator, "====\n\n");
        journal.sync();

        let records = read_records(journal.path()).unwrap();
        let kinds: Vec<RecordKind> = records.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![RecordKind::Begin, RecordKind::Output, RecordKind::Separator]
        );
        assert_eq!(records[0].request_id.as_deref(), Some("req-1"));
        assert!(records.iter().all(|r| r.session_id == journal.session_id()));
        assert_eq!(
            render_text(&records),
            "> adb devices\nList of devices attached\n====\n\n"
        );
    }

    #[test]
    fn bursts_larger_than_the_writer_keeps_up_with_are_all_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(JournalOptions::in_dir(dir.path()));

        for i in 0..3000 {
            journal.append(Some("burst"), RecordKind::Output, &format!("line {i}\n"));
        }
        journal.sync();

        let records = read_records(journal.path()).unwrap();
        assert_eq!(records.len(), 3000);
        assert_eq!(records[2999].text, "line 2999\n");
    }

    #[test]
    fn rotates_when_file_exceeds_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = JournalOptions::in_dir(dir.path());
        options.max_bytes = 64;
        let journal = Journal::open(options);

        for _ in 0..4 {
            journal.append(None, RecordKind::Output, "a line long enough to trip rotation\n");
        }
        journal.sync();

        assert!(journal.path().with_extension("jsonl.1").exists());
        assert!(journal.path().exists());
    }

    #[test]
    fn disabled_journal_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = JournalOptions::in_dir(dir.path());
        options.enabled = false;
        let journal = Journal::open(options);

        journal.append(None, RecordKind::Output, "ignored\n");
        journal.sync();

        assert!(!journal.path().exists());
    }
}
