use std::time::Duration;

use tokio::time::Instant;

pub const DEFAULT_MAX_LINES: usize = 10;
pub const DEFAULT_MAX_AGE: Duration = Duration::from_millis(100);

/// Flush thresholds for streamed output: whichever trips first wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchPolicy {
    pub max_lines: usize,
    pub max_age: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
            max_age: DEFAULT_MAX_AGE,
        }
    }
}

#[derive(Debug)]
pub(crate) struct OutputBatch {
    policy: BatchPolicy,
    text: String,
    lines: usize,
    last_flush: Instant,
}

impl OutputBatch {
    pub(crate) fn new(policy: BatchPolicy, now: Instant) -> Self {
        Self {
            policy: BatchPolicy {
                max_lines: policy.max_lines.max(1),
                max_age: policy.max_age,
            },
            text: String::new(),
            lines: 0,
            last_flush: now,
        }
    }

    pub(crate) fn push(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
        self.lines += 1;
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lines == 0
    }

    pub(crate) fn should_flush(&self, now: Instant) -> bool {
        !self.is_empty()
            && (self.lines >= self.policy.max_lines
                || now.saturating_duration_since(self.last_flush) >= self.policy.max_age)
    }

    /// When a non-empty batch goes stale without further input.
    pub(crate) fn deadline(&self) -> Instant {
        self.last_flush + self.policy.max_age
    }

    pub(crate) fn take(&mut self, now: Instant) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        self.lines = 0;
        self.last_flush = now;
        Some(std::mem::take(&mut self.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flushes_at_line_threshold() {
        let start = Instant::now();
        let mut batch = OutputBatch::new(BatchPolicy::default(), start);
        for i in 0..9 {
            batch.push(&format!("line {i}"));
            assert!(!batch.should_flush(start));
        }
        batch.push("line 9");
        assert!(batch.should_flush(start));

        let text = batch.take(start).unwrap();
        assert_eq!(text.lines().count(), 10);
        assert!(text.ends_with("line 9\n"));
        assert!(batch.is_empty());
    }

    #[test]
    fn flushes_after_max_age_even_with_one_line() {
        let start = Instant::now();
        let mut batch = OutputBatch::new(BatchPolicy::default(), start);
        batch.push("I: Using Apktool 2.9.3");

        assert!(!batch.should_flush(start + Duration::from_millis(99)));
        assert!(batch.should_flush(start + Duration::from_millis(100)));
        assert_eq!(batch.deadline(), start + DEFAULT_MAX_AGE);
    }

    #[test]
    fn empty_batch_never_flushes() {
        let start = Instant::now();
        let mut batch = OutputBatch::new(BatchPolicy::default(), start);
        assert!(!batch.should_flush(start + Duration::from_secs(5)));
        assert_eq!(batch.take(start), None);
    }

    #[test]
    fn take_resets_the_age_clock() {
        let start = Instant::now();
        let mut batch = OutputBatch::new(BatchPolicy::default(), start);
        batch.push("a");
        let later = start + Duration::from_millis(150);
        assert!(batch.take(later).is_some());

        batch.push("b");
        assert!(!batch.should_flush(later + Duration::from_millis(50)));
        assert_eq!(batch.deadline(), later + DEFAULT_MAX_AGE);
    }
}
