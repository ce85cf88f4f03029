//! InMemoryEventLog - event log for tests and dry runs.
//!
//! Stores the same JSON lines the file log would write, so corrupt lines can
//! be injected, and can be told to fail the next N appends.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::LogEntry;
use crate::ports::{EventLog, LogError, Replay};

#[derive(Default)]
pub struct InMemoryEventLog {
    lines: Mutex<Vec<String>>,
    failures: AtomicUsize,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` appends fail with [`LogError::Unavailable`].
    pub fn fail_next_appends(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Store a raw line as-is (for corruption tests).
    pub async fn push_raw_line(&self, line: impl Into<String>) {
        self.lines.lock().await.push(line.into());
    }

    pub async fn len(&self) -> usize {
        self.lines.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.lines.lock().await.is_empty()
    }

    /// Parsed entries, corrupt lines skipped.
    pub async fn entries(&self) -> Vec<LogEntry> {
        let lines = self.lines.lock().await;
        lines
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    fn take_failure(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, entry: &LogEntry) -> Result<(), LogError> {
        if self.take_failure() {
            return Err(LogError::Unavailable("injected append failure".to_string()));
        }
        let line = serde_json::to_string(entry)?;
        self.lines.lock().await.push(line);
        Ok(())
    }

    async fn replay(&self) -> Result<Replay, LogError> {
        let lines = self.lines.lock().await;
        let mut replay = Replay::default();
        for (idx, line) in lines.iter().enumerate() {
            replay.push_line(idx + 1, line);
        }
        Ok(replay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LogRecord;
    use crate::ports::SystemClock;

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let log = InMemoryEventLog::new();
        let entry = LogEntry::new(LogRecord::object_removed("A", "x", "u"), &SystemClock);

        log.fail_next_appends(2);
        assert!(matches!(log.append(&entry).await, Err(LogError::Unavailable(_))));
        assert!(matches!(log.append(&entry).await, Err(LogError::Unavailable(_))));
        log.append(&entry).await.unwrap();

        assert_eq!(log.len().await, 1);
        assert_eq!(log.entries().await, vec![entry]);
    }

    #[tokio::test]
    async fn raw_lines_show_up_as_corrupt() {
        let log = InMemoryEventLog::new();
        log.push_raw_line("{broken").await;
        log.append(&LogEntry::new(LogRecord::object_removed("A", "x", "u"), &SystemClock))
            .await
            .unwrap();

        let replay = log.replay().await.unwrap();
        assert_eq!(replay.entries.len(), 1);
        assert_eq!(replay.corrupt.len(), 1);
        assert_eq!(replay.corrupt[0].line, 1);
    }
}
