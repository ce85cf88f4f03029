//! EventLog port - the append-only outcome log.
//!
//! The log is the only durable state the service owns. Implementations must
//! keep appends in call order and must not return from `append` before the
//! entry is durable.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::LogEntry;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("event log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode log entry: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("event log unavailable: {0}")]
    Unavailable(String),

    #[error("event log writer stopped")]
    WriterClosed,
}

/// A stored line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorruptRecord {
    /// 1-based position in the log.
    pub line: usize,
    pub reason: String,
}

/// Everything read back from the log, in append order.
#[derive(Debug, Clone, Default)]
pub struct Replay {
    pub entries: Vec<LogEntry>,
    pub corrupt: Vec<CorruptRecord>,
}

impl Replay {
    /// Parse one stored line. Corrupt lines are kept aside, not dropped.
    pub fn push_line(&mut self, line_no: usize, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        match serde_json::from_str::<LogEntry>(line) {
            Ok(entry) => self.entries.push(entry),
            Err(e) => self.corrupt.push(CorruptRecord {
                line: line_no,
                reason: e.to_string(),
            }),
        }
    }
}

#[async_trait]
pub trait EventLog: Send + Sync {
    /// Durably persist `entry` after every previously appended entry.
    async fn append(&self, entry: &LogEntry) -> Result<(), LogError>;

    /// Read every entry back in append order. Restartable.
    async fn replay(&self) -> Result<Replay, LogError>;
}
