//! JsonlEventLog - the production event log.
//!
//! One JSON object per line in a single append-only file. Every append is
//! flushed and `sync_data`'d before it is acknowledged.
//!
//! A crash or a failed write can leave a torn last line. A failed append is
//! truncated back to where it started; whatever is still left is sealed with
//! a newline on open and before the next append, so new entries always start
//! on a fresh line. The torn line itself is reported as corrupt on replay.
//!
//! [`JsonlEventLog::open_read_only`] never creates, seals or writes the file.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use crate::domain::LogEntry;
use crate::ports::{EventLog, LogError, Replay};

pub struct JsonlEventLog {
    path: PathBuf,
    file: Mutex<File>,
    read_only: bool,
}

impl JsonlEventLog {
    /// Open (or create) the log at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, LogError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .await?;
        if seal_torn_tail(&mut file).await? {
            tracing::warn!(path = %path.display(), "event log ended mid-record, sealed torn tail");
        }
        Ok(Self {
            path,
            file: Mutex::new(file),
            read_only: false,
        })
    }

    /// Open an existing log for replay only. Fails if `path` does not exist.
    pub async fn open_read_only(path: impl Into<PathBuf>) -> Result<Self, LogError> {
        let path = path.into();
        let file = File::open(&path).await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
            read_only: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Append a newline if the file does not end with one.
async fn seal_torn_tail(file: &mut File) -> Result<bool, LogError> {
    let len = file.metadata().await?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1)).await?;
    let mut last = [0_u8; 1];
    file.read_exact(&mut last).await?;
    if last[0] == b'\n' {
        return Ok(false);
    }
    file.write_all(b"\n").await?;
    file.flush().await?;
    file.sync_data().await?;
    Ok(true)
}

async fn write_line(file: &mut File, line: &[u8]) -> Result<(), LogError> {
    file.write_all(line).await?;
    file.flush().await?;
    file.sync_data().await?;
    Ok(())
}

#[async_trait]
impl EventLog for JsonlEventLog {
    async fn append(&self, entry: &LogEntry) -> Result<(), LogError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        if self.read_only {
            return Err(LogError::Unavailable(format!(
                "{} is opened read-only",
                self.path.display()
            )));
        }

        let mut file = self.file.lock().await;
        if seal_torn_tail(&mut file).await? {
            tracing::warn!(path = %self.path.display(), "sealed torn tail before append");
        }
        let start = file.metadata().await?.len();
        if let Err(e) = write_line(&mut file, &line).await {
            if let Err(truncate) = file.set_len(start).await {
                tracing::error!(error = %truncate, "failed to roll back partial append");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn replay(&self) -> Result<Replay, LogError> {
        // Hold the writer lock so a concurrent append is never read half-written.
        let _writer = self.file.lock().await;

        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(e.into()),
        };
        let mut reader = BufReader::new(file);
        let mut replay = Replay::default();
        let mut buf = Vec::new();
        let mut line_no = 0;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            line_no += 1;
            match std::str::from_utf8(&buf) {
                Ok(line) => replay.push_line(line_no, line),
                Err(e) => replay.corrupt.push(crate::ports::CorruptRecord {
                    line: line_no,
                    reason: format!("invalid UTF-8: {e}"),
                }),
            }
        }
        Ok(replay)
    }
}
