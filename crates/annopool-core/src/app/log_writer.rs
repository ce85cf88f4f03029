//! LogWriter - the single task that owns the event log.
//!
//! Mutators enqueue entries while they still hold the pool lock, so the
//! channel order is the pool-lock order. The durable write happens here,
//! outside the lock; the mutator awaits the acknowledgement afterwards.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::domain::LogEntry;
use crate::ports::{EventLog, LogError};

enum LogRequest {
    Append {
        entry: LogEntry,
        reply: oneshot::Sender<Result<(), LogError>>,
    },
    Shutdown {
        ack: oneshot::Sender<()>,
    },
}

/// Handle to the writer task. Cheap to clone.
#[derive(Clone)]
pub struct LogWriter {
    tx: mpsc::UnboundedSender<LogRequest>,
}

/// An append that has been queued but not yet acknowledged.
#[must_use = "the append is only known to be durable once `wait` returns Ok"]
pub struct PendingAppend {
    rx: oneshot::Receiver<Result<(), LogError>>,
}

impl PendingAppend {
    pub async fn wait(self) -> Result<(), LogError> {
        self.rx.await.map_err(|_| LogError::WriterClosed)?
    }
}

impl LogWriter {
    /// Spawn the writer task on the current runtime.
    pub fn spawn(log: Arc<dyn EventLog>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(writer_loop(log, rx));
        Self { tx }
    }

    /// Queue `entry` behind everything queued before it. Never blocks.
    pub fn enqueue(&self, entry: LogEntry) -> Result<PendingAppend, LogError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LogRequest::Append { entry, reply })
            .map_err(|_| LogError::WriterClosed)?;
        Ok(PendingAppend { rx })
    }

    /// Stop the writer once every append queued so far has completed.
    pub async fn shutdown(&self) -> Result<(), LogError> {
        let (ack, rx) = oneshot::channel();
        self.tx
            .send(LogRequest::Shutdown { ack })
            .map_err(|_| LogError::WriterClosed)?;
        rx.await.map_err(|_| LogError::WriterClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

async fn writer_loop(log: Arc<dyn EventLog>, mut rx: mpsc::UnboundedReceiver<LogRequest>) {
    tracing::trace!("log writer started");

    while let Some(request) = rx.recv().await {
        match request {
            LogRequest::Append { entry, reply } => {
                let result = log.append(&entry).await;
                if let Err(e) = &result {
                    tracing::error!(record_id = %entry.id, kind = entry.record.kind(), error = %e, "event log append failed");
                }
                // The caller may have gone away; the entry is written regardless.
                let _ = reply.send(result);
            }
            LogRequest::Shutdown { ack } => {
                tracing::debug!("log writer received shutdown signal");
                // Reject new sends before acknowledging.
                rx.close();
                if ack.send(()).is_err() {
                    tracing::warn!("log writer failed to acknowledge shutdown");
                }
                break;
            }
        }
    }

    tracing::trace!("log writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LogRecord, UnitId};
    use crate::impls::InMemoryEventLog;
    use crate::ports::SystemClock;

    fn entry(grasp_id: u32) -> LogEntry {
        LogEntry::new(
            LogRecord::grasp_removed(&UnitId::new("A", "x", grasp_id), "u"),
            &SystemClock,
        )
    }

    #[tokio::test]
    async fn appends_land_in_enqueue_order() {
        let log = Arc::new(InMemoryEventLog::new());
        let writer = LogWriter::spawn(log.clone());

        let pending: Vec<PendingAppend> = (0..10)
            .map(|i| writer.enqueue(entry(i)).unwrap())
            .collect();
        for p in pending {
            p.wait().await.unwrap();
        }

        let grasps: Vec<u32> = log
            .entries()
            .await
            .iter()
            .filter_map(|e| e.record.unit())
            .map(|u| u.grasp_id)
            .collect();
        assert_eq!(grasps, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn append_failure_is_reported_to_the_caller() {
        let log = Arc::new(InMemoryEventLog::new());
        log.fail_next_appends(1);
        let writer = LogWriter::spawn(log.clone());

        let err = writer.enqueue(entry(0)).unwrap().wait().await.unwrap_err();
        assert!(matches!(err, LogError::Unavailable(_)));
        writer.enqueue(entry(1)).unwrap().wait().await.unwrap();
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn shutdown_drains_then_rejects() {
        let log = Arc::new(InMemoryEventLog::new());
        let writer = LogWriter::spawn(log.clone());

        let queued = writer.enqueue(entry(0)).unwrap();
        writer.shutdown().await.unwrap();
        queued.wait().await.unwrap();
        assert_eq!(log.len().await, 1);

        assert!(matches!(writer.enqueue(entry(1)), Err(LogError::WriterClosed)));
    }
}
