//! Recovery - rebuild the pool from the skeleton and the event log.
//!
//! `state = fold(skeleton, replay())`, records applied strictly in log order.
//! The fold is pure: the same skeleton and log always give the same state.

use serde::Serialize;

use crate::domain::{LogEntry, LogRecord};
use crate::pool::{PoolState, Skeleton};
use crate::ports::{CorruptRecord, EventLog, LogError};

/// What recovery saw in the log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// Records that changed the pool.
    pub applied: usize,
    /// Records naming units that were already annotated or gone.
    pub no_ops: usize,
    /// Lines skipped because they could not be parsed.
    pub corrupt: Vec<CorruptRecord>,
}

impl RecoveryReport {
    pub fn records(&self) -> usize {
        self.applied + self.no_ops
    }
}

/// Output of [`recover`].
#[derive(Debug, Clone)]
pub struct Recovery {
    pub state: PoolState,
    pub report: RecoveryReport,
    /// Parsed entries, in log order.
    pub entries: Vec<LogEntry>,
}

/// Apply `records` to `state` in order. Returns `(applied, no_ops)`.
pub fn apply_all<'a>(
    state: &mut PoolState,
    records: impl IntoIterator<Item = &'a LogRecord>,
) -> (usize, usize) {
    let mut applied = 0;
    let mut no_ops = 0;
    for record in records {
        if state.apply(record) {
            applied += 1;
        } else {
            no_ops += 1;
        }
    }
    (applied, no_ops)
}

pub fn fold<'a>(skeleton: &Skeleton, records: impl IntoIterator<Item = &'a LogRecord>) -> PoolState {
    let mut state = PoolState::from_skeleton(skeleton);
    apply_all(&mut state, records);
    state
}

/// Replay `log` on top of `skeleton`. Corrupt lines are skipped and reported.
pub async fn recover(skeleton: &Skeleton, log: &dyn EventLog) -> Result<Recovery, LogError> {
    let replay = log.replay().await?;
    for corrupt in &replay.corrupt {
        tracing::warn!(line = corrupt.line, reason = %corrupt.reason, "skipping corrupt log record");
    }

    let mut state = PoolState::from_skeleton(skeleton);
    let (applied, no_ops) = apply_all(&mut state, replay.entries.iter().map(|e| &e.record));
    let report = RecoveryReport {
        applied,
        no_ops,
        corrupt: replay.corrupt,
    };

    tracing::info!(
        applied = report.applied,
        no_ops = report.no_ops,
        corrupt = report.corrupt.len(),
        categories = state.category_count(),
        units = state.unit_count(),
        annotated = state.annotated_count(),
        "recovered pool from event log"
    );

    Ok(Recovery {
        state,
        report,
        entries: replay.entries,
    })
}
