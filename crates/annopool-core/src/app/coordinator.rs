//! WorkCoordinator - assign units and record outcomes.
//!
//! Every operation runs its read-compute-mutate step under one pool lock.
//! Mutations enqueue their log entry before the lock is released and wait for
//! the durable write after, so log order matches mutation order without
//! holding the lock across I/O.
//!
//! Mutate-then-log: if the append fails the caller gets `LogWrite`, but the
//! in-memory change stays.

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use tokio::sync::Mutex;

use super::log_writer::{LogWriter, PendingAppend};
use super::status::PoolStats;
use crate::domain::{
    Assignment, GraspId, LogEntry, LogRecord, RemovalOutcome, SubmitOutcome, UnitId, UnitState,
};
use crate::error::PoolError;
use crate::pool::{Lease, LeaseTable, MarkOutcome, PoolState, Skeleton, select_unit};
use crate::ports::Clock;

/// One annotation as handed in by an annotator.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub unit: UnitId,
    pub annotator_id: String,
    pub payload: serde_json::Value,
}

impl Submission {
    pub fn new(unit: UnitId, annotator_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            unit,
            annotator_id: annotator_id.into(),
            payload,
        }
    }
}

/// Everything behind the pool lock.
struct PoolInner {
    state: PoolState,
    leases: LeaseTable,
    rng: StdRng,
    closed: bool,
}

impl PoolInner {
    fn ensure_open(&self) -> Result<(), PoolError> {
        if self.closed {
            return Err(PoolError::ShutDown);
        }
        Ok(())
    }
}

/// Shared handle to the pool. Clones refer to the same pool.
#[derive(Clone)]
pub struct WorkCoordinator {
    inner: Arc<Mutex<PoolInner>>,
    skeleton: Arc<Skeleton>,
    writer: LogWriter,
    clock: Arc<dyn Clock>,
    lease_ttl: Option<chrono::Duration>,
}

impl WorkCoordinator {
    /// Use [`super::CoordinatorBuilder`] to recover the state first.
    pub(crate) fn new(
        state: PoolState,
        skeleton: Arc<Skeleton>,
        writer: LogWriter,
        clock: Arc<dyn Clock>,
        rng: StdRng,
        lease_ttl: Option<chrono::Duration>,
    ) -> Self {
        let inner = PoolInner {
            state,
            leases: LeaseTable::new(),
            rng,
            closed: false,
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
            skeleton,
            writer,
            clock,
            lease_ttl,
        }
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn lease_ttl(&self) -> Option<chrono::Duration> {
        self.lease_ttl
    }

    pub async fn assign(&self) -> Result<Assignment, PoolError> {
        self.assign_excluding(&BTreeSet::new()).await
    }

    /// Pick the next unit, skipping the categories in `exclude`, and reserve it.
    pub async fn assign_excluding(&self, exclude: &BTreeSet<String>) -> Result<Assignment, PoolError> {
        let now = self.clock.now();
        let mut guard = self.inner.lock().await;
        guard.ensure_open()?;
        let inner = &mut *guard;

        let reaped = inner.leases.reap_expired(now);
        if !reaped.is_empty() {
            tracing::debug!(count = reaped.len(), "released expired leases");
        }

        let Some(unit) = select_unit(&inner.state, &inner.leases, exclude, &mut inner.rng) else {
            tracing::debug!(excluded = exclude.len(), "pool exhausted");
            return Ok(Assignment::Exhausted);
        };
        inner.leases.reserve(&unit, Lease::new(now, self.lease_ttl));

        tracing::debug!(unit = %unit, "assigned unit");
        Ok(Assignment::Unit(unit))
    }

    /// Mark the unit annotated and log the submission.
    ///
    /// Resubmissions and submissions for removed units are logged too; the
    /// outcome tells them apart.
    pub async fn submit(&self, submission: Submission) -> Result<SubmitOutcome, PoolError> {
        let Submission {
            unit,
            annotator_id,
            payload,
        } = submission;
        if !self.skeleton.contains(&unit) {
            return Err(PoolError::UnknownUnit(unit));
        }

        let (outcome, pending) = {
            let mut guard = self.inner.lock().await;
            guard.ensure_open()?;
            let outcome = match guard.state.mark_annotated(&unit) {
                MarkOutcome::Marked => SubmitOutcome::Recorded,
                MarkOutcome::AlreadyAnnotated => SubmitOutcome::AlreadyAnnotated,
                MarkOutcome::Missing => SubmitOutcome::UnitRemoved,
            };
            guard.leases.release(&unit);
            let pending = self.enqueue(LogRecord::annotated(&unit, annotator_id, payload))?;
            (outcome, pending)
        };
        pending.wait().await?;

        tracing::debug!(unit = %unit, ?outcome, "annotation recorded");
        Ok(outcome)
    }

    /// Remove a whole object reported as malformed, annotations included.
    pub async fn report_malformed(
        &self,
        category: &str,
        object_id: &str,
        annotator_id: &str,
    ) -> Result<RemovalOutcome, PoolError> {
        if !self.skeleton.contains_object(category, object_id) {
            return Err(PoolError::UnknownObject {
                category: category.to_string(),
                object_id: object_id.to_string(),
            });
        }

        let (outcome, pending) = {
            let mut guard = self.inner.lock().await;
            guard.ensure_open()?;
            let outcome = match guard.state.remove_object(category, object_id) {
                Some(units_removed) => RemovalOutcome::Removed { units_removed },
                None => RemovalOutcome::AlreadyRemoved,
            };
            guard.leases.release_object(category, object_id);
            let pending = self.enqueue(LogRecord::object_removed(category, object_id, annotator_id))?;
            (outcome, pending)
        };
        pending.wait().await?;

        tracing::info!(
            category,
            object_id,
            annotator_id,
            units_removed = outcome.units_removed(),
            "object reported malformed"
        );
        Ok(outcome)
    }

    /// Remove one grasp reported as invalid.
    pub async fn report_invalid_grasp(
        &self,
        unit: &UnitId,
        annotator_id: &str,
    ) -> Result<RemovalOutcome, PoolError> {
        if !self.skeleton.contains(unit) {
            return Err(PoolError::UnknownUnit(unit.clone()));
        }

        let (outcome, pending) = {
            let mut guard = self.inner.lock().await;
            guard.ensure_open()?;
            let outcome = if guard.state.remove_grasp(unit) {
                RemovalOutcome::Removed { units_removed: 1 }
            } else {
                RemovalOutcome::AlreadyRemoved
            };
            guard.leases.release(unit);
            let pending = self.enqueue(LogRecord::grasp_removed(unit, annotator_id))?;
            (outcome, pending)
        };
        pending.wait().await?;

        tracing::info!(unit = %unit, annotator_id, ?outcome, "grasp reported invalid");
        Ok(outcome)
    }

    /// Same as [`Self::report_invalid_grasp`] with the unit spelled out.
    pub async fn report_invalid(
        &self,
        category: &str,
        object_id: &str,
        grasp_id: GraspId,
        annotator_id: &str,
    ) -> Result<RemovalOutcome, PoolError> {
        self.report_invalid_grasp(&UnitId::new(category, object_id, grasp_id), annotator_id)
            .await
    }

    pub async fn unit_state(&self, unit: &UnitId) -> Result<UnitState, PoolError> {
        if !self.skeleton.contains(unit) {
            return Err(PoolError::UnknownUnit(unit.clone()));
        }
        let now = self.clock.now();
        let inner = self.inner.lock().await;
        let state = match inner.state.is_annotated(unit) {
            None => UnitState::Removed,
            Some(true) => UnitState::Annotated,
            Some(false) => match inner.leases.get(unit) {
                Some(lease) if !lease.is_expired(now) => UnitState::Assigned,
                _ => UnitState::Available,
            },
        };
        Ok(state)
    }

    pub async fn stats(&self) -> PoolStats {
        let inner = self.inner.lock().await;
        PoolStats::collect(&inner.state, &inner.leases)
    }

    /// A copy of the current pool.
    pub async fn snapshot(&self) -> PoolState {
        self.inner.lock().await.state.clone()
    }

    /// Release every lease past its TTL. Returns how many were released.
    pub async fn reap_expired_leases(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;
        inner.leases.reap_expired(now).len()
    }

    /// Refuse further mutations and wait for every queued append to finish.
    pub async fn shutdown(&self) -> Result<(), PoolError> {
        {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                return Ok(());
            }
            inner.closed = true;
        }
        self.writer.shutdown().await?;
        tracing::info!("coordinator shut down, event log drained");
        Ok(())
    }

    fn enqueue(&self, record: LogRecord) -> Result<PendingAppend, PoolError> {
        let entry = LogEntry::new(record, self.clock.as_ref());
        Ok(self.writer.enqueue(entry)?)
    }
}
