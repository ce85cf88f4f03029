//! annopool-core
//!
//! Work-pool coordination for grasp annotation: hand out `(category, object,
//! grasp)` units fairly, record outcomes in an append-only log, and rebuild
//! the pool from that log after a restart.
//!
//! # Modules
//! - **domain**: unit ids, log records, outcomes, unit states
//! - **ports**: `EventLog` and `Clock`
//! - **pool**: skeleton loader, pool state, leases, sampler
//! - **impls**: `JsonlEventLog`, `InMemoryEventLog`
//! - **app**: coordinator, log writer, recovery, reaper, stats

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod pool;
pub mod ports;

pub use app::{CoordinatorBuilder, CoordinatorConfig, RecoveryReport, Submission, WorkCoordinator};
pub use domain::{Assignment, LogEntry, LogRecord, RemovalOutcome, SubmitOutcome, UnitId, UnitState};
pub use error::PoolError;
pub use pool::Skeleton;
