//! App - the coordinator and everything that runs around it.
//!
//! # Main components
//! - **CoordinatorBuilder**: recovery and wiring
//! - **WorkCoordinator**: assign / submit / report under the pool lock
//! - **LogWriter**: single task that performs durable appends in lock order
//! - **ReaperLoop**: releases expired leases
//! - **status**: stats and per-annotator activity

pub mod builder;
pub mod coordinator;
pub mod log_writer;
pub mod reaper_loop;
pub mod recovery;
pub mod status;

pub use self::builder::{CoordinatorBuilder, CoordinatorConfig};
pub use self::coordinator::{Submission, WorkCoordinator};
pub use self::log_writer::{LogWriter, PendingAppend};
pub use self::reaper_loop::ReaperLoop;
pub use self::recovery::{Recovery, RecoveryReport, apply_all, fold, recover};
pub use self::status::{AnnotatorActivity, CategoryCounts, PoolStats, annotator_activity};
