//! Domain model (ids, log records, unit states, operation outcomes).

pub mod events;
pub mod ids;
pub mod outcome;
pub mod state;

pub use self::events::{LogEntry, LogRecord};
pub use self::ids::{GraspId, RecordId, UnitId};
pub use self::outcome::{Assignment, RemovalOutcome, SubmitOutcome};
pub use self::state::UnitState;
