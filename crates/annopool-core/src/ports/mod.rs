//! Ports - seams to the outside world.
//!
//! - [`EventLog`]: durable, ordered outcome log (file-backed or in-memory).
//! - [`Clock`]: time source for timestamps, record ids and lease expiry.

pub mod clock;
pub mod event_log;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_log::{CorruptRecord, EventLog, LogError, Replay};
