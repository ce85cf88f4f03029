//! Domain identifiers.
//!
//! - [`UnitId`]: the `(category, object_id, grasp_id)` triple naming one
//!   annotatable unit. Category and object id are opaque strings.
//! - [`RecordId`]: ULID attached to every event-log entry. ULIDs sort by
//!   creation time, so ids in a healthy log are non-decreasing.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

use crate::ports::Clock;

/// Grasp index within one object. Unique per object, never negative.
pub type GraspId = u32;

/// One annotatable unit: an object plus a candidate grasp on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId {
    pub category: String,
    pub object_id: String,
    pub grasp_id: GraspId,
}

impl UnitId {
    pub fn new(category: impl Into<String>, object_id: impl Into<String>, grasp_id: GraspId) -> Self {
        Self {
            category: category.into(),
            object_id: object_id.into(),
            grasp_id,
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.category, self.object_id, self.grasp_id)
    }
}

/// Identifier of a single event-log entry.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Ulid);

impl RecordId {
    /// Timestamp part comes from `clock`, the rest is random.
    pub fn generate(clock: &dyn Clock) -> Self {
        let timestamp_ms = clock.now().timestamp_millis().max(0) as u64;
        Self(Ulid::from_parts(timestamp_ms, rand::random()))
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for RecordId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rec-{}", self.0)
    }
}
