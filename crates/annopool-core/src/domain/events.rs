//! Event-log records.
//!
//! One record per accepted outcome. All kinds share one physical log and are
//! told apart by the `kind` tag:
//!
//! ```text
//! {"id":"01J...","recorded_at":"2024-01-01T12:00:00Z","kind":"annotated","category":"Mug",...}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{GraspId, RecordId, UnitId};
use crate::ports::Clock;

/// An outcome that changes (or attempted to change) the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogRecord {
    /// A unit was judged by an annotator. Marks it annotated, never removes it.
    Annotated {
        category: String,
        object_id: String,
        grasp_id: GraspId,
        annotator_id: String,
        #[serde(default)]
        payload: serde_json::Value,
    },

    /// The object's geometry was reported malformed. Drops the whole object.
    ObjectRemoved {
        category: String,
        object_id: String,
        annotator_id: String,
    },

    /// A single grasp was reported invalid. Drops just that grasp.
    GraspRemoved {
        category: String,
        object_id: String,
        grasp_id: GraspId,
        annotator_id: String,
    },
}

impl LogRecord {
    pub fn annotated(unit: &UnitId, annotator_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::Annotated {
            category: unit.category.clone(),
            object_id: unit.object_id.clone(),
            grasp_id: unit.grasp_id,
            annotator_id: annotator_id.into(),
            payload,
        }
    }

    pub fn object_removed(
        category: impl Into<String>,
        object_id: impl Into<String>,
        annotator_id: impl Into<String>,
    ) -> Self {
        Self::ObjectRemoved {
            category: category.into(),
            object_id: object_id.into(),
            annotator_id: annotator_id.into(),
        }
    }

    pub fn grasp_removed(unit: &UnitId, annotator_id: impl Into<String>) -> Self {
        Self::GraspRemoved {
            category: unit.category.clone(),
            object_id: unit.object_id.clone(),
            grasp_id: unit.grasp_id,
            annotator_id: annotator_id.into(),
        }
    }

    /// Tag value as stored in the log.
    pub fn kind(&self) -> &'static str {
        match self {
            LogRecord::Annotated { .. } => "annotated",
            LogRecord::ObjectRemoved { .. } => "object_removed",
            LogRecord::GraspRemoved { .. } => "grasp_removed",
        }
    }

    pub fn annotator_id(&self) -> &str {
        match self {
            LogRecord::Annotated { annotator_id, .. }
            | LogRecord::ObjectRemoved { annotator_id, .. }
            | LogRecord::GraspRemoved { annotator_id, .. } => annotator_id,
        }
    }

    pub fn category(&self) -> &str {
        match self {
            LogRecord::Annotated { category, .. }
            | LogRecord::ObjectRemoved { category, .. }
            | LogRecord::GraspRemoved { category, .. } => category,
        }
    }

    /// The unit named by the record, `None` for object-level records.
    pub fn unit(&self) -> Option<UnitId> {
        match self {
            LogRecord::Annotated {
                category,
                object_id,
                grasp_id,
                ..
            }
            | LogRecord::GraspRemoved {
                category,
                object_id,
                grasp_id,
                ..
            } => Some(UnitId::new(category.as_str(), object_id.as_str(), *grasp_id)),
            LogRecord::ObjectRemoved { .. } => None,
        }
    }
}

/// A record as it is stored: id + timestamp + the record itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: RecordId,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: LogRecord,
}

impl LogEntry {
    pub fn new(record: LogRecord, clock: &dyn Clock) -> Self {
        Self {
            id: RecordId::generate(clock),
            recorded_at: clock.now(),
            record,
        }
    }
}
