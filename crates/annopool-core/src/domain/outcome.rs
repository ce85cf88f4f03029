//! Results returned by coordinator operations.
//!
//! None of these are errors: exhaustion and no-op submissions are normal
//! outcomes the caller may want to tell apart.

use serde::{Deserialize, Serialize};

use super::ids::UnitId;

/// Result of an assign call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "unit", rename_all = "snake_case")]
pub enum Assignment {
    /// The caller should annotate this unit.
    Unit(UnitId),

    /// No assignable unit remains. Stop requesting work.
    Exhausted,
}

impl Assignment {
    pub fn unit(&self) -> Option<&UnitId> {
        match self {
            Assignment::Unit(unit) => Some(unit),
            Assignment::Exhausted => None,
        }
    }

    pub fn into_unit(self) -> Option<UnitId> {
        match self {
            Assignment::Unit(unit) => Some(unit),
            Assignment::Exhausted => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Assignment::Exhausted)
    }
}

/// What a submission did to the pool. The record is logged in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Flag flipped to annotated.
    Recorded,

    /// Unit was already annotated; resubmission accepted silently.
    AlreadyAnnotated,

    /// Unit was removed earlier; logged for audit only.
    UnitRemoved,
}

/// What a removal report did to the pool. The record is logged in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemovalOutcome {
    Removed { units_removed: usize },
    AlreadyRemoved,
}

impl RemovalOutcome {
    pub fn units_removed(&self) -> usize {
        match self {
            RemovalOutcome::Removed { units_removed } => *units_removed,
            RemovalOutcome::AlreadyRemoved => 0,
        }
    }
}
