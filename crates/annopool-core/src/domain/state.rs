//! Per-unit state machine.

use serde::{Deserialize, Serialize};

/// Observable state of one unit.
///
/// State transitions:
/// - Available -> Assigned (assign)
/// - Assigned -> Available (lease expiry)
/// - Available | Assigned -> Annotated (submit)
/// - any -> Removed (malformed / invalid-grasp report)
///
/// `Removed` is terminal. `Annotated` never goes back to unannotated, but can
/// still be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    /// Unannotated and free to hand out.
    Available,

    /// Unannotated, currently reserved by an assignment.
    Assigned,

    /// Judged by an annotator.
    Annotated,

    /// Dropped from the pool by a report.
    Removed,
}

impl UnitState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitState::Removed)
    }

    /// Can this unit be handed out by assign?
    pub fn is_assignable(self) -> bool {
        matches!(self, UnitState::Available)
    }
}
