//! Task lifecycle state machine.
//!
//! At the row level every transition is permitted unless strict mode is on.
//! Only the migration engine pairs a close-out with a spawned row and a
//! ledger write; direct transitions never touch either.

use crate::error::{JournalError, Result};
use crate::types::TaskState;
use serde::{Deserialize, Serialize};

/// User-visible transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// `incomplete -> complete`.
    Complete,
    /// `complete -> incomplete`, the second half of the completion toggle.
    Uncomplete,
    /// Any non-complete state -> `cancelled`.
    Cancel,
    /// `cancelled -> incomplete`, same row.
    Reactivate,
    /// Close the row as `migrated`; the engine spawns the successor.
    Migrate,
    /// Close the row as `scheduled`; the engine spawns the successor.
    Schedule,
}

impl TransitionKind {
    pub fn target(&self) -> TaskState {
        match self {
            TransitionKind::Complete => TaskState::Complete,
            TransitionKind::Uncomplete | TransitionKind::Reactivate => TaskState::Incomplete,
            TransitionKind::Cancel => TaskState::Cancelled,
            TransitionKind::Migrate => TaskState::Migrated,
            TransitionKind::Schedule => TaskState::Scheduled,
        }
    }

    /// Whether this transition is allowed from `from` under strict rules.
    pub fn allowed_strict(&self, from: TaskState) -> bool {
        match self {
            TransitionKind::Complete => from != TaskState::Cancelled,
            TransitionKind::Uncomplete => from == TaskState::Complete,
            TransitionKind::Cancel => from != TaskState::Complete,
            TransitionKind::Reactivate => from == TaskState::Cancelled,
            TransitionKind::Migrate | TransitionKind::Schedule => from == TaskState::Incomplete,
        }
    }
}

/// Validate a transition and return its target state.
///
/// Lenient mode accepts everything, matching unguarded row updates.
pub fn check(from: TaskState, kind: TransitionKind, strict: bool) -> Result<TaskState> {
    let to = kind.target();
    if strict && !kind.allowed_strict(from) {
        return Err(JournalError::invalid_transition(from, to));
    }
    Ok(to)
}

/// The completion toggle: `complete` flips back to `incomplete`, anything else completes.
pub fn toggle_kind(from: TaskState) -> TransitionKind {
    if from == TaskState::Complete {
        TransitionKind::Uncomplete
    } else {
        TransitionKind::Complete
    }
}

/// Whether the row should be offered for review or migration.
pub fn is_actionable(state: TaskState) -> bool {
    state == TaskState::Incomplete
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_mode_permits_everything() {
        for from in TaskState::ALL {
            for kind in [
                TransitionKind::Complete,
                TransitionKind::Uncomplete,
                TransitionKind::Cancel,
                TransitionKind::Reactivate,
                TransitionKind::Migrate,
                TransitionKind::Schedule,
            ] {
                assert_eq!(check(from, kind, false).unwrap(), kind.target());
            }
        }
    }

    #[test]
    fn strict_mode_rejects_migrating_a_completed_row() {
        let err = check(TaskState::Complete, TransitionKind::Migrate, true).unwrap_err();
        assert!(matches!(err, JournalError::InvalidTransition { .. }));
        assert_eq!(err.to_string(), "invalid transition: complete -> migrated");
    }

    #[test]
    fn strict_mode_allows_cancel_from_closed_rows() {
        assert!(check(TaskState::Scheduled, TransitionKind::Cancel, true).is_ok());
        assert!(check(TaskState::Migrated, TransitionKind::Cancel, true).is_ok());
        assert!(check(TaskState::Complete, TransitionKind::Cancel, true).is_err());
    }

    #[test]
    fn strict_mode_reactivates_only_cancelled() {
        assert_eq!(
            check(TaskState::Cancelled, TransitionKind::Reactivate, true).unwrap(),
            TaskState::Incomplete
        );
        assert!(check(TaskState::Incomplete, TransitionKind::Reactivate, true).is_err());
    }

    #[test]
    fn toggle_flips_complete() {
        assert_eq!(toggle_kind(TaskState::Incomplete), TransitionKind::Complete);
        assert_eq!(toggle_kind(TaskState::Complete), TransitionKind::Uncomplete);
        assert_eq!(toggle_kind(TaskState::Scheduled), TransitionKind::Complete);
    }

    #[test]
    fn only_incomplete_is_actionable() {
        let actionable: Vec<_> = TaskState::ALL.into_iter().filter(|s| is_actionable(*s)).collect();
        assert_eq!(actionable, vec![TaskState::Incomplete]);
    }
}
