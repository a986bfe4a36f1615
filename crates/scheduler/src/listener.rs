//! Structural change notifications
//!
//! The scheduler reports every structural mutation to an external listener
//! after the registry and working range reflect it, mirroring the
//! insert/remove/move/update callbacks of a list diff.

use serde::Serialize;

/// One structural mutation, as reported to a [`ChangeListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralChange {
    Insert { position: usize, count: usize },
    Remove { position: usize, count: usize },
    Move { from: usize, to: usize },
    Update { position: usize, count: usize },
}

impl StructuralChange {
    /// Positions whose content the change introduced or replaced, in the
    /// registry as it is after the change.
    pub fn affected_positions(&self) -> std::ops::Range<usize> {
        match *self {
            StructuralChange::Insert { position, count }
            | StructuralChange::Update { position, count } => position..position + count,
            StructuralChange::Move { to, .. } => to..to + 1,
            StructuralChange::Remove { position, .. } => position..position,
        }
    }

    /// Whether the change leaves the registry untouched.
    pub fn is_noop(&self) -> bool {
        match *self {
            StructuralChange::Insert { count, .. }
            | StructuralChange::Remove { count, .. }
            | StructuralChange::Update { count, .. } => count == 0,
            StructuralChange::Move { from, to } => from == to,
        }
    }
}

/// Receives structural changes on the coordination thread.
pub trait ChangeListener: Send + Sync {
    fn on_structural_change(&self, change: StructuralChange);
}

impl<F> ChangeListener for F
where
    F: Fn(StructuralChange) + Send + Sync,
{
    fn on_structural_change(&self, change: StructuralChange) {
        self(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_affected_positions() {
        let insert = StructuralChange::Insert { position: 3, count: 2 };
        assert_eq!(insert.affected_positions(), 3..5);

        let moved = StructuralChange::Move { from: 9, to: 1 };
        assert_eq!(moved.affected_positions(), 1..2);

        let removed = StructuralChange::Remove { position: 4, count: 10 };
        assert!(removed.affected_positions().is_empty());
    }

    #[test]
    fn test_is_noop() {
        assert!(StructuralChange::Insert { position: 0, count: 0 }.is_noop());
        assert!(StructuralChange::Move { from: 2, to: 2 }.is_noop());
        assert!(!StructuralChange::Remove { position: 0, count: 1 }.is_noop());
    }

    #[test]
    fn test_closure_listener() {
        let seen = Mutex::new(Vec::new());
        let listener = |change: StructuralChange| seen.lock().unwrap().push(change);

        listener.on_structural_change(StructuralChange::Update { position: 0, count: 1 });
        assert_eq!(
            *seen.lock().unwrap(),
            vec![StructuralChange::Update { position: 0, count: 1 }]
        );
    }

    #[test]
    fn test_serialize_change() {
        let json = serde_json::to_string(&StructuralChange::Move { from: 1, to: 4 }).unwrap();
        assert_eq!(json, r#"{"kind":"move","from":1,"to":4}"#);
    }
}
