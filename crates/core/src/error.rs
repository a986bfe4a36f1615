//! Error types shared by the binder crates.

use crate::geometry::Axis;
use std::io;

/// Errors raised synchronously by registry, layout and scheduler operations.
///
/// Every variant is fatal for the call that produced it. Races between a
/// range computation and a structural mutation are not errors and never
/// surface here.
#[derive(Debug, thiserror::Error)]
pub enum BinderError {
    #[error("position {index} out of range (len={len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{axis} size must be EXACTLY or AT_MOST for a {axis} scrolling container")]
    UnconstrainedScrollAxis { axis: Axis },

    #[error("cross axis of a {axis} scrolling container is unconstrained and dynamic sizing is off")]
    UnconstrainedCrossAxis { axis: Axis },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("missing required collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("binder has been released")]
    Released,

    #[error("layout computation failed: {0}")]
    LayoutFailed(String),

    #[error("failed to spawn materialization worker: {0}")]
    WorkerSpawn(#[from] io::Error),
}

/// Result type for binder operations
pub type BinderResult<T> = Result<T, BinderError>;

/// Checks that `index` addresses an existing position in a sequence of `len`.
pub fn check_index(index: usize, len: usize) -> BinderResult<()> {
    if index < len {
        Ok(())
    } else {
        Err(BinderError::IndexOutOfRange { index, len })
    }
}

/// Checks that `[index, index + count)` lies inside a sequence of `len`.
pub fn check_span(index: usize, count: usize, len: usize) -> BinderResult<()> {
    match index.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => Err(BinderError::IndexOutOfRange { index: index.saturating_add(count), len }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_index() {
        assert!(check_index(0, 1).is_ok());
        assert!(matches!(
            check_index(3, 3),
            Err(BinderError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_check_span() {
        assert!(check_span(2, 3, 5).is_ok());
        assert!(check_span(5, 0, 5).is_ok());
        assert!(check_span(3, 3, 5).is_err());
        assert!(check_span(usize::MAX, 2, 5).is_err());
    }

    #[test]
    fn test_error_messages() {
        let err = BinderError::UnconstrainedScrollAxis { axis: Axis::Horizontal };
        assert_eq!(
            err.to_string(),
            "horizontal size must be EXACTLY or AT_MOST for a horizontal scrolling container"
        );
    }
}
