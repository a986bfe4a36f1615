//! Visible-range tracking
//!
//! The host reports the first and last visible positions on every scroll
//! tick. [`ViewportTracker`] forwards a report only when it differs from the
//! previous one and keeps the last report aligned with structural mutations
//! so it keeps pointing at the same items.

use std::fmt;

/// Inclusive range of positions currently on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisibleRange {
    pub first: usize,
    pub last: usize,
}

impl VisibleRange {
    /// Builds a range, swapping the bounds if they arrive reversed.
    pub fn new(first: usize, last: usize) -> Self {
        Self {
            first: first.min(last),
            last: first.max(last),
        }
    }

    pub fn contains(&self, position: usize) -> bool {
        (self.first..=self.last).contains(&position)
    }

    /// Number of positions spanned beyond the first.
    pub fn span(&self) -> usize {
        self.last - self.first
    }
}

impl fmt::Display for VisibleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.first, self.last)
    }
}

/// Debounces scroll reports.
///
/// # Example
///
/// ```
/// use rangebinder_scheduler::{ViewportTracker, VisibleRange};
///
/// let mut tracker = ViewportTracker::new();
/// assert!(tracker.on_scroll(10, 15).is_some());
/// // Same indices again: nothing to recompute
/// assert!(tracker.on_scroll(10, 15).is_none());
/// assert_eq!(tracker.on_scroll(11, 16), Some(VisibleRange::new(11, 16)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ViewportTracker {
    last: Option<VisibleRange>,
}

impl ViewportTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a scroll report, returning it if it changed anything.
    pub fn on_scroll(&mut self, first: usize, last: usize) -> Option<VisibleRange> {
        let range = VisibleRange::new(first, last);
        if self.last == Some(range) {
            return None;
        }
        self.last = Some(range);
        Some(range)
    }

    pub fn current(&self) -> Option<VisibleRange> {
        self.last
    }

    /// Overrides the last report without debouncing.
    pub fn set(&mut self, range: VisibleRange) {
        self.last = Some(range);
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Follows `count` items inserted at `position`.
    pub fn shift_for_insert(&mut self, position: usize, count: usize, len: usize) {
        self.remap(len, |i| if i >= position { i + count } else { i });
    }

    /// Follows `count` items removed at `position`. Positions inside the
    /// removed span collapse onto `position`.
    pub fn shift_for_remove(&mut self, position: usize, count: usize, len: usize) {
        let end = position + count;
        self.remap(len, |i| {
            if i >= end {
                i - count
            } else if i >= position {
                position
            } else {
                i
            }
        });
    }

    /// Follows one item moved from `from` to `to`.
    pub fn shift_for_move(&mut self, from: usize, to: usize, len: usize) {
        self.remap(len, |i| {
            if i == from {
                to
            } else if from < i && i <= to {
                i - 1
            } else if to <= i && i < from {
                i + 1
            } else {
                i
            }
        });
    }

    fn remap(&mut self, len: usize, map: impl Fn(usize) -> usize) {
        let Some(range) = self.last else {
            return;
        };
        if len == 0 {
            self.last = None;
            return;
        }
        let first = map(range.first).min(len - 1);
        let last = map(range.last).min(len - 1);
        self.last = Some(VisibleRange::new(first, last));
    }
}
