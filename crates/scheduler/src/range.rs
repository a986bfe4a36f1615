//! Working range arithmetic

use crate::VisibleRange;
use serde::Serialize;
use std::fmt;

/// Inclusive interval of positions whose holders are kept materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WorkingRange {
    pub start: usize,
    pub end: usize,
}

impl WorkingRange {
    pub fn contains(&self, position: usize) -> bool {
        (self.start..=self.end).contains(&position)
    }

    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Working range around `visible` in a registry of `len` items.
    ///
    /// `range_size` is the larger of the estimated items per viewport and the
    /// visible span; `ratio` of that many items, truncated, is kept on either
    /// side. Returns `None` for an empty registry.
    pub fn around(visible: VisibleRange, estimated_count: usize, ratio: f32, len: usize) -> Option<Self> {
        if len == 0 {
            return None;
        }
        let last_index = len - 1;
        let first = visible.first.min(last_index);

        let range_size = estimated_count.max(visible.span());
        let extra = (range_size as f32 * ratio) as usize;

        let start = first.saturating_sub(extra);
        let end = first
            .saturating_add(range_size)
            .saturating_add(extra)
            .min(last_index);
        Some(Self { start, end })
    }
}

impl fmt::Display for WorkingRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_around_visible_window() {
        // 100 items, [10, 15] visible, five items per viewport, ratio 1
        let range = WorkingRange::around(VisibleRange::new(10, 15), 5, 1.0, 100).unwrap();
        assert_eq!(range, WorkingRange { start: 5, end: 20 });
        assert_eq!(range.len(), 16);
        assert!(range.contains(5));
        assert!(range.contains(20));
        assert!(!range.contains(21));
    }

    #[test]
    fn test_range_uses_larger_of_estimate_and_span() {
        let range = WorkingRange::around(VisibleRange::new(50, 52), 8, 0.5, 1000).unwrap();
        assert_eq!(range, WorkingRange { start: 46, end: 62 });

        let range = WorkingRange::around(VisibleRange::new(50, 70), 2, 0.5, 1000).unwrap();
        assert_eq!(range, WorkingRange { start: 40, end: 80 });
    }

    #[test]
    fn test_range_clamps_to_registry() {
        let range = WorkingRange::around(VisibleRange::new(0, 3), 4, 4.0, 10).unwrap();
        assert_eq!(range, WorkingRange { start: 0, end: 9 });

        // Stale visible range past the end
        let range = WorkingRange::around(VisibleRange::new(40, 45), 2, 1.0, 20).unwrap();
        assert_eq!(range, WorkingRange { start: 14, end: 19 });

        assert!(WorkingRange::around(VisibleRange::new(0, 0), 2, 1.0, 0).is_none());
    }

    #[test]
    fn test_fractional_ratio_truncates() {
        // 3 * 0.5 keeps one extra item per side
        let range = WorkingRange::around(VisibleRange::new(20, 22), 3, 0.5, 100).unwrap();
        assert_eq!(range, WorkingRange { start: 19, end: 24 });

        // Less than one item's worth keeps nothing extra
        let range = WorkingRange::around(VisibleRange::new(20, 22), 3, 0.25, 100).unwrap();
        assert_eq!(range, WorkingRange { start: 20, end: 23 });
    }
}
