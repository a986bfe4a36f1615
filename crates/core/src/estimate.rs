//! Viewport item-count estimation

use crate::geometry::{Axis, Size};

/// Lower bound for an estimated viewport count
pub const MIN_ESTIMATED_COUNT: usize = 2;

/// Upper bound for an estimated viewport count
pub const MAX_ESTIMATED_COUNT: usize = 10;

/// Cached result of sizing the range from the first materialized item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeEstimate {
    /// How many items fill one viewport along the scroll axis
    pub estimated_viewport_count: usize,

    /// Cross-axis extent of the item the estimate was taken from
    pub measured_cross_axis_size: u32,

    /// Viewport size the estimate was taken against
    pub viewport: Size,
}

/// Estimates how many items fit in one viewport.
pub struct RangeEstimator;

impl RangeEstimator {
    /// `ceil(viewport extent / item extent)` along `scroll_axis`, clamped to
    /// `[MIN_ESTIMATED_COUNT, MAX_ESTIMATED_COUNT]`.
    ///
    /// A zero-sized item counts as the maximum.
    pub fn estimate(
        first_item_width: u32,
        first_item_height: u32,
        viewport_width: u32,
        viewport_height: u32,
        scroll_axis: Axis,
    ) -> usize {
        let (item_extent, viewport_extent) = match scroll_axis {
            Axis::Vertical => (first_item_height, viewport_height),
            Axis::Horizontal => (first_item_width, viewport_width),
        };

        if item_extent == 0 {
            return MAX_ESTIMATED_COUNT;
        }

        let count = viewport_extent.div_ceil(item_extent) as usize;
        count.clamp(MIN_ESTIMATED_COUNT, MAX_ESTIMATED_COUNT)
    }

    /// Builds a [`RangeEstimate`] from the first item's size.
    pub fn from_first_item(first_item: Size, viewport: Size, scroll_axis: Axis) -> RangeEstimate {
        RangeEstimate {
            estimated_viewport_count: Self::estimate(
                first_item.width,
                first_item.height,
                viewport.width,
                viewport.height,
                scroll_axis,
            ),
            measured_cross_axis_size: first_item.along(scroll_axis.cross()),
            viewport,
        }
    }
}
