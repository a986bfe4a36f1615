//! Layout strategies: linear lists, grids and staggered grids
//!
//! A strategy decides what constraints each child is laid out with and how
//! many items one viewport holds.

use crate::error::{BinderError, BinderResult};
use crate::estimate::RangeEstimator;
use crate::geometry::{Axis, Constraints, Size, SizeMode, SizeSpec};
use crate::item::ItemAttributes;
use crate::layout::validate_child_constraints;

/// How items are arranged along the cross axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutInfo {
    /// One item per row (or column, for horizontal scrolling)
    #[default]
    Linear,
    /// `span_count` equally sized cells per row
    Grid { span_count: u32 },
    /// `span_count` lanes; items have independent scroll-axis extents
    Staggered { span_count: u32 },
}

impl LayoutInfo {
    pub fn validate(&self) -> BinderResult<()> {
        match self {
            LayoutInfo::Grid { span_count: 0 } | LayoutInfo::Staggered { span_count: 0 } => Err(
                BinderError::InvalidConfig("span count must be at least 1".to_string()),
            ),
            _ => Ok(()),
        }
    }

    pub fn span_count(&self) -> u32 {
        match self {
            LayoutInfo::Linear => 1,
            LayoutInfo::Grid { span_count } | LayoutInfo::Staggered { span_count } => *span_count,
        }
    }

    /// Constraints a child with `attributes` is laid out with inside a
    /// container measured with `container`.
    ///
    /// The scroll axis is always unconstrained for children. An
    /// unconstrained container cross axis is only accepted for linear
    /// layouts with `dynamic_cross_axis` on.
    pub fn child_constraints(
        &self,
        container: &Constraints,
        scroll_axis: Axis,
        attributes: &ItemAttributes,
        dynamic_cross_axis: bool,
    ) -> BinderResult<Constraints> {
        // Only a dynamically sized linear list may leave the cross axis open
        if !(dynamic_cross_axis && matches!(self, LayoutInfo::Linear)) {
            validate_child_constraints(container, scroll_axis)?;
        }
        let cross = container.along(scroll_axis.cross());

        let child_cross = match self {
            LayoutInfo::Linear => match cross.mode {
                SizeMode::Exactly => cross,
                SizeMode::AtMost if dynamic_cross_axis => cross,
                SizeMode::AtMost => SizeSpec::exactly(cross.size),
                SizeMode::Unspecified => SizeSpec::unspecified(),
            },
            LayoutInfo::Grid { span_count } | LayoutInfo::Staggered { span_count } => {
                let span_count = (*span_count).max(1);
                let spans = if attributes.full_span {
                    span_count
                } else {
                    attributes.span_size.clamp(1, span_count)
                };
                SizeSpec::exactly(cross.size / span_count * spans)
            }
        };

        Ok(Constraints::from_axes(scroll_axis, SizeSpec::unspecified(), child_cross))
    }

    /// Number of items that fill one viewport, from the first item's size.
    pub fn approximate_range_size(&self, first_item: Size, viewport: Size, scroll_axis: Axis) -> usize {
        let rows = RangeEstimator::estimate(
            first_item.width,
            first_item.height,
            viewport.width,
            viewport.height,
            scroll_axis,
        );
        rows * self.span_count() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(width: SizeSpec) -> Constraints {
        Constraints::new(width, SizeSpec::exactly(800))
    }

    #[test]
    fn test_linear_child_constraints() {
        let attrs = ItemAttributes::default();
        let c = LayoutInfo::Linear
            .child_constraints(&container(SizeSpec::exactly(400)), Axis::Vertical, &attrs, false)
            .unwrap();
        assert_eq!(c.width, SizeSpec::exactly(400));
        assert!(c.height.is_unspecified());

        let c = LayoutInfo::Linear
            .child_constraints(&container(SizeSpec::at_most(400)), Axis::Vertical, &attrs, false)
            .unwrap();
        assert_eq!(c.width, SizeSpec::exactly(400));

        let c = LayoutInfo::Linear
            .child_constraints(&container(SizeSpec::at_most(400)), Axis::Vertical, &attrs, true)
            .unwrap();
        assert_eq!(c.width, SizeSpec::at_most(400));
    }

    #[test]
    fn test_linear_unconstrained_cross_axis() {
        let attrs = ItemAttributes::default();
        let unconstrained = container(SizeSpec::unspecified());

        assert!(matches!(
            LayoutInfo::Linear.child_constraints(&unconstrained, Axis::Vertical, &attrs, false),
            Err(BinderError::UnconstrainedCrossAxis { .. })
        ));

        let c = LayoutInfo::Linear
            .child_constraints(&unconstrained, Axis::Vertical, &attrs, true)
            .unwrap();
        assert!(c.width.is_unspecified());

        let open_height = Constraints::new(SizeSpec::exactly(800), SizeSpec::unspecified());
        assert!(matches!(
            LayoutInfo::Linear.child_constraints(&open_height, Axis::Horizontal, &attrs, false),
            Err(BinderError::UnconstrainedCrossAxis { axis: Axis::Horizontal })
        ));
    }

    #[test]
    fn test_grid_splits_cross_axis() {
        let grid = LayoutInfo::Grid { span_count: 4 };
        let parent = container(SizeSpec::exactly(400));

        let single = grid
            .child_constraints(&parent, Axis::Vertical, &ItemAttributes::default(), false)
            .unwrap();
        assert_eq!(single.width, SizeSpec::exactly(100));

        let double = grid
            .child_constraints(
                &parent,
                Axis::Vertical,
                &ItemAttributes::default().with_span_size(2),
                false,
            )
            .unwrap();
        assert_eq!(double.width, SizeSpec::exactly(200));

        let full = grid
            .child_constraints(
                &parent,
                Axis::Vertical,
                &ItemAttributes::default().with_full_span(true),
                false,
            )
            .unwrap();
        assert_eq!(full.width, SizeSpec::exactly(400));

        let oversized = grid
            .child_constraints(
                &parent,
                Axis::Vertical,
                &ItemAttributes::default().with_span_size(9),
                false,
            )
            .unwrap();
        assert_eq!(oversized.width, SizeSpec::exactly(400));
    }

    #[test]
    fn test_horizontal_grid_splits_height() {
        let grid = LayoutInfo::Staggered { span_count: 2 };
        let parent = Constraints::new(SizeSpec::exactly(800), SizeSpec::exactly(300));
        let c = grid
            .child_constraints(&parent, Axis::Horizontal, &ItemAttributes::default(), false)
            .unwrap();
        assert_eq!(c.height, SizeSpec::exactly(150));
        assert!(c.width.is_unspecified());
    }

    #[test]
    fn test_grid_requires_cross_axis() {
        let grid = LayoutInfo::Grid { span_count: 2 };
        assert!(grid
            .child_constraints(
                &container(SizeSpec::unspecified()),
                Axis::Vertical,
                &ItemAttributes::default(),
                true
            )
            .is_err());
    }

    #[test]
    fn test_validate_span_count() {
        assert!(LayoutInfo::Linear.validate().is_ok());
        assert!(LayoutInfo::Grid { span_count: 3 }.validate().is_ok());
        assert!(LayoutInfo::Grid { span_count: 0 }.validate().is_err());
        assert!(LayoutInfo::Staggered { span_count: 0 }.validate().is_err());
    }

    #[test]
    fn test_approximate_range_size() {
        let viewport = Size::new(400, 800);
        assert_eq!(
            LayoutInfo::Linear.approximate_range_size(Size::new(400, 200), viewport, Axis::Vertical),
            4
        );
        assert_eq!(
            LayoutInfo::Grid { span_count: 3 }.approximate_range_size(
                Size::new(133, 200),
                viewport,
                Axis::Vertical
            ),
            12
        );
    }
}
