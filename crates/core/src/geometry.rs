//! Sizes, size specs and constraints
//!
//! A [`SizeSpec`] mirrors a measure spec: a mode plus a size in pixels.
//! [`Constraints`] pairs one spec per axis.

use std::fmt;

/// Scroll direction of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Axis {
    #[default]
    Vertical,
    Horizontal,
}

impl Axis {
    /// The axis perpendicular to this one
    pub fn cross(self) -> Axis {
        match self {
            Axis::Vertical => Axis::Horizontal,
            Axis::Horizontal => Axis::Vertical,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Vertical => f.write_str("vertical"),
            Axis::Horizontal => f.write_str("horizontal"),
        }
    }
}

/// How a size along one axis is constrained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeMode {
    /// The size must be exactly the given value
    Exactly,
    /// The size may be anything up to the given value
    AtMost,
    /// No constraint
    Unspecified,
}

/// A size constraint along one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SizeSpec {
    pub mode: SizeMode,
    pub size: u32,
}

impl SizeSpec {
    pub fn exactly(size: u32) -> Self {
        Self { mode: SizeMode::Exactly, size }
    }

    pub fn at_most(size: u32) -> Self {
        Self { mode: SizeMode::AtMost, size }
    }

    pub fn unspecified() -> Self {
        Self { mode: SizeMode::Unspecified, size: 0 }
    }

    pub fn is_exact(&self) -> bool {
        self.mode == SizeMode::Exactly
    }

    pub fn is_unspecified(&self) -> bool {
        self.mode == SizeMode::Unspecified
    }

    /// Resolves a desired size against this spec.
    pub fn resolve(&self, desired: u32) -> u32 {
        match self.mode {
            SizeMode::Exactly => self.size,
            SizeMode::AtMost => desired.min(self.size),
            SizeMode::Unspecified => desired,
        }
    }
}

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Extent along `axis`
    pub fn along(&self, axis: Axis) -> u32 {
        match axis {
            Axis::Vertical => self.height,
            Axis::Horizontal => self.width,
        }
    }
}

/// One size spec per axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Constraints {
    pub width: SizeSpec,
    pub height: SizeSpec,
}

impl Constraints {
    pub fn new(width: SizeSpec, height: SizeSpec) -> Self {
        Self { width, height }
    }

    /// Exact constraints on both axes
    pub fn exact(width: u32, height: u32) -> Self {
        Self::new(SizeSpec::exactly(width), SizeSpec::exactly(height))
    }

    pub fn along(&self, axis: Axis) -> SizeSpec {
        match axis {
            Axis::Vertical => self.height,
            Axis::Horizontal => self.width,
        }
    }

    /// Builds constraints from a scroll-axis spec and a cross-axis spec.
    pub fn from_axes(scroll_axis: Axis, scroll: SizeSpec, cross: SizeSpec) -> Self {
        match scroll_axis {
            Axis::Vertical => Self::new(cross, scroll),
            Axis::Horizontal => Self::new(scroll, cross),
        }
    }

    /// Whether a measurement with `next` may keep the layouts computed under
    /// `self` for a container scrolling along `scroll_axis`.
    ///
    /// Children are laid out against the cross axis only, so the mode and
    /// size along that axis must match.
    pub fn is_compatible_with(&self, next: &Constraints, scroll_axis: Axis) -> bool {
        let cross = scroll_axis.cross();
        self.along(cross) == next.along(cross)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_cross() {
        assert_eq!(Axis::Vertical.cross(), Axis::Horizontal);
        assert_eq!(Axis::Horizontal.cross(), Axis::Vertical);
    }

    #[test]
    fn test_size_spec_resolve() {
        assert_eq!(SizeSpec::exactly(100).resolve(40), 100);
        assert_eq!(SizeSpec::at_most(100).resolve(40), 40);
        assert_eq!(SizeSpec::at_most(100).resolve(400), 100);
        assert_eq!(SizeSpec::unspecified().resolve(400), 400);
    }

    #[test]
    fn test_constraints_from_axes() {
        let c = Constraints::from_axes(Axis::Vertical, SizeSpec::at_most(800), SizeSpec::exactly(400));
        assert_eq!(c.width, SizeSpec::exactly(400));
        assert_eq!(c.height, SizeSpec::at_most(800));

        let c = Constraints::from_axes(Axis::Horizontal, SizeSpec::at_most(800), SizeSpec::exactly(400));
        assert_eq!(c.width, SizeSpec::at_most(800));
        assert_eq!(c.height, SizeSpec::exactly(400));
    }

    #[test]
    fn test_compatibility_ignores_scroll_axis() {
        let a = Constraints::exact(400, 800);
        let taller = Constraints::exact(400, 1200);
        let wider = Constraints::exact(500, 800);

        assert!(a.is_compatible_with(&taller, Axis::Vertical));
        assert!(!a.is_compatible_with(&wider, Axis::Vertical));
        assert!(!a.is_compatible_with(&taller, Axis::Horizontal));
    }

    #[test]
    fn test_compatibility_checks_mode() {
        let exact = Constraints::exact(400, 800);
        let at_most = Constraints::new(SizeSpec::at_most(400), SizeSpec::exactly(800));
        assert!(!exact.is_compatible_with(&at_most, Axis::Vertical));
    }
}
