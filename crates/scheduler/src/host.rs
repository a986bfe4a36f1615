//! Host view capability
//!
//! The scheduler never depends on a concrete view type. A host that wants
//! to drive it implements [`HostView`]: it reports its scroll position,
//! accepts materialized content for on-screen positions, and is asked to
//! measure again when the cross axis becomes known.

use crate::VisibleRange;
use rangebinder_core::MaterializedLayout;

/// Capabilities a scrolling container provides to a window scheduler.
///
/// Callbacks run on the coordination thread, outside the scheduler's lock,
/// so they may call back into the scheduler.
pub trait HostView: Send + Sync {
    /// Positions currently on screen, if the host has laid anything out.
    fn visible_range(&self) -> Option<VisibleRange>;

    /// A layout for an on-screen position is ready to be mounted.
    fn content_ready(&self, position: usize, layout: &MaterializedLayout) {
        let _ = (position, layout);
    }

    /// The host's measured size is stale and it should call `measure` again.
    fn request_remeasure(&self) {}
}
