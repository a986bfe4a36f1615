//! Materialized layouts and the layout computation contract

use crate::error::{BinderError, BinderResult};
use crate::geometry::{Axis, Constraints, Size};
use crate::item::{Item, ItemId};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Opaque render tree produced by a [`LayoutComputer`]
pub type RenderTree = Arc<dyn Any + Send + Sync>;

/// Opaque state captured from an evicted layout so a later computation can
/// resume where it left off (scroll offsets, text selection, ...)
pub type SavedState = Arc<dyn Any + Send + Sync>;

static NEXT_LAYOUT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Output of a single [`LayoutComputer::compute`] call
pub struct ComputedLayout {
    pub size: Size,
    pub tree: RenderTree,
}

impl ComputedLayout {
    pub fn new<T>(size: Size, tree: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            size,
            tree: Arc::new(tree),
        }
    }
}

/// A computed layout bound to the item and constraints it was computed for
#[derive(Clone)]
pub struct MaterializedLayout {
    item_id: ItemId,
    constraints: Constraints,
    size: Size,
    tree: RenderTree,
    serial: u64,
}

impl MaterializedLayout {
    fn new(item_id: ItemId, constraints: Constraints, computed: ComputedLayout) -> Self {
        Self {
            item_id,
            constraints,
            size: computed.size,
            tree: computed.tree,
            serial: NEXT_LAYOUT_SERIAL.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Borrows the render tree if it has type `T`.
    pub fn tree<T: Any>(&self) -> Option<&T> {
        self.tree.downcast_ref::<T>()
    }

    /// Unique number of the computation that produced this layout
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Whether this layout was computed for `item_id` under `constraints`
    pub fn matches(&self, item_id: ItemId, constraints: &Constraints) -> bool {
        self.item_id == item_id && self.constraints == *constraints
    }
}

impl fmt::Debug for MaterializedLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterializedLayout")
            .field("item_id", &self.item_id)
            .field("size", &self.size)
            .field("serial", &self.serial)
            .finish_non_exhaustive()
    }
}

/// Computes the layout of one item under given constraints.
///
/// Implementations must be pure: identical item, constraints and restored
/// state produce identical output whether called on the coordination thread
/// or on a worker.
pub trait LayoutComputer: Send + Sync {
    /// Computes the layout of `item`.
    ///
    /// `restored` is the state captured when a previous layout of the same
    /// item was evicted.
    fn compute(
        &self,
        item: &Item,
        constraints: &Constraints,
        restored: Option<&SavedState>,
    ) -> BinderResult<ComputedLayout>;

    /// Captures recoverable state from a layout that is about to be evicted.
    fn save_state(&self, layout: &MaterializedLayout) -> Option<SavedState> {
        let _ = layout;
        None
    }
}

/// Materializes `item` synchronously.
pub fn materialize(
    computer: &dyn LayoutComputer,
    item: &Item,
    constraints: &Constraints,
    restored: Option<&SavedState>,
) -> BinderResult<MaterializedLayout> {
    let computed = computer.compute(item, constraints, restored)?;
    Ok(MaterializedLayout::new(item.id(), *constraints, computed))
}

/// Rejects child constraints that leave the cross axis of a container
/// scrolling along `scroll_axis` unconstrained.
pub fn validate_child_constraints(constraints: &Constraints, scroll_axis: Axis) -> BinderResult<()> {
    if constraints.along(scroll_axis.cross()).is_unspecified() {
        return Err(BinderError::UnconstrainedCrossAxis { axis: scroll_axis });
    }
    Ok(())
}

/// A computer that gives every item the same size, resolved against the
/// constraints. Useful for tests and for replaying operation scripts.
#[derive(Debug, Clone, Copy)]
pub struct FixedSizeComputer {
    pub item_size: Size,
}

impl FixedSizeComputer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            item_size: Size::new(width, height),
        }
    }
}

impl LayoutComputer for FixedSizeComputer {
    fn compute(
        &self,
        item: &Item,
        constraints: &Constraints,
        _restored: Option<&SavedState>,
    ) -> BinderResult<ComputedLayout> {
        let size = Size::new(
            constraints.width.resolve(self.item_size.width),
            constraints.height.resolve(self.item_size.height),
        );
        Ok(ComputedLayout::new(size, item.id()))
    }
}
