//! Per-position item holders

use crate::error::BinderResult;
use crate::geometry::Constraints;
use crate::item::{Item, ItemId};
use crate::layout::{materialize, LayoutComputer, MaterializedLayout, SavedState};

/// Identifier of a background materialization job
pub type JobId = u64;

/// A background materialization requested for a holder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingMaterialization {
    pub job_id: JobId,
    pub item_id: ItemId,
    pub constraints: Constraints,
}

/// Result of asking a holder to materialize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeOutcome {
    /// A new layout was computed and installed
    Computed,
    /// The installed layout already matches item and constraints
    Memoized,
}

/// Owns one list position's item, its materialized layout and the state
/// captured when that layout was last evicted.
///
/// A holder never has more than one layout: installing a layout always
/// replaces the previous one.
pub struct ItemHolder {
    item: Item,
    layout: Option<MaterializedLayout>,
    saved_state: Option<SavedState>,
    pending: Option<PendingMaterialization>,
}

impl ItemHolder {
    pub fn new(item: Item) -> Self {
        Self {
            item,
            layout: None,
            saved_state: None,
            pending: None,
        }
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn item_id(&self) -> ItemId {
        self.item.id()
    }

    pub fn is_sticky(&self) -> bool {
        self.item.is_sticky()
    }

    pub fn layout(&self) -> Option<&MaterializedLayout> {
        self.layout.as_ref()
    }

    pub fn has_layout(&self) -> bool {
        self.layout.is_some()
    }

    pub fn saved_state(&self) -> Option<&SavedState> {
        self.saved_state.as_ref()
    }

    pub fn pending(&self) -> Option<&PendingMaterialization> {
        self.pending.as_ref()
    }

    /// Whether the installed layout belongs to the current item.
    pub fn is_valid(&self) -> bool {
        self.layout
            .as_ref()
            .is_some_and(|layout| layout.item_id() == self.item.id())
    }

    /// Whether the installed layout was computed for the current item under
    /// `constraints`.
    pub fn is_current(&self, constraints: &Constraints) -> bool {
        self.layout
            .as_ref()
            .is_some_and(|layout| layout.matches(self.item.id(), constraints))
    }

    /// Whether a layout must still be requested for `constraints`: nothing
    /// current is installed and no matching job is in flight.
    pub fn needs_materialization(&self, constraints: &Constraints) -> bool {
        if self.is_current(constraints) {
            return false;
        }
        !self.pending.as_ref().is_some_and(|pending| {
            pending.item_id == self.item.id() && pending.constraints == *constraints
        })
    }

    /// Replaces the item descriptor.
    ///
    /// The old layout and saved state describe a different item and are
    /// dropped. Returns the in-flight job that must be cancelled, if any.
    pub fn set_item(&mut self, item: Item) -> Option<PendingMaterialization> {
        self.item = item;
        self.layout = None;
        self.saved_state = None;
        self.pending.take()
    }

    /// Computes the layout on the calling thread unless the installed one is
    /// already current.
    pub fn materialize_with(
        &mut self,
        computer: &dyn LayoutComputer,
        constraints: &Constraints,
    ) -> BinderResult<MaterializeOutcome> {
        if self.is_current(constraints) {
            return Ok(MaterializeOutcome::Memoized);
        }
        let layout = materialize(computer, &self.item, constraints, self.saved_state.as_ref())?;
        self.install_unchecked(layout);
        Ok(MaterializeOutcome::Computed)
    }

    /// Records an in-flight job, returning the one it supersedes.
    pub fn set_pending(&mut self, pending: PendingMaterialization) -> Option<PendingMaterialization> {
        self.pending.replace(pending)
    }

    pub fn take_pending(&mut self) -> Option<PendingMaterialization> {
        self.pending.take()
    }

    /// Installs a layout produced by job `job_id`.
    ///
    /// The layout is discarded unless that job is the holder's current
    /// pending job and the layout was computed for the current item.
    pub fn install_from_job(&mut self, job_id: JobId, layout: MaterializedLayout) -> bool {
        let expected = match self.pending {
            Some(pending) if pending.job_id == job_id => pending,
            _ => return false,
        };
        self.pending = None;
        if !layout.matches(self.item.id(), &expected.constraints) {
            return false;
        }
        self.install_unchecked(layout);
        true
    }

    fn install_unchecked(&mut self, layout: MaterializedLayout) {
        self.saved_state = None;
        self.layout = Some(layout);
    }

    /// Releases the layout, capturing recoverable state first.
    ///
    /// Returns `false` if there was nothing to evict.
    pub fn evict(&mut self, computer: &dyn LayoutComputer) -> bool {
        match self.layout.take() {
            Some(layout) => {
                log::trace!("evicting layout {} of item {}", layout.serial(), self.item.id());
                if let Some(state) = computer.save_state(&layout) {
                    self.saved_state = Some(state);
                }
                true
            }
            None => false,
        }
    }

    /// Drops the layout without capturing state, keeping the holder alive.
    /// Returns the in-flight job that must be cancelled, if any.
    pub fn invalidate(&mut self) -> Option<PendingMaterialization> {
        self.layout = None;
        self.pending.take()
    }
}

impl std::fmt::Debug for ItemHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemHolder")
            .field("item", &self.item)
            .field("layout", &self.layout)
            .field("pending", &self.pending)
            .field("has_saved_state", &self.saved_state.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BinderError;
    use crate::geometry::{Size, SizeSpec};
    use crate::layout::{ComputedLayout, FixedSizeComputer};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn column(width: u32) -> Constraints {
        Constraints::new(SizeSpec::exactly(width), SizeSpec::unspecified())
    }

    /// Remembers how many times it ran and restores a counter from saved state
    struct CountingComputer {
        calls: AtomicUsize,
    }

    impl LayoutComputer for CountingComputer {
        fn compute(
            &self,
            _item: &Item,
            constraints: &Constraints,
            restored: Option<&SavedState>,
        ) -> BinderResult<ComputedLayout> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let scroll = restored
                .and_then(|state| state.downcast_ref::<u32>())
                .copied()
                .unwrap_or(0);
            Ok(ComputedLayout::new(Size::new(constraints.width.size, 10), scroll))
        }

        fn save_state(&self, layout: &MaterializedLayout) -> Option<SavedState> {
            layout.tree::<u32>().map(|scroll| Arc::new(scroll + 1) as SavedState)
        }
    }

    #[test]
    fn test_materialize_is_memoized() {
        let computer = CountingComputer { calls: AtomicUsize::new(0) };
        let mut holder = ItemHolder::new(Item::new(()));

        assert_eq!(
            holder.materialize_with(&computer, &column(100)).unwrap(),
            MaterializeOutcome::Computed
        );
        let serial = holder.layout().unwrap().serial();
        assert_eq!(
            holder.materialize_with(&computer, &column(100)).unwrap(),
            MaterializeOutcome::Memoized
        );
        assert_eq!(holder.layout().unwrap().serial(), serial);
        assert_eq!(computer.calls.load(Ordering::SeqCst), 1);

        // New constraints replace the layout
        holder.materialize_with(&computer, &column(200)).unwrap();
        assert_eq!(holder.layout().unwrap().size().width, 200);
        assert_eq!(computer.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_evict_captures_and_restores_state() {
        let computer = CountingComputer { calls: AtomicUsize::new(0) };
        let mut holder = ItemHolder::new(Item::new(()));

        holder.materialize_with(&computer, &column(100)).unwrap();
        assert!(holder.evict(&computer));
        assert!(!holder.has_layout());
        assert!(holder.saved_state().is_some());
        assert!(!holder.evict(&computer));

        holder.materialize_with(&computer, &column(100)).unwrap();
        assert_eq!(holder.layout().unwrap().tree::<u32>(), Some(&1));
        assert!(holder.saved_state().is_none());
    }

    #[test]
    fn test_set_item_drops_layout_and_returns_pending() {
        let computer = FixedSizeComputer::new(10, 10);
        let mut holder = ItemHolder::new(Item::new(()));
        holder.materialize_with(&computer, &column(100)).unwrap();

        let pending = PendingMaterialization {
            job_id: 9,
            item_id: holder.item_id(),
            constraints: column(100),
        };
        holder.set_pending(pending);

        let cancelled = holder.set_item(Item::new(()));
        assert_eq!(cancelled, Some(pending));
        assert!(!holder.has_layout());
        assert!(holder.pending().is_none());
    }

    #[test]
    fn test_needs_materialization_respects_pending() {
        let mut holder = ItemHolder::new(Item::new(()));
        assert!(holder.needs_materialization(&column(100)));

        holder.set_pending(PendingMaterialization {
            job_id: 1,
            item_id: holder.item_id(),
            constraints: column(100),
        });
        assert!(!holder.needs_materialization(&column(100)));
        assert!(holder.needs_materialization(&column(200)));
    }

    #[test]
    fn test_install_from_job_rejects_stale_results() {
        let computer = FixedSizeComputer::new(10, 10);
        let old_item = Item::new(());
        let mut holder = ItemHolder::new(old_item.clone());
        let stale = materialize(&computer, &old_item, &column(100), None).unwrap();

        holder.set_pending(PendingMaterialization {
            job_id: 1,
            item_id: old_item.id(),
            constraints: column(100),
        });

        // Unknown job
        assert!(!holder.install_from_job(2, stale.clone()));
        assert!(holder.pending().is_some());

        // Item replaced while the job was running
        holder.set_item(Item::new(()));
        holder.set_pending(PendingMaterialization {
            job_id: 3,
            item_id: holder.item_id(),
            constraints: column(100),
        });
        assert!(!holder.install_from_job(3, stale));
        assert!(!holder.has_layout());
        assert!(holder.pending().is_none());
    }

    #[test]
    fn test_install_from_job_accepts_current_result() {
        let computer = FixedSizeComputer::new(10, 10);
        let item = Item::new(());
        let mut holder = ItemHolder::new(item.clone());
        holder.set_pending(PendingMaterialization {
            job_id: 4,
            item_id: item.id(),
            constraints: column(100),
        });

        let layout = materialize(&computer, &item, &column(100), None).unwrap();
        assert!(holder.install_from_job(4, layout));
        assert!(holder.is_current(&column(100)));
        assert!(holder.is_valid());
    }

    #[test]
    fn test_materialize_failure_leaves_holder_empty() {
        struct Failing;
        impl LayoutComputer for Failing {
            fn compute(
                &self,
                _item: &Item,
                _constraints: &Constraints,
                _restored: Option<&SavedState>,
            ) -> BinderResult<ComputedLayout> {
                Err(BinderError::LayoutFailed("no".into()))
            }
        }

        let mut holder = ItemHolder::new(Item::new(()));
        assert!(holder.materialize_with(&Failing, &column(10)).is_err());
        assert!(!holder.has_layout());
    }
}
