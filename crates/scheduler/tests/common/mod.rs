#![allow(dead_code)]

use rangebinder_core::{
    BinderConfig, BinderError, BinderResult, ComputedLayout, Constraints, FixedSizeComputer, Item,
    ItemId, LayoutComputer, SavedState, Size,
};
use rangebinder_scheduler::{StructuralChange, WindowScheduler};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ITEM_WIDTH: u32 = 100;
pub const ITEM_HEIGHT: u32 = 20;
pub const VIEWPORT: u32 = 100;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn items(count: usize) -> Vec<Item> {
    (0..count).map(Item::new).collect()
}

pub fn config(ratio: f32) -> BinderConfig {
    BinderConfig::new()
        .with_worker_threads(0)
        .with_range_ratio(ratio)
}

/// A measured scheduler over `items` with a 100x100 viewport and 100x20
/// items, so one viewport holds five items.
pub fn established(items: Vec<Item>, ratio: f32) -> WindowScheduler {
    established_with(
        WindowScheduler::builder()
            .layout_computer(Arc::new(FixedSizeComputer::new(ITEM_WIDTH, ITEM_HEIGHT)))
            .config(config(ratio))
            .build()
            .unwrap(),
        items,
    )
}

pub fn established_with(scheduler: WindowScheduler, items: Vec<Item>) -> WindowScheduler {
    init_logging();
    scheduler
        .measure(Constraints::exact(VIEWPORT, VIEWPORT), None)
        .unwrap();
    scheduler.insert_range_at(0, items).unwrap();
    scheduler.on_container_size_known(VIEWPORT, VIEWPORT).unwrap();
    scheduler
}

pub fn settle(scheduler: &WindowScheduler) {
    assert!(scheduler.wait_idle(Duration::from_secs(10)).unwrap());
}

/// Every position in the working range holds a layout and every
/// non-sticky position outside it does not.
pub fn assert_window_invariant(scheduler: &WindowScheduler, sticky: &[usize]) {
    let range = scheduler.working_range();
    for position in 0..scheduler.item_count() {
        let in_range = range.is_some_and(|range| range.contains(position));
        let materialized = scheduler.is_materialized(position);
        if in_range {
            assert!(materialized, "position {} in {:?} is not materialized", position, range);
        } else if !sticky.contains(&position) {
            assert!(!materialized, "position {} outside {:?} kept its layout", position, range);
        }
    }
}

/// Records every structural change it is told about.
#[derive(Default)]
pub struct RecordingListener {
    pub changes: Mutex<Vec<StructuralChange>>,
}

impl RecordingListener {
    pub fn take(&self) -> Vec<StructuralChange> {
        std::mem::take(&mut *self.changes.lock().unwrap())
    }
}

impl rangebinder_scheduler::ChangeListener for RecordingListener {
    fn on_structural_change(&self, change: StructuralChange) {
        self.changes.lock().unwrap().push(change);
    }
}

/// Fails items whose content is `"fail"` and panics on `"panic"`.
pub struct FlakyComputer;

impl LayoutComputer for FlakyComputer {
    fn compute(
        &self,
        item: &Item,
        constraints: &Constraints,
        restored: Option<&SavedState>,
    ) -> BinderResult<ComputedLayout> {
        match item.content::<&str>() {
            Some(&"fail") => Err(BinderError::LayoutFailed("render tree refused".to_string())),
            Some(&"panic") => panic!("render tree exploded"),
            _ => FixedSizeComputer::new(ITEM_WIDTH, ITEM_HEIGHT).compute(item, constraints, restored),
        }
    }
}

/// Fails the first attempt at each item whose content is `"flaky"` and
/// succeeds afterwards.
#[derive(Default)]
pub struct FailOnceComputer {
    pub attempts: Mutex<Vec<ItemId>>,
}

impl FailOnceComputer {
    pub fn attempts_for(&self, id: ItemId) -> usize {
        self.attempts.lock().unwrap().iter().filter(|seen| **seen == id).count()
    }
}

impl LayoutComputer for FailOnceComputer {
    fn compute(
        &self,
        item: &Item,
        constraints: &Constraints,
        restored: Option<&SavedState>,
    ) -> BinderResult<ComputedLayout> {
        let first_attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let first = !attempts.contains(&item.id());
            attempts.push(item.id());
            first
        };
        if first_attempt && item.content::<&str>() == Some(&"flaky") {
            return Err(BinderError::LayoutFailed("not ready yet".to_string()));
        }
        FixedSizeComputer::new(ITEM_WIDTH, ITEM_HEIGHT).compute(item, constraints, restored)
    }
}

/// Saves the evicted layout's size and counts restorations.
#[derive(Default)]
pub struct StatefulComputer {
    pub restored: Mutex<Vec<Size>>,
}

impl LayoutComputer for StatefulComputer {
    fn compute(
        &self,
        item: &Item,
        constraints: &Constraints,
        restored: Option<&SavedState>,
    ) -> BinderResult<ComputedLayout> {
        if let Some(size) = restored.and_then(|state| state.downcast_ref::<Size>()) {
            self.restored.lock().unwrap().push(*size);
        }
        FixedSizeComputer::new(ITEM_WIDTH, ITEM_HEIGHT).compute(item, constraints, restored)
    }

    fn save_state(&self, layout: &rangebinder_core::MaterializedLayout) -> Option<SavedState> {
        Some(Arc::new(layout.size()))
    }
}
