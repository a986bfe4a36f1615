//! Window scheduler
//!
//! [`WindowScheduler`] owns the authoritative item list and keeps the
//! holders around the visible window materialized. Structural mutations
//! update the registry synchronously, materialize affected in-range
//! positions on the calling thread, and then reconcile the rest of the
//! working range: range members are queued for background materialization
//! and non-sticky holders outside it are evicted.
//!
//! Background results travel back over a channel and are installed by the
//! coordination thread in [`WindowScheduler::process_completions`], which
//! discards anything that no longer matches the holder it was computed for.
//!
//! # Example
//!
//! ```
//! use rangebinder_core::{BinderConfig, Constraints, FixedSizeComputer, Item};
//! use rangebinder_scheduler::{Phase, WindowScheduler};
//! use std::sync::Arc;
//!
//! let scheduler = WindowScheduler::builder()
//!     .layout_computer(Arc::new(FixedSizeComputer::new(400, 50)))
//!     .config(BinderConfig::new().with_worker_threads(0).with_range_ratio(1.0))
//!     .build()
//!     .unwrap();
//!
//! scheduler.measure(Constraints::exact(400, 200), None).unwrap();
//! scheduler.insert_range_at(0, (0..50).map(Item::new).collect()).unwrap();
//! scheduler.on_container_size_known(400, 200).unwrap();
//! assert_eq!(scheduler.phase(), Phase::RangeEstablished);
//!
//! scheduler.on_scroll(10, 13).unwrap();
//! scheduler.run_queued_jobs().unwrap();
//! scheduler.process_completions().unwrap();
//! assert!(scheduler.is_materialized(12));
//! assert!(!scheduler.is_materialized(40));
//! ```

use crate::changeset::{ChangeOp, Changeset, ChangesetOutcome};
use crate::host::HostView;
use crate::listener::{ChangeListener, StructuralChange};
use crate::priority::{JobPriority, JobRequest, MaterializeJob};
use crate::range::WorkingRange;
use crate::scheduler::{JobScheduler, SchedulerStats};
use crate::viewport::{ViewportTracker, VisibleRange};
use crate::worker::{run_job, JobExecutor, WorkerPool, WorkerPoolConfig};
use crate::CancellationToken;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use rangebinder_core::{
    materialize, Axis, BinderConfig, BinderError, BinderResult, Constraints, Item,
    ItemAttributes, ItemId, ItemRegistry, JobId, LayoutComputer, LayoutInfo, MaterializeOutcome,
    MaterializedLayout, PendingMaterialization, RangeEstimate, RangeEstimator, Size, SizeMode,
    VecPool,
};
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

const FAILURE_CHANNEL_CAPACITY: usize = 64;

const SCRATCH_CAPACITY: usize = 16;

/// Longest single wait inside [`WindowScheduler::wait_idle`]
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Lifecycle of a scheduler's sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// `measure` has not succeeded yet
    Unmeasured,

    /// The container size is known but no range has been computed
    Measured,

    /// A range estimate exists and range computations take effect
    RangeEstablished,
}

/// Counters describing the work a scheduler has done.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BinderStats {
    pub sync_materializations: u64,
    pub async_materializations: u64,

    /// Synchronous requests answered by the already installed layout
    pub memoized: u64,

    pub evictions: u64,
    pub jobs_scheduled: u64,

    /// Background results that arrived for a stale item, job or position
    pub discarded_results: u64,

    /// Range passes abandoned because the registry changed underneath them
    pub aborted_passes: u64,

    pub failed_materializations: u64,
    pub range_computations: u64,

    /// Scroll reports ignored because the visible range did not change
    pub debounced_scrolls: u64,
}

/// A materialization that failed, as reported on the failure stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializationFailure {
    pub item_id: ItemId,

    /// Position of the item when the work was requested
    pub position_hint: usize,

    pub message: String,
}

/// One-shot callback asking the host to measure again, with the size the
/// scheduler now resolves to.
pub type RemeasureCallback = Box<dyn FnOnce(Size) + Send>;

struct Completion {
    job_id: JobId,
    item_id: ItemId,
    position_hint: usize,

    /// The failure itself was already reported by the worker
    result: Result<MaterializedLayout, ()>,
}

struct BinderState {
    registry: ItemRegistry,
    phase: Phase,
    container: Option<Constraints>,
    viewport: Option<Size>,
    estimate: Option<RangeEstimate>,

    /// Items per viewport, after layout-info scaling
    range_size_hint: usize,

    range: Option<WorkingRange>,
    tracker: ViewportTracker,
    stats: BinderStats,
    remeasure: Option<RemeasureCallback>,
    host: Option<Arc<dyn HostView>>,
    scratch: VecPool<JobId>,
    released: bool,
}

impl BinderState {
    fn new() -> Self {
        Self {
            registry: ItemRegistry::new(),
            phase: Phase::Unmeasured,
            container: None,
            viewport: None,
            estimate: None,
            range_size_hint: 0,
            range: None,
            tracker: ViewportTracker::new(),
            stats: BinderStats::default(),
            remeasure: None,
            host: None,
            scratch: VecPool::default(),
            released: false,
        }
    }

    fn established_visible_range(&self) -> Option<VisibleRange> {
        if self.phase == Phase::RangeEstablished {
            self.tracker.current()
        } else {
            None
        }
    }
}

/// Host callbacks collected under the lock and delivered after it is
/// released.
#[derive(Default)]
struct Effects {
    host: Option<Arc<dyn HostView>>,
    ready: Vec<(usize, MaterializedLayout)>,
    remeasure: Option<(RemeasureCallback, Size)>,
}

struct Inner {
    state: Mutex<BinderState>,
    jobs: Arc<JobScheduler>,
    executor: JobExecutor,
    completions: Receiver<Completion>,
    failures_tx: Sender<MaterializationFailure>,
    failures_rx: Receiver<MaterializationFailure>,
    workers: Mutex<Option<WorkerPool>>,
    has_workers: bool,
    computer: Arc<dyn LayoutComputer>,
    listener: Option<Arc<dyn ChangeListener>>,
    layout_info: LayoutInfo,
    scroll_axis: Axis,
    config: BinderConfig,
}

/// Range-windowed materialization scheduler.
///
/// Cloning yields another handle to the same scheduler. Mutations, scroll
/// reports and completion processing are meant to come from a single
/// coordination thread; background workers only compute layouts.
#[derive(Clone)]
pub struct WindowScheduler {
    inner: Arc<Inner>,
}

/// Builder for [`WindowScheduler`].
pub struct WindowSchedulerBuilder {
    computer: Option<Arc<dyn LayoutComputer>>,
    listener: Option<Arc<dyn ChangeListener>>,
    layout_info: LayoutInfo,
    scroll_axis: Axis,
    config: BinderConfig,
}

impl WindowSchedulerBuilder {
    fn new() -> Self {
        Self {
            computer: None,
            listener: None,
            layout_info: LayoutInfo::default(),
            scroll_axis: Axis::default(),
            config: BinderConfig::default(),
        }
    }

    /// Required.
    pub fn layout_computer(mut self, computer: Arc<dyn LayoutComputer>) -> Self {
        self.computer = Some(computer);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn ChangeListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn layout_info(mut self, layout_info: LayoutInfo) -> Self {
        self.layout_info = layout_info;
        self
    }

    pub fn scroll_axis(mut self, axis: Axis) -> Self {
        self.scroll_axis = axis;
        self
    }

    pub fn config(mut self, config: BinderConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates the configuration and starts the worker pool.
    pub fn build(self) -> BinderResult<WindowScheduler> {
        let computer = self
            .computer
            .ok_or(BinderError::MissingCollaborator("layout computer"))?;
        self.config.validate()?;
        self.layout_info.validate()?;

        let jobs = Arc::new(JobScheduler::new());
        let (completions_tx, completions_rx) = unbounded();
        let (failures_tx, failures_rx) = bounded(FAILURE_CHANNEL_CAPACITY);
        let executor = job_executor(computer.clone(), completions_tx, failures_tx.clone());

        let workers = if self.config.worker_threads > 0 {
            let pool_config = WorkerPoolConfig::new(self.config.worker_threads)
                .with_poll_interval(self.config.worker_poll_interval);
            Some(WorkerPool::new(jobs.clone(), executor.clone(), pool_config)?)
        } else {
            None
        };

        log::debug!(
            "window scheduler: {:?} {} scrolling, ratio {}, {} workers",
            self.layout_info,
            self.scroll_axis,
            self.config.range_ratio,
            self.config.worker_threads
        );

        Ok(WindowScheduler {
            inner: Arc::new(Inner {
                state: Mutex::new(BinderState::new()),
                jobs,
                executor,
                completions: completions_rx,
                failures_tx,
                failures_rx,
                has_workers: workers.is_some(),
                workers: Mutex::new(workers),
                computer,
                listener: self.listener,
                layout_info: self.layout_info,
                scroll_axis: self.scroll_axis,
                config: self.config,
            }),
        })
    }
}

fn job_executor(
    computer: Arc<dyn LayoutComputer>,
    completions: Sender<Completion>,
    failures: Sender<MaterializationFailure>,
) -> JobExecutor {
    Arc::new(move |job: &MaterializeJob, token: &CancellationToken| {
        if token.is_cancelled() {
            return;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            materialize(computer.as_ref(), &job.item, &job.constraints, job.restored.as_ref())
        }));
        let result = match outcome {
            Ok(Ok(layout)) => Ok(layout),
            Ok(Err(error)) => Err(error.to_string()),
            Err(payload) => Err(panic_message(payload.as_ref())),
        };

        let result = result.map_err(|message| {
            log::error!(
                "background materialization of item {} (position {}) failed: {}",
                job.item_id(),
                job.position_hint,
                message
            );
            let _ = failures.try_send(MaterializationFailure {
                item_id: job.item_id(),
                position_hint: job.position_hint,
                message,
            });
        });

        // The scheduler may already be gone
        let _ = completions.send(Completion {
            job_id: job.id,
            item_id: job.item_id(),
            position_hint: job.position_hint,
            result,
        });
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

fn size_from_axes(scroll_axis: Axis, scroll: u32, cross: u32) -> Size {
    match scroll_axis {
        Axis::Vertical => Size::new(cross, scroll),
        Axis::Horizontal => Size::new(scroll, cross),
    }
}

fn same_host(a: &Arc<dyn HostView>, b: &Arc<dyn HostView>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, BinderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> BinderResult<MutexGuard<'_, BinderState>> {
        let state = self.state();
        if state.released {
            return Err(BinderError::Released);
        }
        Ok(state)
    }

    fn child_constraints(
        &self,
        state: &BinderState,
        attributes: &ItemAttributes,
    ) -> BinderResult<Constraints> {
        let container = state.container.ok_or_else(|| {
            BinderError::InvalidConfig("scheduler has not been measured".to_string())
        })?;
        self.layout_info.child_constraints(
            &container,
            self.scroll_axis,
            attributes,
            self.config.dynamic_cross_axis,
        )
    }

    /// Size the container resolves to under `container`.
    fn resolve_size(&self, container: &Constraints, estimate: Option<&RangeEstimate>) -> Size {
        let scroll = container.along(self.scroll_axis).size;
        let cross_spec = container.along(self.scroll_axis.cross());

        let cross = match (cross_spec.mode, estimate) {
            (SizeMode::Exactly, _) => cross_spec.size,
            (_, Some(estimate)) if self.config.dynamic_cross_axis => {
                cross_spec.resolve(estimate.measured_cross_axis_size)
            }
            (SizeMode::AtMost, _) => cross_spec.size,
            (SizeMode::Unspecified, _) => 0,
        };
        size_from_axes(self.scroll_axis, scroll, cross)
    }

    fn report_failure(&self, failure: MaterializationFailure) {
        let _ = self.failures_tx.try_send(failure);
    }

    /// Materializes `position` on the calling thread.
    ///
    /// Failures are reported and leave the holder empty; the next range
    /// pass retries it in the background.
    fn materialize_sync(
        &self,
        state: &mut BinderState,
        position: usize,
    ) -> Option<MaterializedLayout> {
        let attributes = *state.registry.get(position)?.item().attributes();
        let constraints = match self.child_constraints(state, &attributes) {
            Ok(constraints) => constraints,
            Err(error) => {
                log::error!("cannot constrain position {}: {}", position, error);
                return None;
            }
        };

        let holder = state.registry.get_mut(position)?;
        if let Some(pending) = holder.take_pending() {
            self.jobs.cancel_job(pending.job_id);
        }
        let item_id = holder.item_id();

        match holder.materialize_with(self.computer.as_ref(), &constraints) {
            Ok(MaterializeOutcome::Computed) => state.stats.sync_materializations += 1,
            Ok(MaterializeOutcome::Memoized) => state.stats.memoized += 1,
            Err(error) => {
                state.stats.failed_materializations += 1;
                log::error!(
                    "materialization of item {} at position {} failed: {}",
                    item_id,
                    position,
                    error
                );
                self.report_failure(MaterializationFailure {
                    item_id,
                    position_hint: position,
                    message: error.to_string(),
                });
                return None;
            }
        }
        state.registry.get(position)?.layout().cloned()
    }

    /// Derives the range estimate from the first item once the container,
    /// the viewport and at least one item are known.
    fn establish_range(&self, state: &mut BinderState, effects: &mut Effects) {
        if state.phase != Phase::Measured || state.registry.is_empty() {
            return;
        }
        let Some(viewport) = state.viewport else {
            return;
        };
        let Some(first) = self.materialize_sync(state, 0) else {
            return;
        };

        let first_size = first.size();
        let estimate = RangeEstimator::from_first_item(first_size, viewport, self.scroll_axis);
        state.range_size_hint =
            self.layout_info
                .approximate_range_size(first_size, viewport, self.scroll_axis);
        state.estimate = Some(estimate);
        state.phase = Phase::RangeEstablished;
        if state.tracker.current().is_none() {
            state.tracker.set(VisibleRange::new(0, 0));
        }

        log::debug!(
            "range established: {} items per viewport ({:?}, viewport {}x{})",
            state.range_size_hint,
            estimate,
            viewport.width,
            viewport.height
        );

        if state.tracker.current().is_some_and(|visible| visible.contains(0)) {
            effects.ready.push((0, first));
        }
        if let (Some(callback), Some(container)) = (state.remeasure.take(), state.container) {
            effects.remeasure = Some((callback, self.resolve_size(&container, Some(&estimate))));
        }
    }

    /// Drops every layout after an incompatible remeasure.
    fn invalidate_all(&self, state: &mut BinderState) {
        let cancelled: Vec<JobId> = state
            .registry
            .iter_mut()
            .filter_map(|holder| holder.invalidate())
            .map(|pending| pending.job_id)
            .collect();
        self.jobs.cancel_jobs(&cancelled);

        if state.phase == Phase::RangeEstablished {
            state.phase = Phase::Measured;
        }
        state.estimate = None;
        state.range = None;
        state.range_size_hint = 0;
        state.viewport = None;
        log::debug!(
            "incompatible remeasure: dropped {} holders' layouts, {} jobs",
            state.registry.len(),
            cancelled.len()
        );
    }

    /// Runs one reconciliation pass around `visible`.
    fn compute_range(&self, visible: VisibleRange) -> BinderResult<()> {
        let (version, len, range, mut cancelled) = {
            let mut state = self.lock()?;
            state.tracker.set(visible);
            if state.phase != Phase::RangeEstablished {
                log::trace!("range computation for {} before range is established", visible);
                return Ok(());
            }

            let len = state.registry.len();
            state.range =
                WorkingRange::around(visible, state.range_size_hint, self.config.range_ratio, len);
            let Some(range) = state.range else {
                return Ok(());
            };
            state.stats.range_computations += 1;
            log::debug!("working range {} for visible {} of {} items", range, visible, len);

            let scratch = state.scratch.acquire(SCRATCH_CAPACITY);
            (state.registry.version(), len, range, scratch)
        };

        let result = self.reconcile(version, len, range, visible, &mut cancelled);

        self.jobs.cancel_jobs(&cancelled);
        self.state().scratch.release(cancelled);
        result
    }

    /// Walks every holder, re-taking the lock for each one and abandoning
    /// the pass as soon as the registry no longer has the shape it was
    /// computed for.
    fn reconcile(
        &self,
        version: u64,
        len: usize,
        range: WorkingRange,
        visible: VisibleRange,
        cancelled: &mut Vec<JobId>,
    ) -> BinderResult<()> {
        for position in 0..len {
            let mut state = self.lock()?;
            if state.registry.version() != version {
                state.stats.aborted_passes += 1;
                log::warn!(
                    "registry changed during range computation {}; pass abandoned at {}",
                    range,
                    position
                );
                return Ok(());
            }
            self.reconcile_holder(&mut state, position, range, visible, cancelled)?;
        }
        Ok(())
    }

    fn reconcile_holder(
        &self,
        state: &mut BinderState,
        position: usize,
        range: WorkingRange,
        visible: VisibleRange,
        cancelled: &mut Vec<JobId>,
    ) -> BinderResult<()> {
        let Some(holder) = state.registry.get(position) else {
            return Ok(());
        };

        if range.contains(position) {
            let attributes = *holder.item().attributes();
            let constraints = self.child_constraints(state, &attributes)?;
            let Some(holder) = state.registry.get_mut(position) else {
                return Ok(());
            };
            if !holder.needs_materialization(&constraints) {
                return Ok(());
            }

            let priority = if visible.contains(position) {
                JobPriority::Visible
            } else {
                JobPriority::Range
            };
            let item_id = holder.item_id();
            let (job_id, _token) = self.jobs.submit(
                priority,
                JobRequest {
                    item: holder.item().clone(),
                    constraints,
                    restored: holder.saved_state().cloned(),
                    position_hint: position,
                },
            );
            let superseded = holder.set_pending(PendingMaterialization {
                job_id,
                item_id,
                constraints,
            });
            if let Some(superseded) = superseded {
                cancelled.push(superseded.job_id);
            }
            state.stats.jobs_scheduled += 1;
            log::trace!("scheduled job {} for position {} ({:?})", job_id, position, priority);
        } else if !holder.is_sticky() {
            let Some(holder) = state.registry.get_mut(position) else {
                return Ok(());
            };
            if let Some(pending) = holder.take_pending() {
                cancelled.push(pending.job_id);
            }
            if holder.evict(self.computer.as_ref()) {
                state.stats.evictions += 1;
            }
        }
        Ok(())
    }

    /// Installs one background result if it still belongs where it is going.
    fn install(&self, state: &mut BinderState, completion: Completion, effects: &mut Effects) -> bool {
        let Completion {
            job_id,
            item_id,
            position_hint,
            result,
        } = completion;

        let Some(position) = state.registry.position_of(item_id, Some(position_hint)) else {
            state.stats.discarded_results += 1;
            log::warn!("discarding layout from job {}: item {} is gone", job_id, item_id);
            return false;
        };
        let in_range = state.range.is_some_and(|range| range.contains(position));
        let visible = state.tracker.current().is_some_and(|v| v.contains(position));

        let Some(holder) = state.registry.get_mut(position) else {
            return false;
        };
        let expected = holder.pending().is_some_and(|pending| pending.job_id == job_id);

        let layout = match result {
            Ok(layout) => layout,
            Err(()) => {
                if expected {
                    holder.take_pending();
                }
                state.stats.failed_materializations += 1;
                return false;
            }
        };

        if !in_range && !holder.is_sticky() {
            if expected {
                holder.take_pending();
            }
            state.stats.discarded_results += 1;
            log::warn!(
                "discarding layout from job {}: position {} left the working range",
                job_id,
                position
            );
            return false;
        }

        if holder.install_from_job(job_id, layout.clone()) {
            state.stats.async_materializations += 1;
            if visible {
                effects.ready.push((position, layout));
            }
            true
        } else {
            state.stats.discarded_results += 1;
            log::warn!(
                "discarding stale layout from job {} for position {}",
                job_id,
                position
            );
            false
        }
    }

    fn drain_completions(&self, first: Option<Completion>) -> BinderResult<usize> {
        let mut effects = Effects::default();
        let installed = {
            let mut state = self.lock()?;
            effects.host = state.host.clone();
            first
                .into_iter()
                .chain(self.completions.try_iter())
                .map(|completion| self.install(&mut state, completion, &mut effects))
                .filter(|installed| *installed)
                .count()
        };
        self.deliver(effects);
        Ok(installed)
    }

    /// Applies a structural mutation and reconciles the window around it.
    fn mutate<F>(&self, change: StructuralChange, apply: F) -> BinderResult<()>
    where
        F: FnOnce(&mut ItemRegistry) -> BinderResult<Vec<JobId>>,
    {
        let mut effects = Effects::default();
        let visible = {
            let mut state = self.lock()?;
            let cancelled = apply(&mut state.registry)?;
            self.jobs.cancel_jobs(&cancelled);
            if change.is_noop() {
                return Ok(());
            }

            let len = state.registry.len();
            match change {
                StructuralChange::Insert { position, count } => {
                    state.tracker.shift_for_insert(position, count, len)
                }
                StructuralChange::Remove { position, count } => {
                    state.tracker.shift_for_remove(position, count, len)
                }
                StructuralChange::Move { from, to } => state.tracker.shift_for_move(from, to, len),
                StructuralChange::Update { .. } => {}
            }

            self.establish_range(&mut state, &mut effects);
            if state.phase == Phase::RangeEstablished {
                if len == 0 {
                    state.range = None;
                } else if state.tracker.current().is_none() {
                    state.tracker.set(VisibleRange::new(0, 0));
                }
            }

            if let Some(visible) = state.established_visible_range() {
                let target = WorkingRange::around(
                    visible,
                    state.range_size_hint,
                    self.config.range_ratio,
                    len,
                );
                if let Some(target) = target {
                    for position in change.affected_positions().filter(|p| target.contains(*p)) {
                        let Some(layout) = self.materialize_sync(&mut state, position) else {
                            continue;
                        };
                        if visible.contains(position) {
                            effects.ready.push((position, layout));
                        }
                    }
                }
            }

            effects.host = state.host.clone();
            state.established_visible_range()
        };

        if let Some(visible) = visible {
            self.compute_range(visible)?;
        }
        self.deliver(effects);
        if let Some(listener) = &self.listener {
            listener.on_structural_change(change);
        }
        Ok(())
    }

    fn deliver(&self, effects: Effects) {
        let Effects {
            host,
            ready,
            remeasure,
        } = effects;

        if let Some(host) = &host {
            for (position, layout) in &ready {
                host.content_ready(*position, layout);
            }
        }
        if let Some((callback, size)) = remeasure {
            callback(size);
            if let Some(host) = &host {
                host.request_remeasure();
            }
        }
    }
}

impl WindowScheduler {
    pub fn builder() -> WindowSchedulerBuilder {
        WindowSchedulerBuilder::new()
    }

    /// Resolves the scheduler's own size.
    ///
    /// The scroll axis must be `Exactly` or `AtMost`. A non-exact cross axis
    /// is only accepted with dynamic cross-axis sizing; until the first item
    /// establishes a range, `remeasure` is kept and invoked with the final
    /// size once it is known. A measurement whose cross axis differs from
    /// the previous one drops every layout and reverts to
    /// [`Phase::Measured`].
    pub fn measure(
        &self,
        constraints: Constraints,
        remeasure: Option<RemeasureCallback>,
    ) -> BinderResult<Size> {
        let inner = &self.inner;
        let axis = inner.scroll_axis;
        if constraints.along(axis).is_unspecified() {
            return Err(BinderError::UnconstrainedScrollAxis { axis });
        }
        let cross = constraints.along(axis.cross());
        if cross.is_unspecified() && !inner.config.dynamic_cross_axis {
            return Err(BinderError::UnconstrainedCrossAxis { axis });
        }

        let mut state = inner.lock()?;
        if let Some(previous) = state.container {
            if !previous.is_compatible_with(&constraints, axis) {
                inner.invalidate_all(&mut state);
            }
        }

        let deferred = inner.config.dynamic_cross_axis && !cross.is_exact() && state.estimate.is_none();
        if deferred && remeasure.is_none() && state.remeasure.is_none() {
            return Err(BinderError::MissingCollaborator("remeasure callback"));
        }

        state.container = Some(constraints);
        if state.phase == Phase::Unmeasured {
            state.phase = Phase::Measured;
        }
        if deferred {
            if let Some(callback) = remeasure {
                state.remeasure = Some(callback);
            }
        }

        Ok(inner.resolve_size(&constraints, state.estimate.as_ref()))
    }

    /// Records the container's laid-out size and establishes the range.
    ///
    /// An unmeasured scheduler treats the size as exact constraints. A new
    /// size on an established scheduler re-derives the estimate.
    pub fn on_container_size_known(&self, width: u32, height: u32) -> BinderResult<()> {
        let inner = &self.inner;
        let mut effects = Effects::default();
        let viewport = Size::new(width, height);

        let visible = {
            let mut state = inner.lock()?;
            if state.phase == Phase::Unmeasured {
                state.container = Some(Constraints::exact(width, height));
                state.phase = Phase::Measured;
            }
            if state.phase == Phase::RangeEstablished {
                if state.viewport == Some(viewport) {
                    return Ok(());
                }
                state.phase = Phase::Measured;
            }
            state.viewport = Some(viewport);

            inner.establish_range(&mut state, &mut effects);
            effects.host = state.host.clone();
            state.established_visible_range()
        };

        if let Some(visible) = visible {
            inner.compute_range(visible)?;
        }
        inner.deliver(effects);
        Ok(())
    }

    pub fn insert_at(&self, position: usize, item: Item) -> BinderResult<()> {
        self.insert_range_at(position, vec![item])
    }

    pub fn insert_range_at(&self, position: usize, items: Vec<Item>) -> BinderResult<()> {
        let count = items.len();
        self.inner
            .mutate(StructuralChange::Insert { position, count }, |registry| {
                registry.insert_range_at(position, items)?;
                Ok(Vec::new())
            })
    }

    pub fn remove_at(&self, position: usize) -> BinderResult<()> {
        self.remove_range_at(position, 1)
    }

    pub fn remove_range_at(&self, position: usize, count: usize) -> BinderResult<()> {
        self.inner
            .mutate(StructuralChange::Remove { position, count }, |registry| {
                let removed = registry.remove_range_at(position, count)?;
                Ok(removed
                    .iter()
                    .filter_map(|holder| holder.pending())
                    .map(|pending| pending.job_id)
                    .collect())
            })
    }

    pub fn move_item(&self, from: usize, to: usize) -> BinderResult<()> {
        self.inner
            .mutate(StructuralChange::Move { from, to }, |registry| {
                registry.move_item(from, to)?;
                Ok(Vec::new())
            })
    }

    pub fn update_at(&self, position: usize, item: Item) -> BinderResult<()> {
        self.update_range_at(position, vec![item])
    }

    pub fn update_range_at(&self, position: usize, items: Vec<Item>) -> BinderResult<()> {
        let count = items.len();
        self.inner
            .mutate(StructuralChange::Update { position, count }, |registry| {
                let cancelled = registry.update_range_at(position, items)?;
                Ok(cancelled.into_iter().map(|pending| pending.job_id).collect())
            })
    }

    /// Applies a batch of operations produced against a data source that
    /// now holds `authoritative_items`.
    ///
    /// Out-of-bounds operations fail before anything is applied. If the
    /// batch would leave a different number of items than the data source
    /// holds, the mismatch is logged and the whole list is replaced by
    /// `authoritative_items` instead.
    pub fn apply_changeset(
        &self,
        changeset: Changeset,
        authoritative_items: Vec<Item>,
    ) -> BinderResult<ChangesetOutcome> {
        let start_len = self.inner.lock()?.registry.len();
        let final_len = changeset.final_len(start_len)?;

        if final_len != authoritative_items.len() {
            log::error!(
                "changeset leaves {} items but the data source holds {}; reloading all items",
                final_len,
                authoritative_items.len()
            );
            self.remove_range_at(0, start_len)?;
            self.insert_range_at(0, authoritative_items)?;
            return Ok(ChangesetOutcome::Reloaded);
        }

        let operations = changeset.len();
        for op in changeset.into_ops() {
            match op {
                ChangeOp::Insert { position, items } => self.insert_range_at(position, items)?,
                ChangeOp::Remove { position, count } => self.remove_range_at(position, count)?,
                ChangeOp::Move { from, to } => self.move_item(from, to)?,
                ChangeOp::Update { position, items } => self.update_range_at(position, items)?,
            }
        }
        Ok(ChangesetOutcome::Applied { operations })
    }

    /// Host scroll report. Unchanged reports are ignored.
    pub fn on_scroll(&self, first_visible: usize, last_visible: usize) -> BinderResult<()> {
        let changed = {
            let mut state = self.inner.lock()?;
            let changed = state.tracker.on_scroll(first_visible, last_visible);
            if changed.is_none() {
                state.stats.debounced_scrolls += 1;
            }
            changed
        };
        match changed {
            Some(visible) => self.inner.compute_range(visible),
            None => Ok(()),
        }
    }

    /// Reconciles the working range around the given visible positions
    /// without debouncing.
    pub fn compute_range(&self, first_visible: usize, last_visible: usize) -> BinderResult<()> {
        self.inner
            .compute_range(VisibleRange::new(first_visible, last_visible))
    }

    /// Installs finished background layouts, returning how many were kept.
    pub fn process_completions(&self) -> BinderResult<usize> {
        self.inner.drain_completions(None)
    }

    /// Runs every queued job on the calling thread. Their results are
    /// installed by the next [`process_completions`](Self::process_completions).
    pub fn run_queued_jobs(&self) -> BinderResult<usize> {
        let inner = &self.inner;
        drop(inner.lock()?);
        let mut executed = 0;
        while let Some(job) = inner.jobs.next_job() {
            run_job(&inner.jobs, &inner.executor, job);
            executed += 1;
        }
        Ok(executed)
    }

    /// Processes completions until no job is queued or running, or until
    /// `timeout` elapses. Without workers, queued jobs run on the calling
    /// thread. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> BinderResult<bool> {
        let inner = &self.inner;
        let deadline = Instant::now() + timeout;
        loop {
            if !inner.has_workers {
                self.run_queued_jobs()?;
            }
            inner.drain_completions(None)?;
            if inner.jobs.is_idle() && inner.completions.is_empty() {
                return Ok(true);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            if let Ok(completion) = inner.completions.recv_timeout((deadline - now).min(IDLE_POLL)) {
                inner.drain_completions(Some(completion))?;
            }
        }
    }

    /// Connects a host view and seeds the visible range from it.
    pub fn attach_to_view(&self, host: Arc<dyn HostView>) -> BinderResult<()> {
        let visible = host.visible_range();
        self.inner.lock()?.host = Some(host);
        match visible {
            Some(visible) => self.on_scroll(visible.first, visible.last),
            None => Ok(()),
        }
    }

    /// Disconnects `host` if it is the attached view.
    pub fn detach_from_view(&self, host: &Arc<dyn HostView>) -> BinderResult<bool> {
        let mut state = self.inner.lock()?;
        let attached = state
            .host
            .as_ref()
            .is_some_and(|current| same_host(current, host));
        if attached {
            state.host = None;
        } else {
            log::debug!("detach ignored: host is not attached");
        }
        Ok(attached)
    }

    /// Drops every holder and layout and stops the workers. Later calls
    /// fail with [`BinderError::Released`]. Idempotent.
    pub fn release(&self) {
        let inner = &self.inner;
        let released = {
            let mut state = inner.state();
            if state.released {
                return;
            }
            state.released = true;
            state.host = None;
            state.remeasure = None;
            state.range = None;
            state.estimate = None;
            state.tracker.reset();
            state.registry.clear()
        };

        inner.jobs.clear();
        let workers = inner
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(workers) = workers {
            workers.shutdown();
        }
        let dropped = inner.completions.try_iter().count();
        log::debug!(
            "released scheduler: {} holders, {} undelivered results",
            released.len(),
            dropped
        );
    }

    pub fn is_released(&self) -> bool {
        self.inner.state().released
    }

    /// Installed layout at `position`, if any.
    pub fn item_at(&self, position: usize) -> BinderResult<Option<MaterializedLayout>> {
        let state = self.inner.lock()?;
        Ok(state.registry.holder(position)?.layout().cloned())
    }

    pub fn item_count(&self) -> usize {
        self.inner.state().registry.len()
    }

    pub fn phase(&self) -> Phase {
        self.inner.state().phase
    }

    pub fn working_range(&self) -> Option<WorkingRange> {
        self.inner.state().range
    }

    pub fn estimate(&self) -> Option<RangeEstimate> {
        self.inner.state().estimate
    }

    pub fn visible_range(&self) -> Option<VisibleRange> {
        self.inner.state().tracker.current()
    }

    /// Positions that currently hold a layout, in order.
    pub fn materialized_positions(&self) -> Vec<usize> {
        self.inner
            .state()
            .registry
            .iter()
            .enumerate()
            .filter(|(_, holder)| holder.has_layout())
            .map(|(position, _)| position)
            .collect()
    }

    pub fn is_materialized(&self, position: usize) -> bool {
        self.inner
            .state()
            .registry
            .get(position)
            .is_some_and(|holder| holder.has_layout())
    }

    pub fn stats(&self) -> BinderStats {
        self.inner.state().stats.clone()
    }

    pub fn job_stats(&self) -> SchedulerStats {
        self.inner.jobs.stats()
    }

    /// Jobs queued and not yet picked up.
    pub fn pending_jobs(&self) -> usize {
        self.inner.jobs.pending_jobs()
    }

    /// Best-effort stream of failed materializations. Reports are dropped
    /// while the stream is full.
    pub fn failures(&self) -> Receiver<MaterializationFailure> {
        self.inner.failures_rx.clone()
    }

    pub fn scroll_axis(&self) -> Axis {
        self.inner.scroll_axis
    }

    pub fn layout_info(&self) -> LayoutInfo {
        self.inner.layout_info
    }

    pub fn config(&self) -> &BinderConfig {
        &self.inner.config
    }
}

impl fmt::Debug for WindowScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state();
        f.debug_struct("WindowScheduler")
            .field("phase", &state.phase)
            .field("items", &state.registry.len())
            .field("range", &state.range)
            .field("visible", &state.tracker.current())
            .field("released", &state.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rangebinder_core::{FixedSizeComputer, SizeSpec};

    fn scheduler(ratio: f32) -> WindowScheduler {
        WindowScheduler::builder()
            .layout_computer(Arc::new(FixedSizeComputer::new(100, 20)))
            .config(
                BinderConfig::new()
                    .with_worker_threads(0)
                    .with_range_ratio(ratio),
            )
            .build()
            .unwrap()
    }

    fn established(len: usize, ratio: f32) -> WindowScheduler {
        let scheduler = scheduler(ratio);
        scheduler.measure(Constraints::exact(100, 100), None).unwrap();
        scheduler
            .insert_range_at(0, (0..len).map(Item::new).collect())
            .unwrap();
        scheduler.on_container_size_known(100, 100).unwrap();
        scheduler
    }

    #[test]
    fn test_builder_requires_computer() {
        let error = WindowScheduler::builder().build().unwrap_err();
        assert!(matches!(error, BinderError::MissingCollaborator("layout computer")));
    }

    #[test]
    fn test_builder_rejects_bad_config() {
        let error = WindowScheduler::builder()
            .layout_computer(Arc::new(FixedSizeComputer::new(1, 1)))
            .config(BinderConfig::new().with_range_ratio(0.0))
            .build()
            .unwrap_err();
        assert!(matches!(error, BinderError::InvalidConfig(_)));

        let error = WindowScheduler::builder()
            .layout_computer(Arc::new(FixedSizeComputer::new(1, 1)))
            .layout_info(LayoutInfo::Grid { span_count: 0 })
            .build()
            .unwrap_err();
        assert!(matches!(error, BinderError::InvalidConfig(_)));
    }

    #[test]
    fn test_phases() {
        let scheduler = scheduler(1.0);
        assert_eq!(scheduler.phase(), Phase::Unmeasured);

        // No-op before the range exists
        scheduler.compute_range(0, 3).unwrap();
        assert_eq!(scheduler.stats().range_computations, 0);

        scheduler.measure(Constraints::exact(100, 100), None).unwrap();
        assert_eq!(scheduler.phase(), Phase::Measured);

        // Viewport known but nothing to measure yet
        scheduler.on_container_size_known(100, 100).unwrap();
        assert_eq!(scheduler.phase(), Phase::Measured);

        scheduler.insert_at(0, Item::new(0)).unwrap();
        assert_eq!(scheduler.phase(), Phase::RangeEstablished);
        assert_eq!(scheduler.estimate().unwrap().estimated_viewport_count, 5);
    }

    #[test]
    fn test_resolve_size_vertical() {
        let scheduler = scheduler(1.0);
        let size = scheduler
            .measure(
                Constraints::new(SizeSpec::at_most(300), SizeSpec::exactly(500)),
                None,
            )
            .unwrap();
        assert_eq!(size, Size::new(300, 500));
    }

    #[test]
    fn test_stale_pass_aborts() {
        let scheduler = established(40, 1.0);
        let inner = &scheduler.inner;

        let (version, len) = {
            let state = inner.state();
            (state.registry.version(), state.registry.len())
        };
        scheduler.insert_at(0, Item::new("late")).unwrap();
        let before = scheduler.stats();

        let visible = VisibleRange::new(20, 22);
        let range = WorkingRange::around(visible, 5, 1.0, len).unwrap();
        let mut cancelled = Vec::new();
        inner
            .reconcile(version, len, range, visible, &mut cancelled)
            .unwrap();

        let after = scheduler.stats();
        assert_eq!(after.aborted_passes, before.aborted_passes + 1);
        assert_eq!(after.jobs_scheduled, before.jobs_scheduled);
        assert_eq!(after.evictions, before.evictions);
        assert!(cancelled.is_empty());
    }

    #[test]
    fn test_scratch_vectors_are_reused() {
        let scheduler = established(40, 1.0);
        scheduler.compute_range(20, 22).unwrap();
        assert!(scheduler.inner.state().scratch.pooled() > 0);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "panicked: boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "panicked: bang");

        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "panicked");
    }
}
