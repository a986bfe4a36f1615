//! Prioritized materialization job queue
//!
//! Jobs for visible positions run before jobs for the rest of the working
//! range. Within a priority level jobs run in submission order.

use rangebinder_core::{Constraints, Item, ItemId, JobId, SavedState};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Job priority levels. Higher values run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobPriority {
    /// In the working range but off screen
    Range = 0,

    /// Currently on screen
    Visible = 1,
}

/// Everything a worker needs to materialize one item.
///
/// The job carries its own copy of the item and constraints so the worker
/// never touches the registry.
#[derive(Clone)]
pub struct MaterializeJob {
    pub id: JobId,
    pub priority: JobPriority,
    pub item: Item,
    pub constraints: Constraints,

    /// State captured when the item's previous layout was evicted
    pub restored: Option<SavedState>,

    /// Registry position at submission time
    pub position_hint: usize,

    insertion_order: u64,
}

impl MaterializeJob {
    pub fn item_id(&self) -> ItemId {
        self.item.id()
    }
}

impl fmt::Debug for MaterializeJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterializeJob")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("item_id", &self.item.id())
            .field("constraints", &self.constraints)
            .field("position_hint", &self.position_hint)
            .finish()
    }
}

impl PartialEq for MaterializeJob {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MaterializeJob {}

impl PartialOrd for MaterializeJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MaterializeJob {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.priority.cmp(&other.priority) {
            // BinaryHeap is a max heap: earlier insertion must compare greater
            Ordering::Equal => other.insertion_order.cmp(&self.insertion_order),
            other => other,
        }
    }
}

/// Parameters of a job that has not been given an id yet.
#[derive(Clone)]
pub struct JobRequest {
    pub item: Item,
    pub constraints: Constraints,
    pub restored: Option<SavedState>,
    pub position_hint: usize,
}

/// Thread-safe priority queue of materialization jobs.
#[derive(Debug)]
pub struct PriorityQueue {
    state: Mutex<QueueState>,
}

#[derive(Debug)]
struct QueueState {
    heap: BinaryHeap<MaterializeJob>,
    next_job_id: JobId,
    insertion_counter: u64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                next_job_id: 1,
                insertion_counter: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a job and returns its id.
    pub fn push(&self, priority: JobPriority, request: JobRequest) -> JobId {
        self.push_with(priority, request, |_| ()).0
    }

    /// Queues a job, calling `before_visible` with its id while the queue is
    /// still locked so no consumer can pop the job first.
    pub fn push_with<T, F>(
        &self,
        priority: JobPriority,
        request: JobRequest,
        before_visible: F,
    ) -> (JobId, T)
    where
        F: FnOnce(JobId) -> T,
    {
        let mut state = self.state();
        let id = state.next_job_id;
        state.next_job_id += 1;
        let insertion_order = state.insertion_counter;
        state.insertion_counter += 1;

        let extra = before_visible(id);
        state.heap.push(MaterializeJob {
            id,
            priority,
            item: request.item,
            constraints: request.constraints,
            restored: request.restored,
            position_hint: request.position_hint,
            insertion_order,
        });
        (id, extra)
    }

    pub fn pop(&self) -> Option<MaterializeJob> {
        self.state().heap.pop()
    }

    pub fn len(&self) -> usize {
        self.state().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().heap.is_empty()
    }

    /// Removes every queued job, returning their ids.
    pub fn drain(&self) -> Vec<JobId> {
        self.state().heap.drain().map(|job| job.id).collect()
    }

    /// Removes all jobs matching `predicate`, returning their ids.
    pub fn remove_if<F>(&self, predicate: F) -> Vec<JobId>
    where
        F: Fn(&MaterializeJob) -> bool,
    {
        let mut state = self.state();
        let (removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut state.heap).into_iter().partition(|job| predicate(job));
        state.heap = kept.into_iter().collect();
        removed.into_iter().map(|job| job.id).collect()
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}
