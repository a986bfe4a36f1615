//! Job scheduler
//!
//! Couples the priority queue with the cancellation registry and wakes idle
//! workers when work arrives.

use crate::cancel::{CancellationRegistry, CancellationToken};
use crate::priority::{JobPriority, JobRequest, MaterializeJob, PriorityQueue};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use rangebinder_core::JobId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Job scheduler statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub jobs_submitted: u64,
    pub jobs_completed: u64,

    /// Jobs removed from the queue before a worker picked them up
    pub jobs_cancelled: u64,

    pub queue_size: usize,
}

impl SchedulerStats {
    /// Jobs submitted but neither completed nor dequeued by cancellation.
    pub fn pending_jobs(&self) -> u64 {
        self.jobs_submitted
            .saturating_sub(self.jobs_completed)
            .saturating_sub(self.jobs_cancelled)
    }
}

/// Thread-safe scheduler of materialization jobs.
///
/// # Example
///
/// ```
/// use rangebinder_core::{Constraints, Item, SizeSpec};
/// use rangebinder_scheduler::{JobPriority, JobRequest, JobScheduler};
///
/// let scheduler = JobScheduler::new();
/// let (job_id, token) = scheduler.submit(
///     JobPriority::Visible,
///     JobRequest {
///         item: Item::new("row"),
///         constraints: Constraints::new(SizeSpec::exactly(320), SizeSpec::unspecified()),
///         restored: None,
///         position_hint: 0,
///     },
/// );
///
/// let job = scheduler.next_job().unwrap();
/// assert_eq!(job.id, job_id);
/// assert!(!token.is_cancelled());
/// scheduler.complete_job(job.id);
/// assert!(scheduler.is_idle());
/// ```
#[derive(Debug)]
pub struct JobScheduler {
    queue: PriorityQueue,
    cancellation: CancellationRegistry,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    submitted: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
}

impl JobScheduler {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = unbounded();
        Self {
            queue: PriorityQueue::new(),
            cancellation: CancellationRegistry::new(),
            wake_tx,
            wake_rx,
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
        }
    }

    /// Queues a job and wakes one idle worker.
    pub fn submit(&self, priority: JobPriority, request: JobRequest) -> (JobId, CancellationToken) {
        // Counted and registered before any worker can pop it
        self.submitted.fetch_add(1, Ordering::Relaxed);
        let (job_id, token) = self
            .queue
            .push_with(priority, request, |job_id| self.cancellation.register(job_id));
        // Receiver lives in self
        let _ = self.wake_tx.send(());
        (job_id, token)
    }

    /// Takes the highest priority job. Its token stays registered until
    /// [`complete_job`](Self::complete_job).
    pub fn next_job(&self) -> Option<MaterializeJob> {
        self.queue.pop()
    }

    pub fn complete_job(&self, job_id: JobId) {
        if self.cancellation.unregister(job_id) {
            self.completed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Cancels a queued or running job.
    ///
    /// A queued job is dropped from the queue. A running job only has its
    /// token cancelled; its worker still completes it.
    pub fn cancel_job(&self, job_id: JobId) -> bool {
        self.cancel_jobs(&[job_id]) > 0
    }

    /// Cancels several jobs, returning how many were still known.
    pub fn cancel_jobs(&self, job_ids: &[JobId]) -> usize {
        if job_ids.is_empty() {
            return 0;
        }
        let found = self.cancellation.cancel_many(job_ids);
        let removed = self.queue.remove_if(|job| job_ids.contains(&job.id));
        self.forget(&removed);
        found
    }

    /// Cancels every job, queued or running.
    pub fn clear(&self) -> usize {
        let cancelled = self.cancellation.cancel_all();
        let removed = self.queue.drain();
        self.forget(&removed);
        cancelled
    }

    fn forget(&self, removed: &[JobId]) {
        for job_id in removed {
            self.cancellation.unregister(*job_id);
        }
        self.cancelled
            .fetch_add(removed.len() as u64, Ordering::Relaxed);
    }

    pub fn get_cancellation_token(&self, job_id: JobId) -> Option<CancellationToken> {
        self.cancellation.get(job_id)
    }

    pub fn pending_jobs(&self) -> usize {
        self.queue.len()
    }

    /// Whether no job is queued or running.
    pub fn is_idle(&self) -> bool {
        self.cancellation.is_empty()
    }

    /// Blocks until work may be available or `timeout` elapses.
    ///
    /// Returns `false` on timeout.
    pub fn wait_for_work(&self, timeout: Duration) -> bool {
        match self.wake_rx.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Wakes up to `count` waiting workers.
    pub fn wake(&self, count: usize) {
        for _ in 0..count {
            let _ = self.wake_tx.send(());
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            jobs_submitted: self.submitted.load(Ordering::Relaxed),
            jobs_completed: self.completed.load(Ordering::Relaxed),
            jobs_cancelled: self.cancelled.load(Ordering::Relaxed),
            queue_size: self.queue.len(),
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}
