//! Materialization worker pool
//!
//! Workers pull jobs from the [`JobScheduler`], skip the ones cancelled
//! while queued, and hand the rest to a [`JobExecutor`]. Idle workers block
//! on the scheduler's wake channel instead of spinning.

use crate::{CancellationToken, JobScheduler, MaterializeJob};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Callback that executes one job.
///
/// It receives the job and its cancellation token and should return early
/// once the token is cancelled.
pub type JobExecutor = Arc<dyn Fn(&MaterializeJob, &CancellationToken) + Send + Sync>;

/// Configuration for the worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    pub num_workers: usize,

    /// Longest time an idle worker waits before re-checking for shutdown.
    pub poll_interval: Duration,
}

impl WorkerPoolConfig {
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            poll_interval: Duration::from_millis(50),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Runs `job` on the calling thread and marks it complete.
///
/// Jobs cancelled before they start are skipped. A panicking executor is
/// contained here so neither a worker nor the coordination thread unwinds.
pub fn run_job(scheduler: &JobScheduler, executor: &JobExecutor, job: MaterializeJob) {
    let job_id = job.id;
    let token = scheduler.get_cancellation_token(job_id).unwrap_or_default();

    if token.is_cancelled() {
        log::trace!("skipping cancelled job {}", job_id);
    } else if panic::catch_unwind(AssertUnwindSafe(|| executor(&job, &token))).is_err() {
        log::error!("executor panicked while running job {}", job_id);
    }

    scheduler.complete_job(job_id);
}

/// Pool of background materialization threads.
///
/// # Example
///
/// ```
/// use rangebinder_scheduler::{JobExecutor, JobScheduler, WorkerPool, WorkerPoolConfig};
/// use std::sync::Arc;
///
/// let scheduler = Arc::new(JobScheduler::new());
/// let executor: JobExecutor = Arc::new(|job, token| {
///     if token.is_cancelled() {
///         return;
///     }
///     println!("materializing item {}", job.item_id());
/// });
///
/// let pool = WorkerPool::new(scheduler.clone(), executor, WorkerPoolConfig::new(2)).unwrap();
/// assert_eq!(pool.num_workers(), 2);
/// pool.shutdown();
/// ```
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    scheduler: Arc<JobScheduler>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawns `config.num_workers` threads.
    ///
    /// If a thread cannot be spawned the ones already started are shut down
    /// and the error is returned.
    pub fn new(
        scheduler: Arc<JobScheduler>,
        executor: JobExecutor,
        config: WorkerPoolConfig,
    ) -> io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut pool = Self {
            workers: Vec::with_capacity(config.num_workers),
            scheduler: scheduler.clone(),
            shutdown: shutdown.clone(),
        };

        for id in 0..config.num_workers {
            let scheduler = scheduler.clone();
            let executor = executor.clone();
            let shutdown = shutdown.clone();
            let poll_interval = config.poll_interval;

            let handle = thread::Builder::new()
                .name(format!("rangebinder-worker-{}", id))
                .spawn(move || worker_loop(&scheduler, &executor, &shutdown, poll_interval))?;
            pool.workers.push(handle);
        }

        log::debug!("started {} materialization workers", pool.workers.len());
        Ok(pool)
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Signals every worker to stop and waits for them to finish their
    /// current job.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.shutdown.store(true, Ordering::Release);
        self.scheduler.wake(self.workers.len());

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("materialization worker panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(
    scheduler: &JobScheduler,
    executor: &JobExecutor,
    shutdown: &AtomicBool,
    poll_interval: Duration,
) {
    while !shutdown.load(Ordering::Acquire) {
        match scheduler.next_job() {
            Some(job) => run_job(scheduler, executor, job),
            None => {
                scheduler.wait_for_work(poll_interval);
            }
        }
    }
}
