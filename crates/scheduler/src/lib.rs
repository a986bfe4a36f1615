//! Range-windowed materialization scheduler
//!
//! Keeps the items around a scrolling container's visible window laid out
//! ahead of time. The scheduler estimates how many items fill a viewport
//! from the first materialized item, keeps a working range of
//! `range_ratio` viewports on each side of the visible window materialized
//! on background workers, and evicts everything else that is not sticky.
//!
//! Jobs are ordered by priority (visible positions before the rest of the
//! range) with FIFO ordering within each priority level, and every job
//! carries a [`CancellationToken`] so work for positions that scrolled
//! away is dropped before it starts.
//!
//! # Example
//!
//! ```
//! use rangebinder_core::{BinderConfig, Constraints, FixedSizeComputer, Item};
//! use rangebinder_scheduler::WindowScheduler;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let scheduler = WindowScheduler::builder()
//!     .layout_computer(Arc::new(FixedSizeComputer::new(320, 40)))
//!     .config(BinderConfig::new().with_worker_threads(2))
//!     .build()
//!     .unwrap();
//!
//! scheduler.measure(Constraints::exact(320, 480), None).unwrap();
//! scheduler.insert_range_at(0, (0..1_000).map(Item::new).collect()).unwrap();
//! scheduler.on_container_size_known(320, 480).unwrap();
//!
//! // Host reports the visible window; background workers fill the range
//! scheduler.on_scroll(200, 211).unwrap();
//! assert!(scheduler.wait_idle(Duration::from_secs(5)).unwrap());
//! assert!(scheduler.is_materialized(205));
//! assert!(!scheduler.is_materialized(900));
//!
//! scheduler.release();
//! ```

mod binder;
mod cancel;
mod changeset;
mod host;
mod listener;
mod priority;
mod range;
mod scheduler;
mod viewport;
mod worker;

pub use binder::{
    BinderStats, MaterializationFailure, Phase, RemeasureCallback, WindowScheduler,
    WindowSchedulerBuilder,
};
pub use cancel::{CancellationRegistry, CancellationToken};
pub use changeset::{ChangeOp, Changeset, ChangesetOutcome};
pub use host::HostView;
pub use listener::{ChangeListener, StructuralChange};
pub use priority::{JobPriority, JobRequest, MaterializeJob, PriorityQueue};
pub use range::WorkingRange;
pub use scheduler::{JobScheduler, SchedulerStats};
pub use viewport::{ViewportTracker, VisibleRange};
pub use worker::{run_job, JobExecutor, WorkerPool, WorkerPoolConfig};

pub use rangebinder_core::{BinderError, BinderResult, JobId};
