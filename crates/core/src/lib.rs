//! Range Binder Core Library
//!
//! Item model, holders and registry for a virtualized list materialization
//! engine.
//!
//! The core crate knows nothing about threads. It owns the data that the
//! scheduler coordinates: the ordered [`ItemRegistry`] of [`ItemHolder`]s,
//! the [`LayoutComputer`] contract with memoized materialization, the
//! [`RangeEstimator`] that sizes the working range, and the layout-info
//! strategies that derive per-item constraints.
//!
//! # Example
//!
//! ```
//! use rangebinder_core::{Constraints, FixedSizeComputer, Item, ItemRegistry, SizeSpec};
//!
//! let mut registry = ItemRegistry::new();
//! registry.insert_range_at(0, (0..3).map(Item::new).collect()).unwrap();
//!
//! let computer = FixedSizeComputer::new(320, 48);
//! let constraints = Constraints::new(SizeSpec::exactly(320), SizeSpec::unspecified());
//!
//! let holder = registry.get_mut(1).unwrap();
//! holder.materialize_with(&computer, &constraints).unwrap();
//! assert_eq!(holder.layout().unwrap().size().height, 48);
//! ```

pub mod config;
pub mod error;
pub mod estimate;
pub mod geometry;
pub mod holder;
pub mod item;
pub mod layout;
pub mod layout_info;
pub mod pool;
pub mod registry;

pub use config::{BinderConfig, ConfigError};
pub use error::{check_index, check_span, BinderError, BinderResult};
pub use estimate::{RangeEstimate, RangeEstimator, MAX_ESTIMATED_COUNT, MIN_ESTIMATED_COUNT};
pub use geometry::{Axis, Constraints, Size, SizeMode, SizeSpec};
pub use holder::{ItemHolder, JobId, MaterializeOutcome, PendingMaterialization};
pub use item::{Item, ItemAttributes, ItemId};
pub use layout::{
    materialize, validate_child_constraints, ComputedLayout, FixedSizeComputer, LayoutComputer,
    MaterializedLayout, RenderTree, SavedState,
};
pub use layout_info::LayoutInfo;
pub use pool::VecPool;
pub use registry::ItemRegistry;
