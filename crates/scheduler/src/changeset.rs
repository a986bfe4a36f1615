//! Batched structural changes
//!
//! A [`Changeset`] is the patch a diffing data source hands to the
//! scheduler. It is checked against the registry size before anything is
//! applied; a batch that would leave the registry out of step with the data
//! source is replaced by a full reload.

use rangebinder_core::{check_index, check_span, BinderResult, Item};
use smallvec::SmallVec;

/// One operation of a changeset.
#[derive(Debug, Clone)]
pub enum ChangeOp {
    Insert { position: usize, items: Vec<Item> },
    Remove { position: usize, count: usize },
    Move { from: usize, to: usize },
    Update { position: usize, items: Vec<Item> },
}

/// What [`WindowScheduler::apply_changeset`](crate::WindowScheduler::apply_changeset)
/// ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangesetOutcome {
    /// Every operation was applied in order.
    Applied { operations: usize },

    /// The batch did not match the data source and the list was reloaded.
    Reloaded,
}

/// Ordered batch of structural operations.
///
/// ```
/// use rangebinder_core::Item;
/// use rangebinder_scheduler::Changeset;
///
/// let changeset = Changeset::new()
///     .insert(0, Item::new("new head"))
///     .remove(5, 2)
///     .move_item(1, 3);
///
/// assert_eq!(changeset.len(), 3);
/// assert_eq!(changeset.final_len(10).unwrap(), 9);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    ops: SmallVec<[ChangeOp; 4]>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(self, position: usize, item: Item) -> Self {
        self.insert_range(position, vec![item])
    }

    pub fn insert_range(self, position: usize, items: Vec<Item>) -> Self {
        self.push(ChangeOp::Insert { position, items })
    }

    pub fn remove(self, position: usize, count: usize) -> Self {
        self.push(ChangeOp::Remove { position, count })
    }

    pub fn move_item(self, from: usize, to: usize) -> Self {
        self.push(ChangeOp::Move { from, to })
    }

    pub fn update(self, position: usize, item: Item) -> Self {
        self.update_range(position, vec![item])
    }

    pub fn update_range(self, position: usize, items: Vec<Item>) -> Self {
        self.push(ChangeOp::Update { position, items })
    }

    pub fn push(mut self, op: ChangeOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[ChangeOp] {
        &self.ops
    }

    pub fn into_ops(self) -> impl Iterator<Item = ChangeOp> {
        self.ops.into_iter()
    }

    /// Registry size after applying the batch to `start_len` items.
    ///
    /// Fails with `IndexOutOfRange` at the first operation that would be out
    /// of bounds at its point in the batch.
    pub fn final_len(&self, start_len: usize) -> BinderResult<usize> {
        self.ops.iter().try_fold(start_len, |len, op| match op {
            ChangeOp::Insert { position, items } => {
                check_span(*position, 0, len)?;
                Ok(len + items.len())
            }
            ChangeOp::Remove { position, count } => {
                check_span(*position, *count, len)?;
                Ok(len - count)
            }
            ChangeOp::Move { from, to } => {
                check_index(*from, len)?;
                check_index(*to, len)?;
                Ok(len)
            }
            ChangeOp::Update { position, items } => {
                check_span(*position, items.len(), len)?;
                Ok(len)
            }
        })
    }
}
