//! Ordered registry of item holders
//!
//! The registry is the single source of truth for positions. Every
//! structural mutation shifts the holders at and after the mutation point and
//! bumps a monotonic version counter, so a reader that captured the version
//! can tell whether positions it computed are still meaningful.

use crate::error::{check_index, check_span, BinderError, BinderResult};
use crate::holder::{ItemHolder, PendingMaterialization};
use crate::item::{Item, ItemId};

/// Ordered, index-addressable sequence of [`ItemHolder`]s
#[derive(Debug, Default)]
pub struct ItemRegistry {
    holders: Vec<ItemHolder>,
    version: u64,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    /// Shape version; changes on every insert, remove, move and clear.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, position: usize) -> Option<&ItemHolder> {
        self.holders.get(position)
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut ItemHolder> {
        self.holders.get_mut(position)
    }

    /// Like [`get`](Self::get) but out-of-range positions are an error.
    pub fn holder(&self, position: usize) -> BinderResult<&ItemHolder> {
        self.holders.get(position).ok_or(BinderError::IndexOutOfRange {
            index: position,
            len: self.holders.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemHolder> {
        self.holders.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ItemHolder> {
        self.holders.iter_mut()
    }

    /// Current position of the holder whose item is `item_id`.
    ///
    /// `hint` is checked first; positions drift only by the net effect of
    /// mutations since the hint was taken.
    pub fn position_of(&self, item_id: ItemId, hint: Option<usize>) -> Option<usize> {
        if let Some(hint) = hint {
            if self.holders.get(hint).is_some_and(|h| h.item_id() == item_id) {
                return Some(hint);
            }
        }
        self.holders.iter().position(|h| h.item_id() == item_id)
    }

    pub fn insert_at(&mut self, position: usize, item: Item) -> BinderResult<()> {
        check_span(position, 0, self.holders.len())?;
        self.holders.insert(position, ItemHolder::new(item));
        self.bump();
        Ok(())
    }

    pub fn insert_range_at(&mut self, position: usize, items: Vec<Item>) -> BinderResult<()> {
        check_span(position, 0, self.holders.len())?;
        if items.is_empty() {
            return Ok(());
        }
        self.holders
            .splice(position..position, items.into_iter().map(ItemHolder::new));
        self.bump();
        Ok(())
    }

    pub fn remove_at(&mut self, position: usize) -> BinderResult<ItemHolder> {
        check_index(position, self.holders.len())?;
        let holder = self.holders.remove(position);
        self.bump();
        Ok(holder)
    }

    pub fn remove_range_at(&mut self, position: usize, count: usize) -> BinderResult<Vec<ItemHolder>> {
        check_span(position, count, self.holders.len())?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let removed: Vec<ItemHolder> = self.holders.drain(position..position + count).collect();
        self.bump();
        Ok(removed)
    }

    /// Moves the holder at `from` so that it ends up at `to`.
    pub fn move_item(&mut self, from: usize, to: usize) -> BinderResult<()> {
        let len = self.holders.len();
        check_index(from, len)?;
        check_index(to, len)?;
        if from == to {
            return Ok(());
        }
        let holder = self.holders.remove(from);
        self.holders.insert(to, holder);
        self.bump();
        Ok(())
    }

    /// Replaces the item at `position`, returning the job to cancel.
    pub fn update_at(&mut self, position: usize, item: Item) -> BinderResult<Option<PendingMaterialization>> {
        let len = self.holders.len();
        let holder = self
            .holders
            .get_mut(position)
            .ok_or(BinderError::IndexOutOfRange { index: position, len })?;
        Ok(holder.set_item(item))
    }

    /// Replaces `items.len()` items starting at `position`.
    pub fn update_range_at(
        &mut self,
        position: usize,
        items: Vec<Item>,
    ) -> BinderResult<Vec<PendingMaterialization>> {
        check_span(position, items.len(), self.holders.len())?;
        let cancelled = self.holders[position..position + items.len()]
            .iter_mut()
            .zip(items)
            .filter_map(|(holder, item)| holder.set_item(item))
            .collect();
        Ok(cancelled)
    }

    /// Removes every holder.
    pub fn clear(&mut self) -> Vec<ItemHolder> {
        let removed = std::mem::take(&mut self.holders);
        log::debug!("cleared registry ({} holders)", removed.len());
        self.bump();
        removed
    }

    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}
