//! Item descriptors
//!
//! An [`Item`] is the caller-supplied description of one list entry: opaque
//! content plus the sizing hints the binder needs. Items are immutable; an
//! update replaces the whole descriptor, which gives it a fresh [`ItemId`].

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identity of one submitted item descriptor
pub type ItemId = u64;

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

/// Per-item sizing and pinning hints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemAttributes {
    /// Sticky items keep their materialized layout outside the working range
    pub sticky: bool,

    /// Number of grid spans the item occupies
    pub span_size: u32,

    /// Item occupies the full cross axis regardless of span count
    pub full_span: bool,

    /// Optional caller-defined content type, passed through to the computer
    pub content_type: Option<u64>,
}

impl Default for ItemAttributes {
    fn default() -> Self {
        Self {
            sticky: false,
            span_size: 1,
            full_span: false,
            content_type: None,
        }
    }
}

impl ItemAttributes {
    pub fn sticky() -> Self {
        Self {
            sticky: true,
            ..Self::default()
        }
    }

    pub fn with_span_size(mut self, span_size: u32) -> Self {
        self.span_size = span_size;
        self
    }

    pub fn with_full_span(mut self, full_span: bool) -> Self {
        self.full_span = full_span;
        self
    }

    pub fn with_content_type(mut self, content_type: u64) -> Self {
        self.content_type = Some(content_type);
        self
    }
}

/// Immutable item descriptor
///
/// Cloning is cheap: content is shared.
///
/// # Example
///
/// ```
/// use rangebinder_core::{Item, ItemAttributes};
///
/// let header = Item::new("Section A").with_attributes(ItemAttributes::sticky());
/// assert!(header.is_sticky());
/// assert_eq!(header.content::<&str>(), Some(&"Section A"));
/// ```
#[derive(Clone)]
pub struct Item {
    id: ItemId,
    content: Arc<dyn Any + Send + Sync>,
    attributes: ItemAttributes,
}

impl Item {
    /// Creates a descriptor with default attributes.
    pub fn new<C>(content: C) -> Self
    where
        C: Any + Send + Sync,
    {
        Self {
            id: NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed),
            content: Arc::new(content),
            attributes: ItemAttributes::default(),
        }
    }

    /// Returns the descriptor with `attributes`, as a new item identity.
    pub fn with_attributes(self, attributes: ItemAttributes) -> Self {
        Self {
            id: NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed),
            content: self.content,
            attributes,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn attributes(&self) -> &ItemAttributes {
        &self.attributes
    }

    pub fn is_sticky(&self) -> bool {
        self.attributes.sticky
    }

    /// Borrows the content if it has type `C`.
    pub fn content<C: Any>(&self) -> Option<&C> {
        self.content.downcast_ref::<C>()
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("id", &self.id)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_ids_are_unique() {
        let a = Item::new(1u32);
        let b = Item::new(1u32);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_clone_keeps_identity() {
        let a = Item::new("text");
        let b = a.clone();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_with_attributes_is_new_identity() {
        let a = Item::new(5u8);
        let id = a.id();
        let b = a.with_attributes(ItemAttributes::sticky());
        assert_ne!(b.id(), id);
        assert!(b.is_sticky());
        assert_eq!(b.content::<u8>(), Some(&5));
    }

    #[test]
    fn test_content_downcast_mismatch() {
        let item = Item::new(String::from("row"));
        assert!(item.content::<u32>().is_none());
        assert_eq!(item.content::<String>().map(String::as_str), Some("row"));
    }

    #[test]
    fn test_default_attributes() {
        let attrs = ItemAttributes::default();
        assert!(!attrs.sticky);
        assert_eq!(attrs.span_size, 1);
        assert!(!attrs.full_span);
        assert_eq!(attrs.content_type, None);

        let attrs = attrs.with_span_size(2).with_full_span(true).with_content_type(7);
        assert_eq!(attrs.span_size, 2);
        assert!(attrs.full_span);
        assert_eq!(attrs.content_type, Some(7));
    }
}
