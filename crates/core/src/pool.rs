//! Free list of scratch vectors grouped by capacity class
//!
//! Range reconciliation needs a few short-lived index lists per pass. The
//! pool hands out cleared vectors whose capacity is at least the requested
//! size, bucketed by the next power of two.

use std::collections::HashMap;

/// Maximum number of vectors retained per capacity class
pub const DEFAULT_VECTORS_PER_CLASS: usize = 4;

#[derive(Debug)]
pub struct VecPool<T> {
    classes: HashMap<u32, Vec<Vec<T>>>,
    max_per_class: usize,
}

impl<T> Default for VecPool<T> {
    fn default() -> Self {
        Self::new(DEFAULT_VECTORS_PER_CLASS)
    }
}

impl<T> VecPool<T> {
    pub fn new(max_per_class: usize) -> Self {
        Self {
            classes: HashMap::new(),
            max_per_class,
        }
    }

    fn class_of(capacity: usize) -> u32 {
        capacity.max(1).next_power_of_two().trailing_zeros()
    }

    /// Takes an empty vector with room for at least `capacity` elements.
    pub fn acquire(&mut self, capacity: usize) -> Vec<T> {
        let class = Self::class_of(capacity);
        self.classes
            .get_mut(&class)
            .and_then(Vec::pop)
            .unwrap_or_else(|| Vec::with_capacity(1usize << class))
    }

    /// Returns a vector to the pool. Vectors beyond the per-class limit are
    /// dropped.
    pub fn release(&mut self, mut vec: Vec<T>) {
        vec.clear();
        if vec.capacity() == 0 {
            return;
        }
        // Round down so an acquired vector always fits its class
        let class = usize::BITS - 1 - vec.capacity().leading_zeros();
        let bucket = self.classes.entry(class).or_default();
        if bucket.len() < self.max_per_class {
            bucket.push(vec);
        }
    }

    /// Number of pooled vectors across all classes
    pub fn pooled(&self) -> usize {
        self.classes.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.classes.clear();
    }
}
