//! A set that tracks how many times each item was inserted.
//!
//! Plain sets lose multiplicity: when module A imports module B through two
//! distinct specifiers and one of them is removed, B must still know that A
//! depends on it. `CountingSet` only forgets an item once it has been removed
//! as many times as it was added.

use std::hash::Hash;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A multiset with set-like iteration.
///
/// Iteration and `len` are in terms of *unique* items, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountingSet<T: Hash + Eq> {
    counts: IndexMap<T, usize>,
}

impl<T: Hash + Eq> CountingSet<T> {
    pub fn new() -> Self {
        Self {
            counts: IndexMap::new(),
        }
    }

    /// Number of unique items.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn contains<Q>(&self, item: &Q) -> bool
    where
        T: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.counts.contains_key(item)
    }

    /// How many times `item` has been added, net of removals.
    pub fn count<Q>(&self, item: &Q) -> usize
    where
        T: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.counts.get(item).copied().unwrap_or(0)
    }

    pub fn add(&mut self, item: T) {
        *self.counts.entry(item).or_insert(0) += 1;
    }

    /// Decrement the count for `item`, dropping it when the count reaches
    /// zero. Removing an absent item is a no-op.
    pub fn remove<Q>(&mut self, item: &Q)
    where
        T: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if let Some(count) = self.counts.get_mut(item) {
            if *count <= 1 {
                self.counts.shift_remove(item);
            } else {
                *count -= 1;
            }
        }
    }

    /// Iterate over unique items in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.counts.keys()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

impl<T: Hash + Eq> FromIterator<T> for CountingSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for item in iter {
            set.add(item);
        }
        set
    }
}

impl<'a, T: Hash + Eq> IntoIterator for &'a CountingSet<T> {
    type Item = &'a T;
    type IntoIter = indexmap::map::Keys<'a, T, usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.counts.keys()
    }
}
