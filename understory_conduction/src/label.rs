// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Label memoization for the current selection.

use alloc::vec::Vec;
use core::hash::Hash;

use hashbrown::HashMap;

/// A selected identifier with an optional display label.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LabeledValue<K, L> {
    /// The selected identifier.
    pub value: K,
    /// The display label, if the caller knows it.
    pub label: Option<L>,
}

impl<K, L> LabeledValue<K, L> {
    /// Creates a value with the given label.
    #[must_use]
    pub const fn labeled(value: K, label: L) -> Self {
        Self {
            value,
            label: Some(label),
        }
    }

    /// Creates a value without a label.
    #[must_use]
    pub const fn unlabeled(value: K) -> Self {
        Self { value, label: None }
    }
}

impl<K, L> From<(K, Option<L>)> for LabeledValue<K, L> {
    fn from((value, label): (K, Option<L>)) -> Self {
        Self { value, label }
    }
}

/// Last known labels of the selected values.
///
/// Selections often arrive without labels, for example when a value was set
/// programmatically or its tree node has not been loaded yet. The cache fills
/// those gaps with the label seen in the previous cycle.
///
/// The cache only ever holds the labels of the most recent selection; values
/// that were deselected are forgotten on the next cycle.
///
/// # Example
///
/// ```
/// use understory_conduction::{LabelCache, LabeledValue};
///
/// let cache = LabelCache::<u32, &str>::new();
/// let (_, cache) = cache.memoize([LabeledValue::labeled(1, "One")]);
///
/// // The label is not supplied this time but is remembered.
/// let (filled, cache) = cache.memoize([LabeledValue::unlabeled(1), LabeledValue::unlabeled(2)]);
/// assert_eq!(filled[0].label, Some("One"));
/// assert_eq!(filled[1].label, None);
/// assert_eq!(cache.len(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelCache<K, L>
where
    K: Eq + Hash,
{
    labels: HashMap<K, L>,
}

impl<K, L> Default for LabelCache<K, L>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, L> LabelCache<K, L>
where
    K: Eq + Hash,
{
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            labels: HashMap::new(),
        }
    }

    /// Returns the number of cached labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` if no label is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns the cached label of `value`, if any.
    #[must_use]
    pub fn get(&self, value: &K) -> Option<&L> {
        self.labels.get(value)
    }
}

impl<K, L> LabelCache<K, L>
where
    K: Clone + Eq + Hash,
    L: Clone,
{
    /// Fills missing labels of `selection` from this cache.
    ///
    /// Returns the filled selection, in input order, and the cache to use for
    /// the next cycle. A supplied label always wins over a cached one. The new
    /// cache holds exactly the values of `selection` that ended up with a label.
    ///
    /// Calling this again with the same selection and the returned cache gives
    /// the same filled selection and an equal cache.
    #[must_use]
    pub fn memoize<I>(&self, selection: I) -> (Vec<LabeledValue<K, L>>, Self)
    where
        I: IntoIterator,
        I::Item: Into<LabeledValue<K, L>>,
    {
        let mut next = Self::new();
        let filled = selection
            .into_iter()
            .map(|item| {
                let LabeledValue { value, label } = item.into();
                let label = label.or_else(|| self.labels.get(&value).cloned());
                if let Some(label) = &label {
                    next.labels.insert(value.clone(), label.clone());
                }
                LabeledValue { value, label }
            })
            .collect();
        (filled, next)
    }

    /// Like [`memoize`](Self::memoize), but replaces `self` with the new cache.
    pub fn update<I>(&mut self, selection: I) -> Vec<LabeledValue<K, L>>
    where
        I: IntoIterator,
        I::Item: Into<LabeledValue<K, L>>,
    {
        let (filled, next) = self.memoize(selection);
        *self = next;
        filled
    }
}
