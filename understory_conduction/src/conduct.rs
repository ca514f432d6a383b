// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conduction: derive checked and half-checked sets from raw checked keys.
//!
//! Both entry points make two passes over a [`LevelIndex`]:
//!
//! 1. **Downward** (roots to leaves): a parent's state is pushed onto its
//!    children. Because a whole level is finished before the next one starts,
//!    a cascade started at level 0 reaches the leaves in a single sweep.
//! 2. **Upward** (leaves to roots): every parent is settled exactly once,
//!    after all of its children, from the states of those children. Results
//!    at level `L` are committed before any parent at level `L - 1` is looked at.
//!
//! No fix-point iteration is needed: completeness only flows down in the
//! first pass and aggregation only flows up in the second.

use core::hash::Hash;

use hashbrown::HashSet;

use crate::entity::{Entity, EntityRegistry};
use crate::level::{LevelIndex, TopologySnapshot};

/// The result of conduction: disjoint checked and half-checked key sets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conduction<K>
where
    K: Eq + Hash,
{
    checked: HashSet<K>,
    half_checked: HashSet<K>,
}

impl<K> Default for Conduction<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            checked: HashSet::new(),
            half_checked: HashSet::new(),
        }
    }
}

impl<K> Conduction<K>
where
    K: Eq + Hash,
{
    /// Returns the checked keys.
    #[must_use]
    pub fn checked(&self) -> &HashSet<K> {
        &self.checked
    }

    /// Returns the half-checked keys.
    #[must_use]
    pub fn half_checked(&self) -> &HashSet<K> {
        &self.half_checked
    }

    /// Returns `true` if `key` is checked.
    #[must_use]
    pub fn is_checked(&self, key: &K) -> bool {
        self.checked.contains(key)
    }

    /// Returns `true` if `key` is half-checked.
    #[must_use]
    pub fn is_half_checked(&self, key: &K) -> bool {
        self.half_checked.contains(key)
    }

    /// Splits the result into `(checked, half_checked)`.
    #[must_use]
    pub fn into_parts(self) -> (HashSet<K>, HashSet<K>) {
        (self.checked, self.half_checked)
    }
}

/// Computes the checked closure of `keys` and the resulting half-checked keys.
///
/// - Checking an entity checks all of its descendants.
/// - An entity whose children are all checked becomes checked.
/// - An entity with some checked or half-checked children, but not all
///   children checked, becomes half-checked.
/// - Leaves are never half-checked.
///
/// Keys that are not in `registry` are ignored. Callers that need to keep
/// them (see [`reconcile_checked`](crate::reconcile_checked)) must merge them
/// back in themselves.
///
/// The result depends only on the inputs, and feeding the returned checked
/// set back in yields the same result.
///
/// # Example
///
/// ```
/// use understory_conduction::{TopologySnapshot, TreeItem, conduct_check};
///
/// // a -> [b -> [d, e], c]
/// let snapshot = TopologySnapshot::from_tree(&[TreeItem::branch(
///     'a',
///     [
///         TreeItem::branch('b', [TreeItem::leaf('d'), TreeItem::leaf('e')]),
///         TreeItem::leaf('c'),
///     ],
/// )]);
///
/// let result = conduct_check(['d', 'e'], snapshot.registry(), snapshot.levels());
/// assert!(result.is_checked(&'b'));
/// assert!(result.is_half_checked(&'a'));
/// assert!(!result.is_checked(&'c'));
/// ```
pub fn conduct_check<K, I>(
    keys: I,
    registry: &EntityRegistry<K>,
    levels: &LevelIndex<K>,
) -> Conduction<K>
where
    K: Clone + Eq + Hash,
    I: IntoIterator<Item = K>,
{
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("conduct", mode = "check", depth = levels.depth()).entered();

    let mut checked = known_keys(keys, registry);

    for level in levels.top_down() {
        for key in level {
            if !checked.contains(key) {
                continue;
            }
            if let Some(entity) = registry.get(key) {
                checked.extend(entity.children().iter().cloned());
            }
        }
    }

    let mut half_checked = HashSet::new();
    let mut settled: HashSet<&K> = HashSet::new();
    for level in levels.bottom_up() {
        for key in level {
            let Some(parent) = unsettled_parent(key, registry, &mut settled) else {
                continue;
            };
            let (all_checked, partly_checked) = child_states(parent, &checked, &half_checked);
            if all_checked {
                checked.insert(parent.key().clone());
            }
            if partly_checked {
                half_checked.insert(parent.key().clone());
            }
        }
    }

    half_checked.retain(|key| !checked.contains(key));
    Conduction {
        checked,
        half_checked,
    }
}

/// Recomputes state after keys were removed from a checked set.
///
/// `keys` is the checked set with the unchecked key(s) already taken out, and
/// `half_checked_keys` is the half-checked set from the previous conduction.
///
/// - An entity that is neither checked nor half-checked unchecks its children,
///   so unchecking a parent clears its whole subtree.
/// - An entity that no longer has all of its children checked is unchecked,
///   so unchecking a child clears its ancestors.
/// - Half-checked keys are recomputed from scratch in the upward pass.
///
/// Keys that are not in `registry` are ignored.
///
/// # Example
///
/// ```
/// use understory_conduction::{TopologySnapshot, TreeItem, conduct_check, conduct_uncheck};
///
/// let snapshot = TopologySnapshot::from_tree(&[TreeItem::branch(
///     1,
///     [TreeItem::leaf(2), TreeItem::leaf(3)],
/// )]);
/// let all = conduct_check([1], snapshot.registry(), snapshot.levels());
///
/// // The user unchecks leaf 2.
/// let remaining = all.checked().iter().copied().filter(|k| *k != 2);
/// let result = conduct_uncheck(
///     remaining,
///     all.half_checked().iter().copied(),
///     snapshot.registry(),
///     snapshot.levels(),
/// );
/// assert_eq!(result.checked().len(), 1);
/// assert!(result.is_checked(&3));
/// assert!(result.is_half_checked(&1));
/// ```
pub fn conduct_uncheck<K, I, H>(
    keys: I,
    half_checked_keys: H,
    registry: &EntityRegistry<K>,
    levels: &LevelIndex<K>,
) -> Conduction<K>
where
    K: Clone + Eq + Hash,
    I: IntoIterator<Item = K>,
    H: IntoIterator<Item = K>,
{
    #[cfg(feature = "tracing")]
    let _span =
        tracing::debug_span!("conduct", mode = "uncheck", depth = levels.depth()).entered();

    let mut checked = known_keys(keys, registry);
    let previous_half: HashSet<K> = half_checked_keys
        .into_iter()
        .filter(|key| registry.contains(key))
        .collect();

    for level in levels.top_down() {
        for key in level {
            if checked.contains(key) || previous_half.contains(key) {
                continue;
            }
            if let Some(entity) = registry.get(key) {
                for child in entity.children() {
                    checked.remove(child);
                }
            }
        }
    }

    let mut half_checked = HashSet::new();
    let mut settled: HashSet<&K> = HashSet::new();
    for level in levels.bottom_up() {
        for key in level {
            let Some(parent) = unsettled_parent(key, registry, &mut settled) else {
                continue;
            };
            let (all_checked, partly_checked) = child_states(parent, &checked, &half_checked);
            if !all_checked {
                checked.remove(parent.key());
            }
            if partly_checked {
                half_checked.insert(parent.key().clone());
            }
        }
    }

    half_checked.retain(|key| !checked.contains(key));
    Conduction {
        checked,
        half_checked,
    }
}

impl<K> TopologySnapshot<K>
where
    K: Clone + Eq + Hash,
{
    /// Runs [`conduct_check`] against this snapshot.
    pub fn conduct_check<I>(&self, keys: I) -> Conduction<K>
    where
        I: IntoIterator<Item = K>,
    {
        conduct_check(keys, self.registry(), self.levels())
    }

    /// Runs [`conduct_uncheck`] against this snapshot.
    pub fn conduct_uncheck<I, H>(&self, keys: I, half_checked_keys: H) -> Conduction<K>
    where
        I: IntoIterator<Item = K>,
        H: IntoIterator<Item = K>,
    {
        conduct_uncheck(keys, half_checked_keys, self.registry(), self.levels())
    }
}

/// Collects the keys that exist in `registry`, dropping the rest.
fn known_keys<K, I>(keys: I, registry: &EntityRegistry<K>) -> HashSet<K>
where
    K: Clone + Eq + Hash,
    I: IntoIterator<Item = K>,
{
    let mut known = HashSet::new();
    let mut unknown = 0_usize;
    for key in keys {
        if registry.contains(&key) {
            known.insert(key);
        } else {
            unknown += 1;
        }
    }
    report_unknown(unknown);
    known
}

#[cfg(feature = "tracing")]
fn report_unknown(count: usize) {
    if count > 0 {
        tracing::warn!(count, "checked keys not present in the tree were skipped");
    }
}

#[cfg(not(feature = "tracing"))]
fn report_unknown(_count: usize) {}

/// Returns the parent of `key` the first time it is seen, `None` afterwards
/// and for roots.
fn unsettled_parent<'a, K>(
    key: &K,
    registry: &'a EntityRegistry<K>,
    settled: &mut HashSet<&'a K>,
) -> Option<&'a Entity<K>>
where
    K: Clone + Eq + Hash,
{
    let parent_key = registry.get(key)?.parent()?;
    if !settled.insert(parent_key) {
        return None;
    }
    registry.get(parent_key)
}

/// Returns `(all children checked, any child checked or half-checked)`.
fn child_states<K>(
    parent: &Entity<K>,
    checked: &HashSet<K>,
    half_checked: &HashSet<K>,
) -> (bool, bool)
where
    K: Eq + Hash,
{
    let mut all_checked = true;
    let mut partly_checked = false;
    for child in parent.children() {
        let is_checked = checked.contains(child);
        all_checked &= is_checked;
        partly_checked |= is_checked || half_checked.contains(child);
    }
    (all_checked, partly_checked)
}
