// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Level index: registered entities grouped by depth.

use alloc::vec::Vec;
use core::hash::Hash;

use crate::entity::{EntityRegistry, TreeNode};

/// Keys of an [`EntityRegistry`] grouped by level.
///
/// Conduction walks this index level by level (downward, then upward) instead
/// of recursing through the tree, so deep trees cannot exhaust the stack and
/// the order in which ancestors observe their children is well defined.
#[derive(Clone, Debug)]
pub struct LevelIndex<K> {
    levels: Vec<Vec<K>>,
}

impl<K> Default for LevelIndex<K> {
    fn default() -> Self {
        Self { levels: Vec::new() }
    }
}

impl<K> LevelIndex<K>
where
    K: Clone + Eq + Hash,
{
    /// Groups the entities of `registry` by level, keeping registration order
    /// within each level.
    #[must_use]
    pub fn build(registry: &EntityRegistry<K>) -> Self {
        let mut levels: Vec<Vec<K>> = Vec::new();
        for entity in registry.iter() {
            let level = entity.level();
            if level >= levels.len() {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(entity.key().clone());
        }
        Self { levels }
    }
}

impl<K> LevelIndex<K> {
    /// Returns the deepest level present, or `None` for an empty tree.
    #[must_use]
    pub fn max_level(&self) -> Option<usize> {
        self.levels.len().checked_sub(1)
    }

    /// Returns the keys at `level`; empty if the level does not exist.
    #[must_use]
    pub fn level(&self, level: usize) -> &[K] {
        self.levels.get(level).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the number of levels.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Returns `true` if the index holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Iterates levels from the roots down.
    pub fn top_down(&self) -> impl DoubleEndedIterator<Item = &[K]> + '_ {
        self.levels.iter().map(Vec::as_slice)
    }

    /// Iterates levels from the deepest up to the roots.
    pub fn bottom_up(&self) -> impl Iterator<Item = &[K]> + '_ {
        self.top_down().rev()
    }
}

/// One tree topology: an [`EntityRegistry`] and the [`LevelIndex`] derived from it.
///
/// The two are always built together, registry first, so a snapshot can never
/// pair a registry with an index from an older tree. Snapshots are immutable;
/// when the tree changes, build a new one and hand it to whoever needs it.
///
/// # Example
///
/// ```
/// use understory_conduction::TopologySnapshot;
///
/// // Lazily loaded children can arrive before their parents.
/// let snapshot = TopologySnapshot::from_parent_links([
///     ("leaf", Some("branch")),
///     ("branch", Some("root")),
///     ("root", None),
/// ]);
///
/// assert_eq!(snapshot.levels().max_level(), Some(2));
/// assert_eq!(snapshot.levels().level(2), &["leaf"]);
/// ```
#[derive(Clone, Debug)]
pub struct TopologySnapshot<K>
where
    K: Clone + Eq + Hash,
{
    registry: EntityRegistry<K>,
    levels: LevelIndex<K>,
}

impl<K> Default for TopologySnapshot<K>
where
    K: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new(EntityRegistry::new())
    }
}

impl<K> TopologySnapshot<K>
where
    K: Clone + Eq + Hash,
{
    /// Wraps `registry` and builds its level index.
    #[must_use]
    pub fn new(registry: EntityRegistry<K>) -> Self {
        let levels = LevelIndex::build(&registry);
        Self { registry, levels }
    }

    /// Builds a snapshot from a forest of nested nodes.
    ///
    /// See [`EntityRegistry::from_tree`].
    pub fn from_tree<N>(roots: &[N]) -> Self
    where
        N: TreeNode<Key = K>,
    {
        Self::new(EntityRegistry::from_tree(roots))
    }

    /// Builds a snapshot from `(key, parent)` pairs.
    ///
    /// See [`EntityRegistry::from_parent_links`].
    pub fn from_parent_links<I>(links: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<K>)>,
    {
        Self::new(EntityRegistry::from_parent_links(links))
    }

    /// Returns the entity registry.
    #[must_use]
    pub fn registry(&self) -> &EntityRegistry<K> {
        &self.registry
    }

    /// Returns the level index.
    #[must_use]
    pub fn levels(&self) -> &LevelIndex<K> {
        &self.levels
    }
}
