// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Entity registry: a flat index of tree nodes keyed by identifier.

use alloc::vec::Vec;
use core::fmt;
use core::hash::Hash;

use hashbrown::{HashMap, HashSet};

/// A node in a caller-owned hierarchical description.
///
/// This is the only view of the caller's tree the registry needs: a key and an
/// ordered list of children. Implement it on your own data type, or use
/// [`TreeItem`] when you just need something to feed the registry.
pub trait TreeNode: Sized {
    /// The identifier type.
    type Key;

    /// Returns this node's identifier.
    fn key(&self) -> Self::Key;

    /// Returns this node's children in display order.
    fn children(&self) -> &[Self];
}

/// A minimal owned tree node implementing [`TreeNode`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeItem<K> {
    /// The node identifier.
    pub key: K,
    /// Child nodes in order.
    pub children: Vec<Self>,
}

impl<K> TreeItem<K> {
    /// Creates a node with no children.
    #[must_use]
    pub const fn leaf(key: K) -> Self {
        Self {
            key,
            children: Vec::new(),
        }
    }

    /// Creates a node with the given children.
    #[must_use]
    pub fn branch(key: K, children: impl IntoIterator<Item = Self>) -> Self {
        Self {
            key,
            children: children.into_iter().collect(),
        }
    }
}

impl<K: Clone> TreeNode for TreeItem<K> {
    type Key = K;

    fn key(&self) -> K {
        self.key.clone()
    }

    fn children(&self) -> &[Self] {
        &self.children
    }
}

/// A registered tree node: its parent, ordered children and depth.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entity<K> {
    key: K,
    parent: Option<K>,
    children: Vec<K>,
    level: usize,
}

impl<K> Entity<K> {
    /// Returns the identifier of this entity.
    #[must_use]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns the parent identifier, or `None` for a root.
    #[must_use]
    pub fn parent(&self) -> Option<&K> {
        self.parent.as_ref()
    }

    /// Returns the child identifiers in order.
    #[must_use]
    pub fn children(&self) -> &[K] {
        &self.children
    }

    /// Returns the depth of this entity; roots are at level 0.
    #[must_use]
    pub fn level(&self) -> usize {
        self.level
    }

    /// Returns `true` if the entity has no children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A problem found while building an [`EntityRegistry`] from malformed input.
///
/// Registry construction never fails. Each issue describes how the input was
/// repaired so that the result is still a forest.
#[derive(Clone, PartialEq, Eq)]
pub enum TopologyIssue<K> {
    /// The identifier appeared more than once; later occurrences were skipped.
    DuplicateKey {
        /// The repeated identifier.
        key: K,
    },
    /// The node named a parent that is not in the input; it became a root.
    UnresolvedParent {
        /// The node whose parent is missing.
        key: K,
        /// The parent identifier that did not resolve.
        parent: K,
    },
    /// Following parents from this node led back to it; the link to `parent`
    /// was cut and the node became a root.
    Cycle {
        /// The node that was detached.
        key: K,
        /// The parent link that was dropped.
        parent: K,
    },
}

impl<K> TopologyIssue<K> {
    /// Returns the identifier the issue is about.
    #[must_use]
    pub fn key(&self) -> &K {
        match self {
            Self::DuplicateKey { key }
            | Self::UnresolvedParent { key, .. }
            | Self::Cycle { key, .. } => key,
        }
    }

    /// Returns a short name for the kind of issue.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateKey { .. } => "duplicate_key",
            Self::UnresolvedParent { .. } => "unresolved_parent",
            Self::Cycle { .. } => "cycle",
        }
    }
}

impl<K: fmt::Debug> fmt::Debug for TopologyIssue<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey { key } => write!(f, "DuplicateKey {{ key: {key:?} }}"),
            Self::UnresolvedParent { key, parent } => {
                write!(f, "UnresolvedParent {{ key: {key:?}, parent: {parent:?} }}")
            }
            Self::Cycle { key, parent } => {
                write!(f, "Cycle {{ key: {key:?}, parent: {parent:?} }}")
            }
        }
    }
}

impl<K: fmt::Debug> fmt::Display for TopologyIssue<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey { key } => {
                write!(f, "identifier {key:?} appears more than once")
            }
            Self::UnresolvedParent { key, parent } => write!(
                f,
                "parent {parent:?} of {key:?} is not in the tree; treating {key:?} as a root"
            ),
            Self::Cycle { key, parent } => write!(
                f,
                "parent chain of {key:?} forms a cycle; dropping link to {parent:?}"
            ),
        }
    }
}

impl<K: fmt::Debug> core::error::Error for TopologyIssue<K> {}

/// Flat index of tree nodes keyed by identifier.
///
/// A registry is a snapshot of one tree topology. It is never edited after
/// construction; when the tree changes, build a new one.
///
/// # Example
///
/// ```
/// use understory_conduction::{EntityRegistry, TreeItem};
///
/// let tree = [TreeItem::branch("a", [TreeItem::leaf("b"), TreeItem::leaf("c")])];
/// let registry = EntityRegistry::from_tree(&tree);
///
/// assert_eq!(registry.len(), 3);
/// assert_eq!(registry.get(&"b").unwrap().parent(), Some(&"a"));
/// assert_eq!(registry.get(&"c").unwrap().level(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct EntityRegistry<K>
where
    K: Clone + Eq + Hash,
{
    entities: HashMap<K, Entity<K>>,
    /// Registration order, used for deterministic iteration.
    order: Vec<K>,
    roots: Vec<K>,
    issues: Vec<TopologyIssue<K>>,
}

impl<K> Default for EntityRegistry<K>
where
    K: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> EntityRegistry<K>
where
    K: Clone + Eq + Hash,
{
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            order: Vec::new(),
            roots: Vec::new(),
            issues: Vec::new(),
        }
    }

    /// Builds a registry from a forest of nested nodes.
    ///
    /// Nodes are registered in pre-order. A node whose key was already
    /// registered is skipped together with its subtree and reported as
    /// [`TopologyIssue::DuplicateKey`].
    pub fn from_tree<N>(roots: &[N]) -> Self
    where
        N: TreeNode<Key = K>,
    {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("registry_build", source = "tree").entered();

        let mut registry = Self::new();
        let mut stack: Vec<(&N, Option<K>, usize)> =
            roots.iter().rev().map(|node| (node, None, 0)).collect();

        while let Some((node, parent, level)) = stack.pop() {
            let key = node.key();
            if registry.entities.contains_key(&key) {
                registry.record(TopologyIssue::DuplicateKey { key });
                continue;
            }

            match &parent {
                Some(parent_key) => {
                    if let Some(parent_entity) = registry.entities.get_mut(parent_key) {
                        parent_entity.children.push(key.clone());
                    }
                }
                None => registry.roots.push(key.clone()),
            }

            stack.extend(
                node.children()
                    .iter()
                    .rev()
                    .map(|child| (child, Some(key.clone()), level + 1)),
            );

            registry.order.push(key.clone());
            registry.entities.insert(
                key.clone(),
                Entity {
                    key,
                    parent,
                    children: Vec::new(),
                    level,
                },
            );
        }

        registry
    }

    /// Builds a registry from `(key, parent)` pairs.
    ///
    /// This is the flat form used by lazily loaded trees, where a node may
    /// name a parent that has not been materialized yet. Children keep the
    /// order in which they appear in the input.
    ///
    /// Malformed input is repaired instead of rejected:
    /// - a parent that is not in the input makes the node a root
    ///   ([`TopologyIssue::UnresolvedParent`]);
    /// - a parent chain that loops is cut at the first repeated node, which
    ///   becomes a root ([`TopologyIssue::Cycle`]);
    /// - repeated keys keep their first occurrence
    ///   ([`TopologyIssue::DuplicateKey`]).
    pub fn from_parent_links<I>(links: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<K>)>,
    {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("registry_build", source = "parent_links").entered();

        let mut registry = Self::new();
        let mut declared: Vec<(K, Option<K>)> = Vec::new();

        for (key, parent) in links {
            if registry.entities.contains_key(&key) {
                registry.record(TopologyIssue::DuplicateKey { key });
                continue;
            }
            registry.order.push(key.clone());
            registry.entities.insert(
                key.clone(),
                Entity {
                    key: key.clone(),
                    parent: None,
                    children: Vec::new(),
                    level: 0,
                },
            );
            declared.push((key, parent));
        }

        for (key, parent) in declared {
            let Some(parent) = parent else {
                registry.roots.push(key);
                continue;
            };
            match registry.entities.get_mut(&parent) {
                Some(parent_entity) => {
                    parent_entity.children.push(key.clone());
                    if let Some(entity) = registry.entities.get_mut(&key) {
                        entity.parent = Some(parent);
                    }
                }
                None => {
                    registry.roots.push(key.clone());
                    registry.record(TopologyIssue::UnresolvedParent { key, parent });
                }
            }
        }

        let mut placed: HashSet<K> = HashSet::with_capacity(registry.order.len());
        let roots = registry.roots.clone();
        for root in &roots {
            registry.assign_levels(root, &mut placed);
        }

        // Anything not reachable from a root sits on or below a parent cycle.
        let order = registry.order.clone();
        for key in &order {
            if placed.contains(key) {
                continue;
            }
            let repeated = registry.first_repeated_ancestor(key);
            registry.detach(&repeated);
            registry.assign_levels(&repeated, &mut placed);
        }

        registry
    }

    /// Returns the number of registered entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if no entity is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns the entity registered under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&Entity<K>> {
        self.entities.get(key)
    }

    /// Returns `true` if `key` is registered.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entities.contains_key(key)
    }

    /// Returns the root identifiers in input order.
    ///
    /// Nodes that became roots while repairing a cycle come after the declared roots.
    #[must_use]
    pub fn roots(&self) -> &[K] {
        &self.roots
    }

    /// Returns the issues found while building this registry.
    #[must_use]
    pub fn issues(&self) -> &[TopologyIssue<K>] {
        &self.issues
    }

    /// Iterates over all entities in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity<K>> + '_ {
        self.order.iter().filter_map(|key| self.entities.get(key))
    }

    /// Iterates over the descendants of `key` in pre-order, excluding `key` itself.
    ///
    /// Yields nothing when `key` is not registered.
    pub fn descendants<'a>(&'a self, key: &K) -> Descendants<'a, K> {
        let stack: Vec<&K> = self
            .entities
            .get(key)
            .map(|entity| entity.children.iter().rev().collect())
            .unwrap_or_default();
        Descendants {
            registry: self,
            stack,
        }
    }

    fn record(&mut self, issue: TopologyIssue<K>) {
        #[cfg(feature = "tracing")]
        tracing::warn!(kind = issue.kind(), "malformed tree topology repaired");
        self.issues.push(issue);
    }

    /// Sets levels for `root` and everything below it, depth first.
    fn assign_levels(&mut self, root: &K, placed: &mut HashSet<K>) {
        let mut stack: Vec<(K, usize)> = Vec::from([(root.clone(), 0)]);
        while let Some((key, level)) = stack.pop() {
            if !placed.insert(key.clone()) {
                continue;
            }
            if let Some(entity) = self.entities.get_mut(&key) {
                entity.level = level;
                stack.extend(
                    entity
                        .children
                        .iter()
                        .map(|child| (child.clone(), level + 1)),
                );
            }
        }
    }

    /// Walks parent links upward from `key` and returns the first key seen twice.
    ///
    /// Only called for keys that are unreachable from any root, so the walk
    /// always meets a repeat. A missing parent ends the walk at that key.
    fn first_repeated_ancestor(&self, key: &K) -> K {
        let mut seen: HashSet<&K> = HashSet::new();
        let mut current = key;
        loop {
            if !seen.insert(current) {
                return current.clone();
            }
            match self.entities.get(current).and_then(|e| e.parent.as_ref()) {
                Some(parent) => current = parent,
                None => return current.clone(),
            }
        }
    }

    /// Cuts `key` from its parent and makes it a root.
    fn detach(&mut self, key: &K) {
        let Some(parent) = self
            .entities
            .get_mut(key)
            .and_then(|entity| entity.parent.take())
        else {
            return;
        };
        if let Some(parent_entity) = self.entities.get_mut(&parent) {
            parent_entity.children.retain(|child| child != key);
        }
        self.roots.push(key.clone());
        self.record(TopologyIssue::Cycle {
            key: key.clone(),
            parent,
        });
    }
}

/// Pre-order iterator over the descendants of an entity.
///
/// Returned by [`EntityRegistry::descendants`].
#[derive(Debug)]
pub struct Descendants<'a, K>
where
    K: Clone + Eq + Hash,
{
    registry: &'a EntityRegistry<K>,
    stack: Vec<&'a K>,
}

impl<'a, K> Iterator for Descendants<'a, K>
where
    K: Clone + Eq + Hash,
{
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.stack.pop()?;
        if let Some(entity) = self.registry.entities.get(key) {
            self.stack.extend(entity.children.iter().rev());
        }
        Some(key)
    }
}
