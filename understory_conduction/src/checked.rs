// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Checked-state coordination: conduction plus preservation of unknown keys.

use alloc::vec::Vec;
use core::hash::Hash;

use hashbrown::HashSet;

use crate::conduct::conduct_check;
use crate::entity::{Entity, EntityRegistry};
use crate::label::LabeledValue;
use crate::level::TopologySnapshot;

/// The derived selection state handed to the presentation layer.
///
/// `checked` always contains every missing key (a checked key with no entity
/// in the current topology); `half_checked` never does.
///
/// Two states are equal when they check, half-check and miss the same keys.
/// The order of [`missing`](Self::missing) does not take part in equality.
#[derive(Clone, Debug)]
pub struct CheckedState<K>
where
    K: Eq + Hash,
{
    checked: HashSet<K>,
    half_checked: HashSet<K>,
    missing: Vec<K>,
}

impl<K> PartialEq for CheckedState<K>
where
    K: Eq + Hash,
{
    fn eq(&self, other: &Self) -> bool {
        // `missing` is deduplicated, so equal lengths plus containment is set equality.
        self.checked == other.checked
            && self.half_checked == other.half_checked
            && self.missing.len() == other.missing.len()
            && self.missing.iter().all(|key| other.missing.contains(key))
    }
}

impl<K> Eq for CheckedState<K> where K: Eq + Hash {}

impl<K> Default for CheckedState<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            checked: HashSet::new(),
            half_checked: HashSet::new(),
            missing: Vec::new(),
        }
    }
}

impl<K> CheckedState<K>
where
    K: Eq + Hash,
{
    /// Returns the checked keys, missing keys included.
    #[must_use]
    pub fn checked(&self) -> &HashSet<K> {
        &self.checked
    }

    /// Returns the half-checked keys.
    #[must_use]
    pub fn half_checked(&self) -> &HashSet<K> {
        &self.half_checked
    }

    /// Returns the checked keys that have no entity, in input order.
    #[must_use]
    pub fn missing(&self) -> &[K] {
        &self.missing
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
}

/// Recomputes the checked and half-checked sets for a raw selection.
///
/// Labels are ignored. The keys of `raw_checked` are split into known keys
/// (present in `snapshot`) and missing keys. With `conduction` on, the known
/// keys go through [`conduct_check`]; with it off they pass through as a flat
/// list and nothing is half-checked. Missing keys are always added to the
/// checked output.
///
/// `_raw_half_checked` is the caller's previous half-checked list. It is
/// accepted so callers can hand over their whole state, but the result is
/// derived from `raw_checked` alone.
///
/// # Example
///
/// ```
/// use understory_conduction::{LabeledValue, TopologySnapshot, TreeItem, reconcile_checked};
///
/// let snapshot = TopologySnapshot::from_tree(&[TreeItem::branch(1, [TreeItem::leaf(2)])]);
/// let raw = [LabeledValue::<u32, &str>::unlabeled(2), LabeledValue::unlabeled(99)];
///
/// let state = reconcile_checked(&raw, &[], true, &snapshot);
/// assert!(state.is_checked(&1));
/// assert!(state.is_checked(&99));
/// assert_eq!(state.missing(), &[99]);
/// ```
#[must_use]
pub fn reconcile_checked<K, L>(
    raw_checked: &[LabeledValue<K, L>],
    _raw_half_checked: &[LabeledValue<K, L>],
    conduction: bool,
    snapshot: &TopologySnapshot<K>,
) -> CheckedState<K>
where
    K: Clone + Eq + Hash,
{
    reconcile_keys(
        raw_checked.iter().map(|item| item.value.clone()),
        conduction,
        snapshot,
    )
}

fn reconcile_keys<K, I>(
    keys: I,
    conduction: bool,
    snapshot: &TopologySnapshot<K>,
) -> CheckedState<K>
where
    K: Clone + Eq + Hash,
    I: IntoIterator<Item = K>,
{
    let registry = snapshot.registry();
    let mut known = Vec::new();
    let mut missing = Vec::new();
    let mut seen_missing = HashSet::new();
    for key in keys {
        if registry.contains(&key) {
            known.push(key);
        } else if seen_missing.insert(key.clone()) {
            missing.push(key);
        }
    }

    let (mut checked, half_checked) = if conduction {
        conduct_check(known, registry, snapshot.levels()).into_parts()
    } else {
        (known.into_iter().collect(), HashSet::new())
    };
    checked.extend(missing.iter().cloned());

    CheckedState {
        checked,
        half_checked,
        missing,
    }
}

/// Which checked keys to report back to the caller.
///
/// With conduction on, checking a parent checks its whole subtree. A UI
/// usually wants to show a more compact list of values.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CheckedStrategy {
    /// Report every checked key.
    #[default]
    All,
    /// Drop keys whose parent is also checked, so a fully checked subtree is
    /// reported as its topmost key.
    Parent,
    /// Drop keys that have a checked child, so a fully checked subtree is
    /// reported as its leaves.
    Child,
}

/// Filters `checked` according to `strategy`, keeping input order.
///
/// Keys that are not in `registry` are always kept.
///
/// # Example
///
/// ```
/// use understory_conduction::{CheckedStrategy, TopologySnapshot, TreeItem, format_checked};
///
/// let snapshot = TopologySnapshot::from_tree(&[TreeItem::branch(
///     1,
///     [TreeItem::leaf(2), TreeItem::leaf(3)],
/// )]);
/// let checked = [1, 2, 3];
///
/// assert_eq!(format_checked(checked, CheckedStrategy::Parent, snapshot.registry()), [1]);
/// assert_eq!(format_checked(checked, CheckedStrategy::Child, snapshot.registry()), [2, 3]);
/// ```
pub fn format_checked<K, I>(
    checked: I,
    strategy: CheckedStrategy,
    registry: &EntityRegistry<K>,
) -> Vec<K>
where
    K: Clone + Eq + Hash,
    I: IntoIterator<Item = K>,
{
    let keys: Vec<K> = checked.into_iter().collect();
    if strategy == CheckedStrategy::All {
        return keys;
    }

    let set: HashSet<&K> = keys.iter().collect();
    let keep = |key: &K| {
        let Some(entity) = registry.get(key) else {
            return true;
        };
        match strategy {
            CheckedStrategy::All => true,
            CheckedStrategy::Parent => entity
                .parent()
                .is_none_or(|parent| !set.contains(parent)),
            CheckedStrategy::Child => !entity
                .children()
                .iter()
                .any(|child| set.contains(child)),
        }
    };
    keys.iter().filter(|key| keep(key)).cloned().collect()
}

/// Owns a topology snapshot and a raw selection, and keeps the derived
/// [`CheckedState`] up to date.
///
/// Changes are staged with the `set_*` methods and applied by [`commit`].
/// A commit always runs against the most recently installed topology, so a
/// topology change and a selection change staged together are never
/// conducted against a stale level index.
///
/// The coordinator keeps a revision counter that only moves when the
/// committed state changes, so observers can cheaply skip redundant redraws.
///
/// [`check`] and [`uncheck`] store the clicked selection back as raw keys
/// formatted with the coordinator's [`CheckedStrategy`] (by default
/// [`CheckedStrategy::Child`]). With `Child` or `Parent`, a parent that is
/// checked only because all of its loaded children are is not stored, so
/// children loaded later are judged by the stored keys alone and not by the
/// click history. With `All`, every conducted key is stored.
///
/// [`commit`]: Self::commit
/// [`check`]: Self::check
/// [`uncheck`]: Self::uncheck
///
/// # Example
///
/// ```
/// use understory_conduction::{CheckedStateCoordinator, TopologySnapshot, TreeItem};
///
/// let tree = [TreeItem::branch("fruit", [TreeItem::leaf("apple"), TreeItem::leaf("pear")])];
/// let mut coordinator = CheckedStateCoordinator::new(TopologySnapshot::from_tree(&tree));
///
/// coordinator.check("apple");
/// assert!(coordinator.state().is_half_checked(&"fruit"));
///
/// coordinator.check("pear");
/// assert!(coordinator.state().is_checked(&"fruit"));
/// assert_eq!(coordinator.checked_values(), ["apple", "pear"]);
///
/// coordinator.uncheck(&"fruit");
/// assert!(coordinator.state().checked().is_empty());
/// ```
#[derive(Clone, Debug)]
pub struct CheckedStateCoordinator<K>
where
    K: Clone + Eq + Hash,
{
    snapshot: TopologySnapshot<K>,
    raw_checked: Vec<K>,
    conduction: bool,
    strategy: CheckedStrategy,
    state: CheckedState<K>,
    stale: bool,
    revision: u64,
}

impl<K> Default for CheckedStateCoordinator<K>
where
    K: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new(TopologySnapshot::default())
    }
}

impl<K> CheckedStateCoordinator<K>
where
    K: Clone + Eq + Hash,
{
    /// Creates a coordinator over `snapshot` with conduction enabled, the
    /// [`CheckedStrategy::Child`] strategy and nothing checked.
    #[must_use]
    pub fn new(snapshot: TopologySnapshot<K>) -> Self {
        Self {
            snapshot,
            raw_checked: Vec::new(),
            conduction: true,
            strategy: CheckedStrategy::Child,
            state: CheckedState::default(),
            stale: false,
            revision: 0,
        }
    }

    /// Returns the current topology.
    #[must_use]
    pub fn topology(&self) -> &TopologySnapshot<K> {
        &self.snapshot
    }

    /// Returns `true` if conduction is enabled.
    #[must_use]
    pub fn conduction(&self) -> bool {
        self.conduction
    }

    /// Returns the strategy used to store clicks and report values.
    #[must_use]
    pub fn strategy(&self) -> CheckedStrategy {
        self.strategy
    }

    /// Returns the raw checked keys as last staged.
    #[must_use]
    pub fn raw_checked(&self) -> &[K] {
        &self.raw_checked
    }

    /// Returns `true` if changes are staged but not committed.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Returns the revision of the committed state.
    ///
    /// The revision is bumped by [`commit`](Self::commit) only when the
    /// committed state differs from the previous one, as defined by
    /// [`CheckedState`]'s equality.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replaces the topology wholesale.
    pub fn set_topology(&mut self, snapshot: TopologySnapshot<K>) {
        self.snapshot = snapshot;
        self.stale = true;
    }

    /// Enables or disables conduction.
    pub fn set_conduction(&mut self, conduction: bool) {
        if self.conduction != conduction {
            self.conduction = conduction;
            self.stale = true;
        }
    }

    /// Sets the strategy used by later clicks and by
    /// [`checked_values`](Self::checked_values).
    ///
    /// The staged raw keys are left as they are, so the derived state does
    /// not change.
    pub fn set_strategy(&mut self, strategy: CheckedStrategy) {
        self.strategy = strategy;
    }

    /// Replaces the raw checked keys.
    pub fn set_checked<I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = K>,
    {
        self.raw_checked = keys.into_iter().collect();
        self.stale = true;
    }

    /// Replaces the raw checked keys from labeled values, ignoring labels.
    pub fn set_checked_values<L>(&mut self, values: &[LabeledValue<K, L>]) {
        self.set_checked(values.iter().map(|item| item.value.clone()));
    }

    /// Applies staged changes and returns `true` if the state changed.
    pub fn commit(&mut self) -> bool {
        if !self.stale {
            return false;
        }
        self.stale = false;

        let next = reconcile_keys(
            self.raw_checked.iter().cloned(),
            self.conduction,
            &self.snapshot,
        );
        let changed = next != self.state;
        self.state = next;
        if changed {
            self.revision = self.revision.wrapping_add(1);
        }
        changed
    }

    /// Commits staged changes and returns the resulting state.
    pub fn state(&mut self) -> &CheckedState<K> {
        self.commit();
        &self.state
    }

    /// Returns the last committed state without applying staged changes.
    #[must_use]
    pub fn committed(&self) -> &CheckedState<K> {
        &self.state
    }

    /// Commits staged changes and returns the checked keys to display.
    ///
    /// Known keys come in registry order, followed by missing keys. With
    /// conduction on they are formatted with the coordinator's strategy;
    /// with it off every checked key is reported.
    pub fn checked_values(&mut self) -> Vec<K> {
        self.commit();
        let ordered = ordered_keys(&self.state.checked, &self.state.missing, &self.snapshot);
        if self.conduction {
            format_checked(ordered, self.strategy, self.snapshot.registry())
        } else {
            ordered
        }
    }

    /// Checks `key`, as when the user ticks its checkbox.
    ///
    /// With conduction on, the conducted selection including `key` is stored
    /// back as raw keys, formatted with the coordinator's strategy.
    pub fn check(&mut self, key: K) {
        self.commit();
        if self.conduction {
            let registry = self.snapshot.registry();
            let mut known: Vec<K> = self
                .state
                .checked
                .iter()
                .filter(|k| registry.contains(k))
                .cloned()
                .collect();
            let mut missing = self.state.missing.clone();
            if registry.contains(&key) {
                known.push(key);
            } else if !missing.contains(&key) {
                missing.push(key);
            }
            let (checked, _) = self.snapshot.conduct_check(known).into_parts();
            self.store_clicked(&checked, &missing);
        } else if !self.raw_checked.contains(&key) {
            self.raw_checked.push(key);
        }
        self.stale = true;
        self.commit();
    }

    /// Unchecks `key`, as when the user clears its checkbox.
    ///
    /// With conduction on, this also unchecks the descendants of `key` and
    /// any ancestor that was checked only because all of its children were.
    /// The result is stored back like in [`check`](Self::check).
    pub fn uncheck(&mut self, key: &K) {
        self.commit();
        if self.conduction {
            let registry = self.snapshot.registry();
            let known = self
                .state
                .checked
                .iter()
                .filter(|k| *k != key && registry.contains(k))
                .cloned();
            let (checked, _) = self
                .snapshot
                .conduct_uncheck(known, self.state.half_checked.iter().cloned())
                .into_parts();
            let missing: Vec<K> = self
                .state
                .missing
                .iter()
                .filter(|k| *k != key)
                .cloned()
                .collect();
            self.store_clicked(&checked, &missing);
        } else {
            self.raw_checked.retain(|k| k != key);
        }
        self.stale = true;
        self.commit();
    }

    fn store_clicked(&mut self, checked: &HashSet<K>, missing: &[K]) {
        let ordered = ordered_keys(checked, missing, &self.snapshot);
        self.raw_checked = format_checked(ordered, self.strategy, self.snapshot.registry());
    }
}

/// Known keys of `checked` in registry order, then `missing` as given.
fn ordered_keys<K>(checked: &HashSet<K>, missing: &[K], snapshot: &TopologySnapshot<K>) -> Vec<K>
where
    K: Clone + Eq + Hash,
{
    snapshot
        .registry()
        .iter()
        .map(Entity::key)
        .filter(|key| checked.contains(*key))
        .chain(missing)
        .cloned()
        .collect()
}
