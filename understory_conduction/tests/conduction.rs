// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for the `understory_conduction` crate.
//!
//! These walk through the flows a tree select goes through: building a
//! topology, conducting user clicks, surviving lazy loads, and filling labels.

use hashbrown::HashSet;
use understory_conduction::{
    CheckedStateCoordinator, CheckedStrategy, LabelCache, LabeledValue, TopologyIssue,
    TopologySnapshot, TreeItem, conduct_check, format_checked, reconcile_checked,
};

/// `A -> [B -> [D, E], C]`
fn sample() -> TopologySnapshot<&'static str> {
    TopologySnapshot::from_tree(&[TreeItem::branch(
        "A",
        [
            TreeItem::branch("B", [TreeItem::leaf("D"), TreeItem::leaf("E")]),
            TreeItem::leaf("C"),
        ],
    )])
}

fn set<const N: usize>(keys: [&'static str; N]) -> HashSet<&'static str> {
    keys.into_iter().collect()
}

#[test]
fn checked_children_promote_parent_and_half_check_root() {
    let snapshot = sample();
    let result = conduct_check(["D", "E"], snapshot.registry(), snapshot.levels());

    assert_eq!(result.checked(), &set(["D", "E", "B"]));
    assert_eq!(result.half_checked(), &set(["A"]));
}

#[test]
fn checked_root_cascades() {
    let snapshot = sample();
    let result = conduct_check(["A"], snapshot.registry(), snapshot.levels());

    assert_eq!(result.checked(), &set(["A", "B", "C", "D", "E"]));
    assert!(result.half_checked().is_empty());
}

#[test]
fn unknown_key_is_kept_by_reconcile_only() {
    let snapshot = sample();

    let conducted = conduct_check(["Z"], snapshot.registry(), snapshot.levels());
    assert!(conducted.checked().is_empty());
    assert!(conducted.half_checked().is_empty());

    let raw = [LabeledValue::<_, &str>::unlabeled("Z")];
    let state = reconcile_checked(&raw, &[], true, &snapshot);
    assert_eq!(state.checked(), &set(["Z"]));
    assert!(state.half_checked().is_empty());
}

#[test]
fn labels_follow_the_selection_through_conduction() {
    let snapshot = sample();
    let mut labels = LabelCache::<&str, &str>::new();

    let picked = [LabeledValue::labeled("D", "Dates"), LabeledValue::labeled("E", "Elderberries")];
    labels.update(picked.clone());
    let state = reconcile_checked(&picked, &[], true, &snapshot);

    // The presentation layer reports the conducted set back without labels.
    let shown = format_checked(
        ["D", "E", "B"].into_iter().filter(|k| state.is_checked(k)),
        CheckedStrategy::Child,
        snapshot.registry(),
    );
    let filled = labels.update(shown.into_iter().map(LabeledValue::<_, &str>::unlabeled));

    assert_eq!(
        filled,
        [LabeledValue::labeled("D", "Dates"), LabeledValue::labeled("E", "Elderberries")]
    );
}

#[test]
fn lazy_children_pick_up_a_checked_parent() {
    let mut coordinator =
        CheckedStateCoordinator::new(TopologySnapshot::from_parent_links([("root", None)]));
    coordinator.check("root");
    assert_eq!(coordinator.state().checked(), &set(["root"]));

    // Children arrive after the user checked their parent.
    coordinator.set_topology(TopologySnapshot::from_parent_links([
        ("root", None),
        ("x", Some("root")),
        ("y", Some("root")),
    ]));
    assert_eq!(coordinator.state().checked(), &set(["root", "x", "y"]));
}

#[test]
fn selection_on_unloaded_branch_survives_until_load() {
    let mut coordinator =
        CheckedStateCoordinator::new(TopologySnapshot::from_parent_links([("root", None)]));
    coordinator.set_checked(["deep"]);
    assert_eq!(coordinator.state().missing(), &["deep"]);
    let revision = coordinator.revision();

    // Reloading the same topology does not change anything observable.
    coordinator.set_topology(TopologySnapshot::from_parent_links([("root", None)]));
    assert!(!coordinator.commit());
    assert_eq!(coordinator.revision(), revision);

    coordinator.set_topology(TopologySnapshot::from_parent_links([
        ("root", None),
        ("mid", Some("root")),
        ("deep", Some("mid")),
    ]));
    let state = coordinator.state();
    assert!(state.missing().is_empty());
    assert_eq!(state.checked(), &set(["deep", "mid", "root"]));
}

#[test]
fn malformed_topology_still_conducts() {
    // "b" and "c" point at each other; "d" names a parent that never loads.
    let snapshot = TopologySnapshot::from_parent_links([
        ("a", None),
        ("b", Some("c")),
        ("c", Some("b")),
        ("d", Some("ghost")),
    ]);

    let issues = snapshot.registry().issues();
    assert_eq!(issues.len(), 2);
    assert!(matches!(issues[0], TopologyIssue::UnresolvedParent { key: "d", parent: "ghost" }));
    assert!(matches!(issues[1], TopologyIssue::Cycle { key: "b", parent: "c" }));

    let result = snapshot.conduct_check(["b"]);
    assert_eq!(result.checked(), &set(["b", "c"]));
}
