// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_conduction --heading-base-level=0

//! Understory Conduction: checked and half-checked state for tree selections.
//!
//! Tree-shaped pickers with checkboxes (tree selects, file choosers, permission
//! editors) share a small set of rules:
//!
//! - Checking a node checks its whole subtree.
//! - A node whose children are all checked is itself checked.
//! - A node with some, but not all, of its subtree checked is **half-checked**.
//!
//! This crate computes that state. It does not draw anything and does not own
//! your tree: you describe the topology, hand over the keys the user checked,
//! and get back the derived checked and half-checked sets.
//!
//! ## Pieces
//!
//! - [`EntityRegistry`]: a flat index of the tree (parent, ordered children,
//!   level per key), built from nested nodes ([`TreeNode`]) or from
//!   `(key, parent)` pairs. Malformed input is repaired and reported as
//!   [`TopologyIssue`]s rather than rejected.
//! - [`LevelIndex`]: keys grouped by depth. Conduction walks levels instead of
//!   recursing, so deep trees are fine.
//! - [`TopologySnapshot`]: a registry and its level index, built together.
//! - [`conduct_check`] / [`conduct_uncheck`]: the conduction passes.
//! - [`reconcile_checked`] and [`CheckedStateCoordinator`]: conduction plus
//!   **missing keys**. A checked key whose node is not in the tree (yet) is
//!   kept in the checked output instead of being dropped, so selections
//!   survive lazy loading.
//! - [`format_checked`]: trims a checked set for display using a
//!   [`CheckedStrategy`].
//! - [`LabelCache`]: remembers the display label of selected values across
//!   updates that arrive without labels.
//!
//! ## Minimal example
//!
//! ```rust
//! use understory_conduction::{TopologySnapshot, TreeItem};
//!
//! // a -> [b -> [d, e], c]
//! let snapshot = TopologySnapshot::from_tree(&[TreeItem::branch(
//!     "a",
//!     [
//!         TreeItem::branch("b", [TreeItem::leaf("d"), TreeItem::leaf("e")]),
//!         TreeItem::leaf("c"),
//!     ],
//! )]);
//!
//! let result = snapshot.conduct_check(["d", "e"]);
//! assert!(result.is_checked(&"b"));
//! assert!(result.is_half_checked(&"a"));
//!
//! let result = snapshot.conduct_check(["a"]);
//! assert_eq!(result.checked().len(), 5);
//! assert!(result.half_checked().is_empty());
//! ```
//!
//! ## Snapshots are immutable
//!
//! Registries, level indexes and label caches are never edited in place. When
//! the tree changes, build a new [`TopologySnapshot`] and hand it over; anyone
//! still reading the old one is unaffected. [`CheckedStateCoordinator`] stages
//! topology and selection changes and applies them together on commit, with
//! the new topology installed before anything is conducted.
//!
//! ## Features
//!
//! - `std` (default): no effect on the API; this crate is `no_std` + `alloc`.
//! - `tracing`: emits `debug` spans around registry builds and conduction,
//!   and `warn` events when a tree needed repair or checked keys were not
//!   found in the tree.

#![no_std]

extern crate alloc;

mod checked;
mod conduct;
mod entity;
mod label;
mod level;

pub use checked::{
    CheckedState, CheckedStateCoordinator, CheckedStrategy, format_checked, reconcile_checked,
};
pub use conduct::{Conduction, conduct_check, conduct_uncheck};
pub use entity::{Descendants, Entity, EntityRegistry, TopologyIssue, TreeItem, TreeNode};
pub use label::{LabelCache, LabeledValue};
pub use level::{LevelIndex, TopologySnapshot};
