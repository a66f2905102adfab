//! Topic hierarchy trees for layout and reporting.
//!
//! A [`HierarchyTree`] turns a clustered topic set (topics plus linkage
//! table) into a rooted binary tree, then annotates it in passes:
//!
//! | Pass | Direction | Sets |
//! |------|-----------|------|
//! | [`HierarchyTree::set_depth`] | down, then up | depth, height |
//! | [`HierarchyTree::split_clusters`] | up | cluster id, cluster-root flag |
//! | [`HierarchyTree::set_values_and_normalise_sizes`] | up | value, size |
//! | [`HierarchyTree::sort_children`] | any | child order |
//!
//! ```text
//!   cluster roots after split_clusters, leaves labelled by cluster id
//!
//!            6
//!           / \
//!         [4]  5
//!         / \  / \
//!        0  0 [1] [2]
//! ```
//!
//! [`HealthCheck`] verifies the shape and the annotations.

mod node;
mod tree;
mod validate;

pub use node::{HierarchyNode, NodeContent};
pub use tree::HierarchyTree;
pub use validate::{
    validate_tree_structure, HealthCheck, HealthReport, Severity, ValidationIssue, ValidationReport,
};
