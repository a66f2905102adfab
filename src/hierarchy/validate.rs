//! Structural checks for hierarchy trees.
//!
//! A tree built from a linkage table should be a single rooted binary tree
//! whose annotations agree with its shape:
//! - exactly one root, every other node reachable from it;
//! - internal nodes with exactly two children;
//! - `depth(child) = depth(parent) + 1` and `height = 1 + max(child heights)`;
//! - internal values and sizes equal to the sums over their children.
//!
//! # Example
//!
//! ```rust
//! use topic_hierarchy::cluster::LinkageTable;
//! use topic_hierarchy::hierarchy::{HealthCheck, HierarchyTree};
//! use topic_hierarchy::topic::Topic;
//!
//! let topics = vec![Topic::new("a", 0), Topic::new("b", 1)];
//! let mut table = LinkageTable::with_leaves(2);
//! table.add_merge(0, 1, 0.4);
//!
//! let tree = HierarchyTree::build(&topics, &table).unwrap();
//! let report = tree.health_check();
//! assert!(report.is_healthy(), "{}", report);
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::HierarchyTree;

/// Relative tolerance when comparing a node's value or size with its children's sum.
const SUM_TOLERANCE: f64 = 1e-9;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Something unusual but not necessarily wrong.
    Warning,
    /// A broken invariant.
    Error,
    /// The structure is not a tree.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A single problem found by a check.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Node involved, if any.
    pub node_id: Option<usize>,
    /// Extra detail.
    pub context: Option<String>,
}

impl ValidationIssue {
    /// Create a new validation issue.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            node_id: None,
            context: None,
        }
    }

    /// Attach the node involved.
    pub fn with_node(mut self, id: usize) -> Self {
        self.node_id = Some(id);
        self
    }

    /// Attach extra detail.
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        if let Some(id) = self.node_id {
            write!(f, " (node {})", id)?;
        }
        if let Some(ctx) = &self.context {
            write!(f, " - {}", ctx)?;
        }
        Ok(())
    }
}

/// Issues found by a check.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// All issues found.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an issue.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Add a warning about `node`.
    fn warn_node(&mut self, node: usize, message: impl Into<String>) {
        self.add(ValidationIssue::new(Severity::Warning, message).with_node(node));
    }

    /// Add an error about `node`.
    fn error_node(&mut self, node: usize, message: impl Into<String>) {
        self.add(ValidationIssue::new(Severity::Error, message).with_node(node));
    }

    /// No error or critical issue.
    pub fn is_healthy(&self) -> bool {
        !self.issues.iter().any(|i| i.severity >= Severity::Error)
    }

    /// No issue at all.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues of `min_severity` or worse.
    pub fn issues_at_level(&self, min_severity: Severity) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity >= min_severity)
            .collect()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return write!(f, "no issues found");
        }
        writeln!(f, "{} issue(s):", self.issues.len())?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}

/// Validation result plus shape statistics.
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Validation issues.
    pub validation: ValidationReport,
    /// Total number of nodes.
    pub node_count: usize,
    /// Number of leaf nodes.
    pub leaf_count: usize,
    /// Height of the root.
    pub max_depth: usize,
    /// Number of cluster-root nodes.
    pub cluster_roots: usize,
}

impl HealthReport {
    /// No error or critical issue.
    pub fn is_healthy(&self) -> bool {
        self.validation.is_healthy()
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} nodes ({} leaves), height {}, {} cluster roots",
            self.node_count, self.leaf_count, self.max_depth, self.cluster_roots
        )?;
        write!(f, "{}", self.validation)
    }
}

/// Types that can check their own structure.
pub trait HealthCheck {
    /// Run every check.
    fn health_check(&self) -> HealthReport;

    /// Quick check: returns true if healthy.
    fn is_healthy(&self) -> bool {
        self.health_check().is_healthy()
    }
}

impl HealthCheck for HierarchyTree {
    fn health_check(&self) -> HealthReport {
        let node_count = self.len();
        let mut parents: HashMap<usize, usize> = HashMap::new();
        let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
        for node in self.iter() {
            if let Some(p) = node.parent {
                let _ = parents.insert(node.id, p);
            }
            if !node.children().is_empty() {
                let _ = children.insert(node.id, node.children().to_vec());
            }
        }

        let mut validation = validate_tree_structure(&parents, &children, node_count);

        let flagged: Vec<usize> = self.iter().filter(|n| n.root).map(|n| n.id).collect();
        if flagged != [self.root()] {
            validation.add(
                ValidationIssue::new(Severity::Error, "root flag is not on the root alone")
                    .with_context(format!("flagged: {flagged:?}, root: {}", self.root())),
            );
        }

        for node in self.iter() {
            let kids = node.children();
            if node.is_leaf() {
                if node.height != 0 {
                    validation.error_node(node.id, "leaf height is not 0");
                }
                continue;
            }
            if kids.len() != 2 {
                validation.error_node(node.id, format!("internal node has {} children", kids.len()));
            }
            let Some(kid_nodes) = kids.iter().map(|&c| self.node(c)).collect::<Option<Vec<_>>>() else {
                validation.error_node(node.id, "child id does not exist");
                continue;
            };
            if kid_nodes.iter().any(|c| c.depth != node.depth + 1) {
                validation.error_node(node.id, "child depth is not parent depth + 1");
            }
            let expected_height = kid_nodes.iter().map(|c| c.height + 1).max().unwrap_or(0);
            if node.height != expected_height {
                validation.add(
                    ValidationIssue::new(Severity::Error, "height is not 1 + max child height")
                        .with_node(node.id)
                        .with_context(format!("height {}, expected {expected_height}", node.height)),
                );
            }
            let value_sum: f64 = kid_nodes.iter().map(|c| c.value).sum();
            if !close(node.value, value_sum) {
                validation.error_node(node.id, format!("value {} != children sum {value_sum}", node.value));
            }
            let size_sum: f64 = kid_nodes.iter().map(|c| c.size).sum();
            if !close(node.size, size_sum) {
                validation.error_node(node.id, format!("size {} != children sum {size_sum}", node.size));
            }
            if node.cluster_root && node.cluster_id.is_none() {
                validation.warn_node(node.id, "cluster root without a cluster id");
            }
        }

        HealthReport {
            validation,
            node_count,
            leaf_count: self.num_leaves(),
            max_depth: self.node(self.root()).map_or(0, |r| r.height),
            cluster_roots: self.iter().filter(|n| n.cluster_root).count(),
        }
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= SUM_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

/// Check that parent/child maps describe one rooted tree.
///
/// `parents` maps a node to its parent (no entry for roots), `children`
/// maps a node to its children. Reports missing or multiple roots, nodes
/// not reachable from a root, one-sided parent links and cycles.
pub fn validate_tree_structure(
    parents: &HashMap<usize, usize>,
    children: &HashMap<usize, Vec<usize>>,
    node_count: usize,
) -> ValidationReport {
    let mut report = ValidationReport::new();

    let mut roots: Vec<usize> = (0..node_count).filter(|n| !parents.contains_key(n)).collect();
    roots.sort_unstable();
    match roots.len() {
        0 if node_count > 0 => report.add(ValidationIssue::new(
            Severity::Critical,
            "no root node found, tree has cycles",
        )),
        0 | 1 => {}
        _ => report.add(
            ValidationIssue::new(Severity::Error, "multiple roots found")
                .with_context(format!("{roots:?}")),
        ),
    }

    // Walk from the roots; revisiting a node means a cycle or a shared child.
    let mut reachable = HashSet::new();
    let mut stack = roots.clone();
    let mut revisited = false;
    while let Some(node) = stack.pop() {
        if !reachable.insert(node) {
            revisited = true;
            continue;
        }
        if let Some(kids) = children.get(&node) {
            stack.extend(kids);
        }
    }
    if revisited {
        report.add(ValidationIssue::new(
            Severity::Critical,
            "a node is reachable along two paths",
        ));
    }

    let mut orphans: Vec<usize> = (0..node_count).filter(|n| !reachable.contains(n)).collect();
    orphans.sort_unstable();
    if !orphans.is_empty() {
        report.add(
            ValidationIssue::new(
                Severity::Error,
                format!("{} orphaned nodes not reachable from root", orphans.len()),
            )
            .with_context(format!("first few: {:?}", &orphans[..orphans.len().min(5)])),
        );
    }

    for (&child, &parent) in parents {
        let listed = children.get(&parent).is_some_and(|kids| kids.contains(&child));
        if !listed {
            report.add(
                ValidationIssue::new(Severity::Error, "child names a parent that does not list it")
                    .with_node(child)
                    .with_context(format!("parent: {parent}")),
            );
        }
    }

    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used, unused_results)]
mod tests {
    use super::*;
    use crate::cluster::{AgglomerativeClustering, Linkage, LinkageTable};
    use crate::similarity::SimilarityMatrix;
    use crate::topic::{Topic, Total};
    use proptest::prelude::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn test_issue_display() {
        let issue = ValidationIssue::new(Severity::Error, "bad height")
            .with_node(42)
            .with_context("height 3, expected 2");
        let s = issue.to_string();
        assert!(s.contains("ERROR"));
        assert!(s.contains("42"));
        assert!(s.contains("expected 2"));
    }

    #[test]
    fn test_validate_valid_tree() {
        let parents: HashMap<usize, usize> = [(0, 2), (1, 2)].into_iter().collect();
        let children: HashMap<usize, Vec<usize>> = [(2, vec![0, 1])].into_iter().collect();
        let report = validate_tree_structure(&parents, &children, 3);
        assert!(report.is_clean(), "{}", report);
    }

    #[test]
    fn test_validate_orphaned_cycle() {
        let parents: HashMap<usize, usize> = [(1, 2), (2, 1)].into_iter().collect();
        let children: HashMap<usize, Vec<usize>> =
            [(1, vec![2]), (2, vec![1])].into_iter().collect();
        let report = validate_tree_structure(&parents, &children, 3);
        assert!(!report.is_healthy());
        assert!(report.issues.iter().any(|i| i.message.contains("orphaned")));
    }

    #[test]
    fn test_validate_multiple_roots() {
        let parents: HashMap<usize, usize> = [(1, 0), (3, 2)].into_iter().collect();
        let children: HashMap<usize, Vec<usize>> =
            [(0, vec![1]), (2, vec![3])].into_iter().collect();
        let report = validate_tree_structure(&parents, &children, 4);
        assert!(!report.is_healthy());
        assert!(report.issues.iter().any(|i| i.message.contains("multiple roots")));
    }

    #[test]
    fn test_validate_one_sided_link() {
        let parents: HashMap<usize, usize> = [(0, 2), (1, 2)].into_iter().collect();
        let children: HashMap<usize, Vec<usize>> = [(2, vec![0])].into_iter().collect();
        let report = validate_tree_structure(&parents, &children, 3);
        assert!(report.issues_at_level(Severity::Error).len() >= 1);
    }

    #[test]
    fn test_annotated_tree_is_healthy() {
        let topics: Vec<Topic> = (0..4)
            .map(|i| {
                let mut t = Topic::new(format!("t{i}"), i);
                t.cluster_id = Some(if i < 2 { "0" } else { "1" }.to_string());
                t.add_total(Total::new("field-", 1.0 + i as f64));
                t
            })
            .collect();
        let mut table = LinkageTable::with_leaves(4);
        table.add_merge(0, 1, 0.1);
        table.add_merge(2, 3, 0.2);
        table.add_merge(4, 5, 0.7);
        let mut tree = HierarchyTree::build(&topics, &table).unwrap();
        tree.split_clusters();
        tree.set_values_and_normalise_sizes("field-", 5.0, 20.0).unwrap();
        tree.sort_children();

        let report = tree.health_check();
        assert!(report.is_healthy(), "{}", report);
        assert_eq!(report.max_depth, 2);
        assert_eq!(report.cluster_roots, 2);
    }

    proptest! {
        #[test]
        fn test_clustered_trees_are_healthy(
            n in 1usize..12,
            cells in proptest::collection::vec(0.0f64..1.0, 144),
            linkage in prop_oneof![Just(Linkage::Min), Just(Linkage::Max), Just(Linkage::Average)],
        ) {
            let m = SimilarityMatrix::from_fn(n, |r, c| match r.cmp(&c) {
                std::cmp::Ordering::Equal => 0.0,
                std::cmp::Ordering::Less => cells[r * 12 + c],
                std::cmp::Ordering::Greater => cells[c * 12 + r],
            });
            let table = AgglomerativeClustering::new()
                .with_linkage(linkage)
                .perform_clustering(&m)
                .unwrap();
            let topics: Vec<Topic> = (0..n)
                .map(|i| {
                    let mut t = Topic::new(i.to_string(), i);
                    t.cluster_id = Some((i % 3).to_string());
                    t
                })
                .collect();
            let mut tree = HierarchyTree::build(&topics, &table).unwrap();
            tree.split_clusters();
            tree.sort_children();

            let report = tree.health_check();
            prop_assert!(report.is_healthy(), "{}", report);
            prop_assert_eq!(report.node_count, 2 * n - 1);
            prop_assert_eq!(tree.leaves(tree.root()).len(), n);
        }
    }
}
