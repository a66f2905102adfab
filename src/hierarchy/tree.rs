//! Hierarchy tree built from a linkage table.
//!
//! Nodes live in one arena indexed by their linkage numbering: leaves are
//! `0..n` in topic order, the node created by merge `i` is `n + i`, and the
//! last merge is the root.
//!
//! ```text
//!            6  root, depth 0, height 2
//!           / \
//!          4   5
//!         / \ / \
//!        0  1 2  3  leaves, depth 2, height 0
//! ```
//!
//! Construction sets depth and height. Values, sizes, cluster roots and
//! child order are separate passes, run by the mapping stage in the order
//! `split_clusters`, `set_values_and_normalise_sizes`, `sort_children`.

use std::collections::BTreeSet;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::node::{HierarchyNode, NodeContent};
use crate::cluster::LinkageTable;
use crate::error::{Error, Result};
use crate::topic::Topic;

/// A rooted binary tree over topics.
#[derive(Debug, Clone)]
pub struct HierarchyTree {
    /// Arena of nodes, leaves first.
    nodes: Vec<HierarchyNode>,
    /// Root id.
    root: usize,
    /// Number of leaf nodes.
    num_leaves: usize,
}

impl HierarchyTree {
    /// Build the tree of `topics` merged by `table`.
    ///
    /// Topics with a negative numeric cluster id are generic and left out
    /// before numbering, as they are left out of clustering. The table must
    /// hold exactly one merge per remaining topic but one, and every node
    /// must be merged at most once.
    pub fn build(topics: &[Topic], table: &LinkageTable) -> Result<Self> {
        let leaves: Vec<&Topic> = topics
            .iter()
            .filter(|t| !t.numeric_cluster_id().is_some_and(|c| c < 0))
            .collect();
        if leaves.len() < topics.len() {
            debug!(dropped = topics.len() - leaves.len(), "left generic topics out of the hierarchy");
        }
        if leaves.is_empty() {
            return Err(Error::EmptyInput);
        }

        let n = leaves.len();
        if table.len() != n - 1 {
            return Err(Error::DimensionMismatch {
                expected: n - 1,
                found: table.len(),
            });
        }

        let mut nodes: Vec<HierarchyNode> = Vec::with_capacity(2 * n - 1);
        for (i, topic) in leaves.into_iter().enumerate() {
            if topic.cluster_id.is_none() {
                warn!(topic = %topic.topic_id, "topic has no cluster id, run clustering before mapping");
            }
            nodes.push(HierarchyNode::leaf(i, topic.clone()));
        }

        for (merge, record) in table.records().iter().enumerate() {
            let id = n + merge;
            let children = vec![record.node1, record.node2];
            for &child in &children {
                let node = nodes.get_mut(child).ok_or(Error::IndexOutOfBounds {
                    row: merge,
                    col: child,
                    size: id,
                })?;
                if node.parent.is_some() {
                    return Err(Error::InvalidParameter {
                        name: "linkageTable",
                        message: format!("node {child} is merged more than once"),
                    });
                }
                node.parent = Some(id);
            }
            let value = children.iter().map(|&c| nodes[c].value).sum();
            let size = children.iter().map(|&c| nodes[c].size).sum();
            nodes.push(HierarchyNode::internal(id, children, value, size));
        }

        let root = nodes.len() - 1;
        nodes[root].root = true;
        let mut tree = Self {
            nodes,
            root,
            num_leaves: n,
        };
        let _ = tree.set_depth();
        Ok(tree)
    }

    /// Number of total nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no node. Never true for a built tree.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of leaf nodes.
    pub fn num_leaves(&self) -> usize {
        self.num_leaves
    }

    /// Root id.
    pub fn root(&self) -> usize {
        self.root
    }

    /// Node by id.
    pub fn node(&self, id: usize) -> Option<&HierarchyNode> {
        self.nodes.get(id)
    }

    /// All nodes, leaves first.
    pub fn iter(&self) -> impl Iterator<Item = &HierarchyNode> {
        self.nodes.iter()
    }

    /// Set every node's depth from the root and height from the leaves.
    ///
    /// Returns the height of the root.
    pub fn set_depth(&mut self) -> usize {
        let root = self.root;
        self.nodes[root].depth = 0;
        for id in self.pre_order(root) {
            let depth = self.nodes[id].depth + 1;
            for c in self.nodes[id].children().to_vec() {
                self.nodes[c].depth = depth;
            }
        }
        for id in self.post_order(root) {
            let height = self.nodes[id]
                .children()
                .iter()
                .map(|&c| self.nodes[c].height + 1)
                .max()
                .unwrap_or(0);
            self.nodes[id].height = height;
        }
        self.nodes[root].height
    }

    /// Set leaf values from the topic total `total_id`; internal values are
    /// the sum of their leaves. Sizes are reset to the values.
    ///
    /// Returns the leaf values, left to right. Fails on the first leaf whose
    /// topic has no such total.
    pub fn set_values(&mut self, total_id: &str) -> Result<Vec<f64>> {
        for id in self.post_order(self.root) {
            let value = match &self.nodes[id].content {
                NodeContent::Leaf(topic) => {
                    topic
                        .find_total(total_id)
                        .ok_or_else(|| Error::MissingTotal {
                            topic_id: topic.topic_id.clone(),
                            total_id: total_id.to_string(),
                        })?
                        .weight
                }
                NodeContent::Internal(children) => {
                    children.iter().map(|&c| self.nodes[c].value).sum()
                }
            };
            let node = &mut self.nodes[id];
            node.value = value;
            node.size = value;
        }
        Ok(self
            .leaves(self.root)
            .into_iter()
            .map(|id| self.nodes[id].value)
            .collect())
    }

    /// Set values from `total_id`, then rescale leaf sizes linearly from the
    /// domain `[1, max leaf value]` onto `[range_min, range_max]`.
    ///
    /// Internal sizes are the sum of their leaves' rescaled sizes. When every
    /// leaf value is 1 the domain is empty and sizes stay equal to values.
    pub fn set_values_and_normalise_sizes(
        &mut self,
        total_id: &str,
        range_min: f64,
        range_max: f64,
    ) -> Result<()> {
        let values = self.set_values(total_id)?;
        let min_d = 1.0;
        let max_d = values.iter().copied().fold(f64::MIN, f64::max);
        let ran_d = max_d - min_d;
        let ran_r = range_max - range_min;
        if ran_d != 0.0 {
            self.normalise_sizes(min_d, ran_d, range_min, ran_r);
        } else {
            debug!(total_id, "degenerate value domain, sizes left as values");
        }
        Ok(())
    }

    fn normalise_sizes(&mut self, min_d: f64, ran_d: f64, min_r: f64, ran_r: f64) {
        for id in self.post_order(self.root) {
            let size = match &self.nodes[id].content {
                NodeContent::Leaf(_) => min_r + ((self.nodes[id].value - min_d) / ran_d) * ran_r,
                NodeContent::Internal(children) => {
                    children.iter().map(|&c| self.nodes[c].size).sum()
                }
            };
            self.nodes[id].size = size;
        }
    }

    /// Cluster annotations the tree would get from [`split_clusters`](Self::split_clusters),
    /// as `(cluster_id, cluster_root)` per node id. Does not touch the tree.
    ///
    /// Bottom-up: a leaf reports its topic's cluster id and is a cluster
    /// root. An internal node whose children all report the same non-null
    /// id takes that id and the cluster-root flag from them; otherwise it
    /// reports no id and its children keep their flags.
    pub fn cluster_split(&self) -> Vec<(Option<String>, bool)> {
        let mut out: Vec<(Option<String>, bool)> = vec![(None, false); self.nodes.len()];
        for id in self.post_order(self.root) {
            match &self.nodes[id].content {
                NodeContent::Leaf(topic) => out[id] = (topic.cluster_id.clone(), true),
                NodeContent::Internal(children) => {
                    let ids: BTreeSet<&Option<String>> = children.iter().map(|&c| &out[c].0).collect();
                    let unified = match ids.into_iter().collect::<Vec<_>>().as_slice() {
                        [Some(cluster)] => Some(cluster.clone()),
                        _ => None,
                    };
                    if unified.is_some() {
                        for &c in children {
                            out[c].1 = false;
                        }
                        out[id] = (unified, true);
                    }
                }
            }
        }
        out
    }

    /// Mark cluster roots and propagate unanimous cluster ids upwards.
    ///
    /// Returns the root's cluster id.
    pub fn split_clusters(&mut self) -> Option<String> {
        let split = self.cluster_split();
        for (node, (cluster_id, cluster_root)) in self.nodes.iter_mut().zip(split) {
            node.cluster_id = cluster_id;
            node.cluster_root = cluster_root;
        }
        self.nodes[self.root].cluster_id.clone()
    }

    /// Order every internal node's children by descending value, keeping
    /// merge order among equal values.
    pub fn sort_children(&mut self) {
        let values: Vec<f64> = self.nodes.iter().map(|n| n.value).collect();
        for node in &mut self.nodes {
            if let Some(children) = node.children_mut() {
                children.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
            }
        }
    }

    /// Ids in the order of a stack walk from `from`: a node is visited when
    /// popped, then its children are pushed in order, so the last child is
    /// visited first. Parents always come before their children.
    pub fn pre_order(&self, from: usize) -> Vec<usize> {
        let mut order = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend_from_slice(self.nodes[id].children());
        }
        order
    }

    /// Left-to-right post-order from `from`, built with two stacks.
    /// Children always come before their parents.
    pub fn post_order(&self, from: usize) -> Vec<usize> {
        let mut stack = vec![from];
        let mut next = Vec::new();
        while let Some(id) = stack.pop() {
            next.push(id);
            stack.extend_from_slice(self.nodes[id].children());
        }
        next.reverse();
        next
    }

    /// Run `f` on every node below `from` (included) in [`pre_order`](Self::pre_order).
    pub fn each_before(&mut self, from: usize, mut f: impl FnMut(&mut HierarchyNode)) {
        for id in self.pre_order(from) {
            f(&mut self.nodes[id]);
        }
    }

    /// Run `f` on every node below `from` (included) in [`post_order`](Self::post_order).
    pub fn each_after(&mut self, from: usize, mut f: impl FnMut(&mut HierarchyNode)) {
        for id in self.post_order(from) {
            f(&mut self.nodes[id]);
        }
    }

    /// `from` and every node below it, by ascending depth. Nodes at the same
    /// depth keep their left-to-right order.
    pub fn descendants(&self, from: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id].children().iter().rev());
        }
        out.sort_by_key(|&id| self.nodes[id].depth);
        out
    }

    /// `from` and every node above it up to the root, by ascending height.
    pub fn ancestors(&self, from: usize) -> Vec<usize> {
        let mut out = vec![from];
        let mut current = from;
        while let Some(parent) = self.nodes[current].parent {
            out.push(parent);
            current = parent;
        }
        out.sort_by_key(|&id| self.nodes[id].height);
        out
    }

    /// Leaves below `from`, left to right.
    pub fn leaves(&self, from: usize) -> Vec<usize> {
        self.post_order(from)
            .into_iter()
            .filter(|&id| self.nodes[id].is_leaf())
            .collect()
    }

    /// Nested JSON document of the whole tree, for a bubble-layout renderer.
    ///
    /// Each node is `{leaf, value, size, depth, height, clusterRoot}` plus
    /// `topicId` and `labels` on leaves, `clusterId` when set, and
    /// `children` on internal nodes.
    pub fn to_json(&self) -> Value {
        let mut built: Vec<Option<Value>> = vec![None; self.nodes.len()];
        for id in self.post_order(self.root) {
            let node = &self.nodes[id];
            let mut obj = Map::new();
            if let Some(topic) = node.topic() {
                let _ = obj.insert("topicId".into(), json!(topic.topic_id));
                let _ = obj.insert("labels".into(), json!(topic.top_words));
            }
            let _ = obj.insert("leaf".into(), json!(node.is_leaf()));
            let _ = obj.insert("value".into(), json!(node.value));
            let _ = obj.insert("size".into(), json!(node.size));
            let _ = obj.insert("depth".into(), json!(node.depth));
            let _ = obj.insert("height".into(), json!(node.height));
            if let Some(cluster) = &node.cluster_id {
                let _ = obj.insert("clusterId".into(), json!(cluster));
            }
            let _ = obj.insert("clusterRoot".into(), json!(node.cluster_root));
            if !node.is_leaf() {
                let children: Vec<Value> = node
                    .children()
                    .iter()
                    .filter_map(|&c| built[c].take())
                    .collect();
                let _ = obj.insert("children".into(), Value::Array(children));
            }
            built[id] = Some(Value::Object(obj));
        }
        built[self.root].take().unwrap_or(Value::Null)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::topic::Total;

    fn topic(i: usize, cluster: &str, total: f64) -> Topic {
        let mut t = Topic::new(format!("t{i}"), i);
        t.cluster_id = Some(cluster.to_string());
        t.add_total(Total::new("year-", total));
        t
    }

    /// ((0,1),(2,3))
    fn balanced(clusters: [&str; 4], totals: [f64; 4]) -> HierarchyTree {
        let topics: Vec<Topic> = (0..4).map(|i| topic(i, clusters[i], totals[i])).collect();
        let mut table = LinkageTable::with_leaves(4);
        table.add_merge(0, 1, 0.1);
        table.add_merge(2, 3, 0.2);
        table.add_merge(4, 5, 0.8);
        HierarchyTree::build(&topics, &table).unwrap()
    }

    #[test]
    fn test_depth_and_height() {
        let mut tree = balanced(["0"; 4], [1.0; 4]);
        assert_eq!(tree.set_depth(), 2);
        assert_eq!(tree.root(), 6);
        for leaf in 0..4 {
            let n = tree.node(leaf).unwrap();
            assert_eq!((n.depth, n.height), (2, 0));
        }
        assert_eq!(tree.node(4).unwrap().height, 1);
        assert_eq!(tree.node(6).unwrap().depth, 0);
        assert!(tree.node(6).unwrap().root);
        assert_eq!(tree.iter().filter(|n| n.root).count(), 1);
    }

    #[test]
    fn test_construction_values_count_leaves() {
        let tree = balanced(["0"; 4], [1.0; 4]);
        assert_eq!(tree.node(4).unwrap().value, 2.0);
        assert_eq!(tree.node(6).unwrap().value, 4.0);
        assert_eq!(tree.node(1).unwrap().parent, Some(4));
    }

    #[test]
    fn test_values_and_normalised_sizes() {
        let mut tree = balanced(["0"; 4], [1.0, 3.0, 5.0, 1.0]);
        tree.set_values_and_normalise_sizes("year-", 10.0, 50.0).unwrap();
        let sizes: Vec<f64> = (0..7).map(|i| tree.node(i).unwrap().size).collect();
        assert_eq!(sizes, vec![10.0, 30.0, 50.0, 10.0, 40.0, 60.0, 100.0]);
        assert_eq!(tree.node(6).unwrap().value, 10.0);
        assert_eq!(tree.node(5).unwrap().value, 6.0);
    }

    #[test]
    fn test_degenerate_domain_keeps_values() {
        let mut tree = balanced(["0"; 4], [1.0; 4]);
        tree.set_values_and_normalise_sizes("year-", 10.0, 50.0).unwrap();
        assert_eq!(tree.node(0).unwrap().size, 1.0);
        assert_eq!(tree.node(6).unwrap().size, 4.0);
    }

    #[test]
    fn test_missing_total_is_fatal() {
        let mut tree = balanced(["0"; 4], [1.0; 4]);
        let err = tree.set_values("country-").unwrap_err();
        assert!(matches!(err, Error::MissingTotal { ref topic_id, .. } if topic_id == "t0"));
    }

    #[test]
    fn test_split_clusters_two_branches() {
        let mut tree = balanced(["0", "0", "1", "1"], [1.0; 4]);
        assert_eq!(tree.split_clusters(), None);
        let roots: Vec<usize> = tree.iter().filter(|n| n.cluster_root).map(|n| n.id).collect();
        assert_eq!(roots, vec![4, 5]);
        assert_eq!(tree.node(4).unwrap().cluster_id.as_deref(), Some("0"));
        assert_eq!(tree.node(5).unwrap().cluster_id.as_deref(), Some("1"));
    }

    #[test]
    fn test_split_clusters_single_cluster_moves_to_root() {
        let mut tree = balanced(["2"; 4], [1.0; 4]);
        assert_eq!(tree.split_clusters().as_deref(), Some("2"));
        let roots: Vec<usize> = tree.iter().filter(|n| n.cluster_root).map(|n| n.id).collect();
        assert_eq!(roots, vec![6]);
    }

    #[test]
    fn test_split_clusters_mixed_pair_keeps_leaf_roots() {
        let mut tree = balanced(["0", "1", "1", "1"], [1.0; 4]);
        let _ = tree.split_clusters();
        let roots: Vec<usize> = tree.iter().filter(|n| n.cluster_root).map(|n| n.id).collect();
        assert_eq!(roots, vec![0, 1, 5]);
        assert_eq!(tree.node(4).unwrap().cluster_id, None);
    }

    #[test]
    fn test_leaf_without_cluster_blocks_promotion() {
        let mut topics: Vec<Topic> = (0..2).map(|i| topic(i, "0", 1.0)).collect();
        topics[1].cluster_id = None;
        let mut table = LinkageTable::with_leaves(2);
        table.add_merge(0, 1, 0.3);
        let mut tree = HierarchyTree::build(&topics, &table).unwrap();
        assert_eq!(tree.split_clusters(), None);
        assert!(tree.node(0).unwrap().cluster_root);
        assert!(!tree.node(2).unwrap().cluster_root);
    }

    #[test]
    fn test_cluster_split_is_pure() {
        let tree = balanced(["0", "0", "1", "1"], [1.0; 4]);
        let split = tree.cluster_split();
        assert_eq!(split[4], (Some("0".to_string()), true));
        assert!(tree.iter().all(|n| !n.cluster_root));
    }

    #[test]
    fn test_sort_children_by_descending_value() {
        let mut tree = balanced(["0"; 4], [1.0, 3.0, 5.0, 1.0]);
        tree.set_values("year-").unwrap();
        tree.sort_children();
        assert_eq!(tree.node(6).unwrap().children(), &[5, 4]);
        assert_eq!(tree.node(4).unwrap().children(), &[1, 0]);
        assert_eq!(tree.node(5).unwrap().children(), &[2, 3]);
    }

    #[test]
    fn test_traversal_orders() {
        let mut tree = balanced(["0"; 4], [1.0; 4]);
        assert_eq!(tree.pre_order(6), vec![6, 5, 3, 2, 4, 1, 0]);
        assert_eq!(tree.post_order(6), vec![0, 1, 4, 2, 3, 5, 6]);
        assert_eq!(tree.leaves(6), vec![0, 1, 2, 3]);
        assert_eq!(tree.descendants(6), vec![6, 4, 5, 0, 1, 2, 3]);
        assert_eq!(tree.descendants(5), vec![5, 2, 3]);
        assert_eq!(tree.ancestors(2), vec![2, 5, 6]);

        let mut seen = Vec::new();
        tree.each_after(6, |n| seen.push(n.id));
        assert_eq!(seen, tree.post_order(6));
        tree.each_before(4, |n| n.size = 0.0);
        assert_eq!(tree.node(4).unwrap().size, 0.0);
        assert_eq!(tree.node(5).unwrap().size, 2.0);
    }

    #[test]
    fn test_generic_topics_are_left_out() {
        let mut topics: Vec<Topic> = (0..3).map(|i| topic(i, "0", 1.0)).collect();
        topics[1].cluster_id = Some("-1".to_string());
        let mut table = LinkageTable::with_leaves(2);
        table.add_merge(0, 1, 0.4);
        let tree = HierarchyTree::build(&topics, &table).unwrap();
        assert_eq!(tree.num_leaves(), 2);
        assert_eq!(tree.node(1).unwrap().topic_id(), Some("t2"));
    }

    #[test]
    fn test_single_topic_tree() {
        let tree = HierarchyTree::build(&[topic(0, "0", 1.0)], &LinkageTable::default()).unwrap();
        assert_eq!(tree.len(), 1);
        assert!(tree.node(0).unwrap().root);
        assert_eq!(tree.leaves(0), vec![0]);
    }

    #[test]
    fn test_rejects_bad_tables() {
        let topics: Vec<Topic> = (0..3).map(|i| topic(i, "0", 1.0)).collect();
        let mut short = LinkageTable::with_leaves(3);
        short.add_merge(0, 1, 0.1);
        assert!(matches!(
            HierarchyTree::build(&topics, &short),
            Err(Error::DimensionMismatch { expected: 2, found: 1 })
        ));

        let mut reused = LinkageTable::with_leaves(3);
        reused.add_merge(0, 1, 0.1);
        reused.add_merge(0, 2, 0.2);
        assert!(HierarchyTree::build(&topics, &reused).is_err());

        let mut forward = LinkageTable::with_leaves(3);
        forward.add_merge(0, 4, 0.1);
        forward.add_merge(1, 2, 0.2);
        assert!(matches!(
            HierarchyTree::build(&topics, &forward),
            Err(Error::IndexOutOfBounds { .. })
        ));

        assert!(matches!(
            HierarchyTree::build(&[], &LinkageTable::default()),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn test_to_json_nesting() {
        let mut tree = balanced(["0", "0", "1", "1"], [1.0; 4]);
        let _ = tree.split_clusters();
        let json = tree.to_json();
        assert_eq!(json["leaf"], false);
        assert_eq!(json["height"], 2);
        assert!(json.get("clusterId").is_none());
        let left = &json["children"][0];
        assert_eq!(left["clusterId"], "0");
        assert_eq!(left["clusterRoot"], true);
        assert_eq!(left["children"][1]["topicId"], "t1");
        assert_eq!(left["children"][1]["depth"], 2);
    }
}
