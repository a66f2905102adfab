//! Hierarchy tree node.

use core::fmt;

use crate::topic::Topic;

/// A node of a [`HierarchyTree`](super::HierarchyTree).
///
/// Leaves carry the topic they stand for; internal nodes carry the ids of
/// their children. Topology is fixed at construction: only the annotations
/// (value, size, depth, height, cluster fields) change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyNode {
    /// Node id: topic position for leaves, `n_leaves + merge index` otherwise.
    pub id: usize,
    /// Topic or children.
    pub content: NodeContent,
    /// Parent id (`None` for the root).
    pub parent: Option<usize>,
    /// Leaf: distribution total (1.0 until values are set). Internal: sum of children.
    pub value: f64,
    /// Display size: the value, or its rescaled form after normalisation.
    pub size: f64,
    /// 0 at the root.
    pub depth: usize,
    /// 0 at leaves.
    pub height: usize,
    /// Cluster id shared by every leaf below, if there is exactly one.
    pub cluster_id: Option<String>,
    /// Topmost node of a subtree whose leaves share one cluster id.
    pub cluster_root: bool,
    /// Root flag.
    pub root: bool,
}

/// Content of a hierarchy node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeContent {
    /// Leaf node standing for one topic.
    Leaf(Box<Topic>),
    /// Internal node with its children, in merge order.
    Internal(Vec<usize>),
}

impl HierarchyNode {
    /// Create a leaf for `topic`, taking over its cluster id.
    pub fn leaf(id: usize, topic: Topic) -> Self {
        Self {
            id,
            cluster_id: topic.cluster_id.clone(),
            content: NodeContent::Leaf(Box::new(topic)),
            parent: None,
            value: 1.0,
            size: 1.0,
            depth: 0,
            height: 0,
            cluster_root: false,
            root: false,
        }
    }

    /// Create an internal node over `children`.
    pub fn internal(id: usize, children: Vec<usize>, value: f64, size: f64) -> Self {
        Self {
            id,
            content: NodeContent::Internal(children),
            parent: None,
            value,
            size,
            depth: 0,
            height: 0,
            cluster_id: None,
            cluster_root: false,
            root: false,
        }
    }

    /// Check if this is a leaf node.
    pub fn is_leaf(&self) -> bool {
        matches!(self.content, NodeContent::Leaf(_))
    }

    /// The topic, if this is a leaf.
    pub fn topic(&self) -> Option<&Topic> {
        match &self.content {
            NodeContent::Leaf(topic) => Some(topic),
            NodeContent::Internal(_) => None,
        }
    }

    /// The topic id, if this is a leaf.
    pub fn topic_id(&self) -> Option<&str> {
        self.topic().map(|t| t.topic_id.as_str())
    }

    /// Child ids (empty for leaves).
    pub fn children(&self) -> &[usize] {
        match &self.content {
            NodeContent::Leaf(_) => &[],
            NodeContent::Internal(children) => children,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<usize>> {
        match &mut self.content {
            NodeContent::Leaf(_) => None,
            NodeContent::Internal(children) => Some(children),
        }
    }
}

impl fmt::Display for HierarchyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            NodeContent::Leaf(topic) => write!(f, "Leaf[{}]: {}", self.id, topic.topic_id),
            NodeContent::Internal(children) => {
                write!(f, "Node[{}] H{}: {:?}", self.id, self.height, children)
            }
        }
    }
}
