//! Matlab-style linkage table.
//!
//! Each record merges two clusters. Ids below the leaf count are leaves
//! (topic indices); the cluster created by record `i` gets id `n_leaves + i`.
//!
//! ```text
//!  record  node1 node2 distance        6
//!    0       0     1    0.10          / \
//!    1       2     3    0.20         4   5
//!    2       4     5    0.90        / \ / \
//!                                  0  1 2  3
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One merge: the two merged cluster ids and the merge distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkageRecord {
    /// First merged cluster (absorbing side).
    pub node1: usize,
    /// Second merged cluster.
    pub node2: usize,
    /// Dissimilarity at which the merge happened.
    pub distance: f64,
}

/// Ordered merge history, serialised as `[{node1, node2, distance}]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkageTable {
    records: Vec<LinkageRecord>,
}

impl LinkageTable {
    /// Empty table with room for `n_leaves - 1` merges.
    pub fn with_leaves(n_leaves: usize) -> Self {
        Self {
            records: Vec::with_capacity(n_leaves.saturating_sub(1)),
        }
    }

    /// Table from records.
    pub fn from_records(records: Vec<LinkageRecord>) -> Self {
        Self { records }
    }

    /// Record a merge.
    pub fn add_merge(&mut self, node1: usize, node2: usize, distance: f64) {
        self.records.push(LinkageRecord {
            node1,
            node2,
            distance,
        });
    }

    /// Number of merges.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no merge was recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, in merge order.
    pub fn records(&self) -> &[LinkageRecord] {
        &self.records
    }

    /// Merge distances, in merge order.
    pub fn distances(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.distance).collect()
    }

    /// Cluster id of each leaf when the hierarchy is split into `n_clusters`
    /// top-level branches.
    ///
    /// The walk starts at the last merge. Merges whose table position is
    /// above `len - n_clusters` open a new cluster number for the branch
    /// explored below them; the number reached at the end of one branch
    /// carries on into its sibling. A single leaf with no merges gets `"0"`.
    pub fn assign_cluster_ids(&self, n_leaves: usize, n_clusters: usize) -> Result<Vec<Option<String>>> {
        let mut ids: Vec<Option<usize>> = vec![None; n_leaves];
        if self.records.is_empty() {
            if let Some(first) = ids.first_mut() {
                *first = Some(0);
            }
        } else {
            let split = self.records.len() as i64 - n_clusters as i64;
            let _ = self.explore(self.records.len() - 1, 0, split, &mut ids)?;
        }
        Ok(ids.into_iter().map(|c| c.map(|c| c.to_string())).collect())
    }

    fn explore(
        &self,
        index: usize,
        cluster: usize,
        split: i64,
        ids: &mut [Option<usize>],
    ) -> Result<usize> {
        let n = ids.len();
        let record = self.records.get(index).ok_or(Error::IndexOutOfBounds {
            row: index,
            col: 0,
            size: self.records.len(),
        })?;
        let opens = index as i64 > split;
        let bump = |c: usize| if opens { c + 1 } else { c };

        match (record.node1 < n, record.node2 < n) {
            (true, true) => {
                ids[record.node1] = Some(cluster);
                ids[record.node2] = Some(cluster);
                Ok(cluster)
            }
            (true, false) => {
                ids[record.node1] = Some(cluster);
                self.explore(record.node2 - n, bump(cluster), split, ids)
            }
            (false, true) => {
                ids[record.node2] = Some(cluster);
                self.explore(record.node1 - n, bump(cluster), split, ids)
            }
            (false, false) => {
                let reached = self.explore(record.node1 - n, cluster, split, ids)?;
                self.explore(record.node2 - n, bump(reached), split, ids)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_pairs() -> LinkageTable {
        let mut t = LinkageTable::with_leaves(4);
        t.add_merge(0, 1, 0.1);
        t.add_merge(2, 3, 0.2);
        t.add_merge(4, 5, 0.9);
        t
    }

    fn ids(v: &[&str]) -> Vec<Option<String>> {
        v.iter().map(|s| Some((*s).to_string())).collect()
    }

    #[test]
    fn test_serializes_as_record_array() {
        let json = serde_json::to_value(two_pairs()).unwrap();
        assert_eq!(json[2], serde_json::json!({"node1": 4, "node2": 5, "distance": 0.9}));
        let back: LinkageTable = serde_json::from_value(json).unwrap();
        assert_eq!(back, two_pairs());
    }

    #[test]
    fn test_one_cluster() {
        let c = two_pairs().assign_cluster_ids(4, 1).unwrap();
        assert_eq!(c, ids(&["0", "0", "0", "0"]));
    }

    #[test]
    fn test_two_clusters_split_the_pairs() {
        let c = two_pairs().assign_cluster_ids(4, 2).unwrap();
        assert_eq!(c, ids(&["0", "0", "1", "1"]));
    }

    #[test]
    fn test_chain_of_merges() {
        // ((0,1),2),3 : 4 = (0,1), 5 = (4,2), 6 = (5,3)
        let mut t = LinkageTable::with_leaves(4);
        t.add_merge(0, 1, 0.1);
        t.add_merge(4, 2, 0.3);
        t.add_merge(5, 3, 0.5);
        let c = t.assign_cluster_ids(4, 2).unwrap();
        // root opens a cluster for its merged branch; leaf 3 keeps 0
        assert_eq!(c, ids(&["1", "1", "1", "0"]));
    }

    #[test]
    fn test_single_leaf_without_merges() {
        let c = LinkageTable::default().assign_cluster_ids(1, 3).unwrap();
        assert_eq!(c, ids(&["0"]));
    }

    #[test]
    fn test_dangling_merge_reference() {
        let mut t = LinkageTable::with_leaves(2);
        t.add_merge(0, 7, 0.1);
        assert!(t.assign_cluster_ids(2, 1).is_err());
    }
}
