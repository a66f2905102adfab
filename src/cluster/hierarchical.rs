//! Agglomerative clustering over a precomputed dissimilarity matrix.
//!
//! Starts from one cluster per topic and repeatedly merges the closest pair
//! until a single cluster is left, producing a [`LinkageTable`].
//!
//! # Linkage Methods
//!
//! | Linkage | Name | Cluster distance |
//! |---------|------|------------------|
//! | [`Linkage::Min`] | `min` | min d(a,b) for a∈A, b∈B |
//! | [`Linkage::Max`] | `max` | max d(a,b) |
//! | [`Linkage::Average`] | `avg` | mean d(a,b) |
//!
//! Cluster distances are always recomputed from the original pairwise
//! values of the member leaves, never from previously merged distances.
//!
//! # Ties
//!
//! The closest pair is found by scanning the working matrix row by row
//! (`x` ascending, then `y > x` ascending) with a strict `<`, so the first
//! pair at the minimum distance wins. The merged cluster keeps the position
//! of `x`; `y` is removed and later positions shift down by one.
//!
//! # Cost
//!
//! O(n³) time with a full rescan per merge; fine for the few hundred topics
//! of a topic model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::LinkageTable;
use crate::error::{Error, Result};
use crate::rounding;
use crate::similarity::SimilarityMatrix;

/// Merge loop cap. Models up to 1001 topics always finish.
pub const MAX_ITERATIONS: usize = 1000;

/// Linkage method for agglomerative clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Linkage {
    /// Minimum distance between members (single linkage).
    #[serde(rename = "min")]
    Min,
    /// Maximum distance between members (complete linkage).
    #[serde(rename = "max")]
    Max,
    /// Mean distance between members.
    #[default]
    #[serde(rename = "avg")]
    Average,
}

impl Linkage {
    /// Distance between two clusters given by their leaves.
    fn cluster_distance(self, original: &SimilarityMatrix, a: &[usize], b: &[usize]) -> f64 {
        let pairs = a
            .iter()
            .flat_map(|&la| b.iter().map(move |&lb| original.row(lb)[la]));
        match self {
            Linkage::Min => pairs.fold(f64::MAX, f64::min),
            Linkage::Max => pairs.fold(0.0, f64::max),
            Linkage::Average => {
                let count = (a.len() * b.len()) as f64;
                pairs.sum::<f64>() / count
            }
        }
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Linkage::Min => write!(f, "min"),
            Linkage::Max => write!(f, "max"),
            Linkage::Average => write!(f, "avg"),
        }
    }
}

impl FromStr for Linkage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "min" => Ok(Linkage::Min),
            "max" => Ok(Linkage::Max),
            "avg" => Ok(Linkage::Average),
            other => Err(Error::UnknownLinkage(other.to_string())),
        }
    }
}

/// Column of the working matrix: current cluster id and member leaves.
#[derive(Debug, Clone)]
struct Column {
    node: usize,
    leaves: Vec<usize>,
}

/// Agglomerative clustering.
#[derive(Debug, Clone)]
pub struct AgglomerativeClustering {
    /// Linkage method.
    linkage: Linkage,
    /// Merge loop cap.
    max_iterations: usize,
}

impl Default for AgglomerativeClustering {
    fn default() -> Self {
        Self::new()
    }
}

impl AgglomerativeClustering {
    /// Create a clusterer with average linkage.
    pub fn new() -> Self {
        Self {
            linkage: Linkage::Average,
            max_iterations: MAX_ITERATIONS,
        }
    }

    /// Set linkage method.
    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    /// Set the merge loop cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Linkage method in use.
    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    /// Cluster the items of a dissimilarity matrix.
    ///
    /// The matrix must be symmetric with values in [0, 1]; the diagonal is
    /// never read. Returns `n - 1` merges for `n` items (none for one item).
    /// Merge distances are rounded to 4 decimals, up.
    pub fn perform_clustering(&self, dissimilarity: &SimilarityMatrix) -> Result<LinkageTable> {
        dissimilarity.check_symmetric()?;
        dissimilarity.check_unit_range()?;

        let n = dissimilarity.size();
        let mut table = LinkageTable::with_leaves(n);
        let mut columns: Vec<Column> = (0..n)
            .map(|i| Column {
                node: i,
                leaves: vec![i],
            })
            .collect();
        let mut working = dissimilarity.similarity_rows();
        let mut next_node = n;
        let mut iterations = 0;

        while working.len() > 1 && iterations < self.max_iterations {
            iterations += 1;
            let (x_loc, y_loc, distance) = closest_pair(&working);

            let distance = rounding::weight(distance);
            table.add_merge(columns[x_loc].node, columns[y_loc].node, distance);
            debug!(
                node1 = columns[x_loc].node,
                node2 = columns[y_loc].node,
                new_node = next_node,
                distance,
                "merged clusters"
            );

            let absorbed = columns.remove(y_loc);
            columns[x_loc].node = next_node;
            columns[x_loc].leaves.extend(absorbed.leaves);
            next_node += 1;

            working = self.shrink(&working, &columns, dissimilarity, x_loc, y_loc);
        }

        if working.len() > 1 {
            warn!(
                remaining = working.len(),
                max_iterations = self.max_iterations,
                "merge loop stopped before reaching a single cluster"
            );
        }
        Ok(table)
    }

    /// Working matrix after merging `y_loc` into `x_loc`.
    ///
    /// Only the upper triangle is filled: cells involving the merged cluster
    /// are recomputed, all others are copied from the previous matrix.
    fn shrink(
        &self,
        previous: &[Vec<f64>],
        columns: &[Column],
        original: &SimilarityMatrix,
        x_loc: usize,
        y_loc: usize,
    ) -> Vec<Vec<f64>> {
        let size = previous.len() - 1;
        let shift = |i: usize| if i >= y_loc { i + 1 } else { i };
        let mut next = vec![vec![0.0; size]; size];
        for x in 0..size {
            for y in (x + 1)..size {
                next[x][y] = if y == x_loc {
                    self.linkage
                        .cluster_distance(original, &columns[x_loc].leaves, &columns[x].leaves)
                } else if x == x_loc {
                    self.linkage
                        .cluster_distance(original, &columns[x_loc].leaves, &columns[y].leaves)
                } else {
                    previous[shift(x)][shift(y)]
                };
            }
        }
        next
    }
}

/// First pair `(x, y)` with `x < y` at the minimum upper-triangle value.
fn closest_pair(working: &[Vec<f64>]) -> (usize, usize, f64) {
    let mut best = (0, 1, f64::MAX);
    for (x, row) in working.iter().enumerate() {
        for (y, &value) in row.iter().enumerate().skip(x + 1) {
            if value < best.2 {
                best = (x, y, value);
            }
        }
    }
    best
}
