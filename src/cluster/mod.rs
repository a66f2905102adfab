//! Agglomerative clustering of topics.
//!
//! Bottom-up: start with each topic as its own cluster, repeatedly merge
//! the two closest clusters until one remains. The merge history is a
//! [`LinkageTable`], a binary tree that can be split into any number of
//! top-level clusters with [`LinkageTable::assign_cluster_ids`].
//!
//! ```text
//!          6 (0.825)
//!         / \
//!   (0.1) 4   5 (0.2)
//!        / \ / \
//!       0  1 2  3     topics
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use topic_hierarchy::cluster::{AgglomerativeClustering, Linkage};
//! use topic_hierarchy::similarity::SimilarityMatrix;
//!
//! let similarity = SimilarityMatrix::from_rows(vec![
//!     vec![1.0, 0.9, 0.1],
//!     vec![0.9, 1.0, 0.2],
//!     vec![0.1, 0.2, 1.0],
//! ])
//! .unwrap();
//!
//! let table = AgglomerativeClustering::new()
//!     .with_linkage(Linkage::Average)
//!     .perform_clustering(&similarity.get_dissimilarity_matrix())
//!     .unwrap();
//! assert_eq!(table.len(), 2);
//!
//! let ids = table.assign_cluster_ids(3, 2).unwrap();
//! assert_eq!(ids[0], ids[1]);
//! assert_ne!(ids[0], ids[2]);
//! ```

mod hierarchical;
mod linkage;

pub use hierarchical::{AgglomerativeClustering, Linkage, MAX_ITERATIONS};
pub use linkage::{LinkageRecord, LinkageTable};
