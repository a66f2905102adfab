//! # topic-hierarchy
//!
//! Post-processing for topic-model output: topic similarity, agglomerative
//! clustering, main/sub-topic assignment, distributions over document
//! metadata and nested hierarchies for layout.
//!
//! The library primitives are independent of files:
//!
//! - [`similarity`]: cosine, Hellinger and label-based similarity matrices.
//! - [`cluster`]: agglomerative clustering into a [`LinkageTable`].
//! - [`assignment`]: greedy sub-topic to main-topic assignment.
//! - [`distribution`]: topic totals and field distributions from documents.
//! - [`hierarchy`]: rooted trees built from a linkage table.
//!
//! [`pipeline`] chains them over topic and document JSON files, configured by
//! [`config::PipelineConfig`].
//!
//! ```
//! use topic_hierarchy::{AgglomerativeClustering, SimilarityMatrix};
//!
//! let sim = SimilarityMatrix::from_rows(vec![
//!     vec![1.0, 0.9, 0.1],
//!     vec![0.9, 1.0, 0.2],
//!     vec![0.1, 0.2, 1.0],
//! ])
//! .unwrap();
//! let table = AgglomerativeClustering::new()
//!     .perform_clustering(&sim.get_dissimilarity_matrix())
//!     .unwrap();
//! assert_eq!(table.len(), 2);
//! assert_eq!(table.records()[0].node1, 0);
//! ```

pub mod assignment;
pub mod cluster;
pub mod config;
pub mod distribution;
pub mod document;
/// Error types used across `topic_hierarchy`.
pub mod error;
pub mod export;
pub mod hierarchy;
pub mod pipeline;
pub mod rounding;
pub mod similarity;
pub mod topic;

pub use assignment::TopicHierarchyAssignment;
pub use cluster::{AgglomerativeClustering, Linkage, LinkageTable};
pub use distribution::DistributionSpec;
pub use document::{Document, DocumentSet};
pub use error::{Error, Result};
pub use hierarchy::{HealthCheck, HierarchyTree};
pub use similarity::SimilarityMatrix;
pub use topic::{Topic, TopicSet};
