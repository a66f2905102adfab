//! Topic-topic similarity.
//!
//! # Matrices
//!
//! [`SimilarityMatrix`] is the square, symmetric form fed to clustering.
//! Clustering works on its dissimilarity `1 - s`.
//!
//! # Policies
//!
//! | Policy | Input | Output |
//! |--------|-------|--------|
//! | [`topic_cosine_similarity`] | document-topic weights of one model | square, 15 d.p. |
//! | [`hellinger_similarity_matrix`] | topic word distributions | square, 15 d.p. |
//! | [`document_cosine_similarity`] | document-topic weights of two models | sub x main, 4 d.p. |
//! | [`perceptual_similarity`] | top words of two models | sub x main, 4 d.p. |
//! | [`labels_l1_similarity`] | top words of two models | sub x main, 4 d.p. |
//!
//! The last three are the sub-to-main metrics selected by [`SubToMainMetric`].

mod cosine;
mod hellinger;
mod labels;
mod matrix;

use serde::{Deserialize, Serialize};

pub use cosine::{
    cosine_similarity, doc_topic_matrix, document_cosine_similarity, topic_cosine_similarity,
    topic_vectors, DEFAULT_THRESHOLD,
};
pub use hellinger::{
    document_topic_distances, hellinger_distance, hellinger_similarity_matrix, SparseVector,
    NORMALISATION_TOLERANCE,
};
pub use labels::{labels_l1_similarity, perceptual_similarity};
pub use matrix::SimilarityMatrix;

/// How sub-topics are compared with main topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubToMainMetric {
    /// Cosine over the two models' document distributions.
    Document,
    /// Top-word overlap with a penalty for unshared words.
    #[default]
    Perceptual,
    /// L1 distance between top-word vectors.
    #[serde(rename = "l1")]
    LabelsL1,
}

impl std::fmt::Display for SubToMainMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubToMainMetric::Document => write!(f, "document"),
            SubToMainMetric::Perceptual => write!(f, "perceptual"),
            SubToMainMetric::LabelsL1 => write!(f, "l1"),
        }
    }
}
