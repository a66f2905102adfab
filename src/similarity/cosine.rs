//! Cosine similarity between topics over their document distributions.
//!
//! Each topic becomes a vector with one entry per document (the transposed
//! document-topic matrix). Entries below a cutoff are zeroed first, otherwise
//! the long tail of tiny weights every document carries for every topic
//! dominates the dot product.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{Error, Result};
use crate::rounding;
use crate::similarity::SimilarityMatrix;

/// Document weights below this are treated as zero.
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Initial value of both squared norms, keeps all-zero vectors finite.
const NORM_SEED: f64 = 1e-14;

/// Stack per-document topic distributions into a documents x topics matrix.
pub fn doc_topic_matrix<D: AsRef<[f64]>>(distributions: &[D]) -> Result<Array2<f64>> {
    let first = distributions.first().ok_or(Error::EmptyInput)?;
    let n_topics = first.as_ref().len();
    let mut m = Array2::zeros((distributions.len(), n_topics));
    for (doc, dist) in distributions.iter().enumerate() {
        let dist = dist.as_ref();
        if dist.len() != n_topics {
            return Err(Error::DimensionMismatch {
                expected: n_topics,
                found: dist.len(),
            });
        }
        for (topic, &w) in dist.iter().enumerate() {
            m[[doc, topic]] = w;
        }
    }
    Ok(m)
}

/// Transpose to topics x documents, zeroing entries below `threshold`.
pub fn topic_vectors(doc_topic: ArrayView2<'_, f64>, threshold: f64) -> Array2<f64> {
    doc_topic
        .t()
        .mapv(|w| if w < threshold { 0.0 } else { w })
}

/// `dot(a, b) / (|a| |b|)`, capped at 1.
///
/// Both squared norms start at a tiny seed, so an all-zero vector gives 0
/// instead of NaN.
pub fn cosine_similarity(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    let mut dot = 0.0;
    let mut norm_a = NORM_SEED;
    let mut norm_b = NORM_SEED;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).min(1.0)
}

/// Square topic-topic similarity over one model's documents.
///
/// Only the upper triangle (diagonal included) is computed; the lower one is
/// mirrored, so the result is exactly symmetric. Cells are rounded to 15
/// decimals, half-up.
pub fn topic_cosine_similarity(
    doc_topic: ArrayView2<'_, f64>,
    threshold: f64,
) -> Result<SimilarityMatrix> {
    if doc_topic.nrows() == 0 {
        return Err(Error::EmptyInput);
    }
    let vectors = topic_vectors(doc_topic, threshold);
    let n = vectors.nrows();
    let mut upper = vec![0.0; n * n];
    for x in 0..n {
        for y in x..n {
            let v = rounding::matrix_cell(cosine_similarity(
                vectors.index_axis(Axis(0), x),
                vectors.index_axis(Axis(0), y),
            ));
            upper[x * n + y] = v;
            upper[y * n + x] = v;
        }
    }
    Ok(SimilarityMatrix::from_fn(n, |r, c| upper[r * n + c]))
}

/// Rectangular similarity between the topics of two models fitted on the
/// same documents: row = topic of `x`, column = topic of `y`.
///
/// Rows of the two matrices must describe the same documents in the same
/// order. Cells are rounded to 4 decimals, up.
pub fn document_cosine_similarity(
    x_doc_topic: ArrayView2<'_, f64>,
    y_doc_topic: ArrayView2<'_, f64>,
    threshold: f64,
) -> Result<Vec<Vec<f64>>> {
    if x_doc_topic.nrows() != y_doc_topic.nrows() {
        return Err(Error::DimensionMismatch {
            expected: x_doc_topic.nrows(),
            found: y_doc_topic.nrows(),
        });
    }
    let xv = topic_vectors(x_doc_topic, threshold);
    let yv = topic_vectors(y_doc_topic, threshold);
    Ok(xv
        .outer_iter()
        .map(|a| {
            yv.outer_iter()
                .map(|b| rounding::weight(cosine_similarity(a, b)))
                .collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    #[test]
    fn test_self_similarity_is_one() {
        let v = array![0.5, 0.3, 0.9];
        let s = cosine_similarity(v.view(), v.view());
        assert!((s - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_orthogonal_is_zero() {
        let a = array![1.0, 0.0];
        let b = array![0.0, 1.0];
        assert_eq!(cosine_similarity(a.view(), b.view()), 0.0);
    }

    #[test]
    fn test_zero_vector_is_finite() {
        let a = array![0.0, 0.0];
        let b = array![0.4, 0.2];
        assert_eq!(cosine_similarity(a.view(), b.view()), 0.0);
    }

    #[test]
    fn test_threshold_drops_small_weights() {
        // docs x topics
        let m = array![[0.95, 0.05], [0.05, 0.95]];
        let v = topic_vectors(m.view(), DEFAULT_THRESHOLD);
        assert_eq!(v, array![[0.95, 0.0], [0.0, 0.95]]);

        let sim = topic_cosine_similarity(m.view(), DEFAULT_THRESHOLD).unwrap();
        assert_eq!(sim.get_value(0, 1).unwrap(), 0.0);
        assert!((sim.get_value(0, 0).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_doc_topic_matrix_checks_lengths() {
        let docs = vec![vec![0.5, 0.5], vec![1.0]];
        assert!(matches!(
            doc_topic_matrix(&docs),
            Err(Error::DimensionMismatch { expected: 2, found: 1 })
        ));
        let empty: Vec<Vec<f64>> = Vec::new();
        assert!(matches!(doc_topic_matrix(&empty), Err(Error::EmptyInput)));
    }

    #[test]
    fn test_document_similarity_shape() {
        let sub = array![[0.8, 0.2, 0.0], [0.1, 0.1, 0.8], [0.7, 0.3, 0.0]];
        let main = array![[0.9, 0.1], [0.2, 0.8], [0.9, 0.1]];
        let sim = document_cosine_similarity(sub.view(), main.view(), DEFAULT_THRESHOLD).unwrap();
        assert_eq!(sim.len(), 3);
        assert_eq!(sim[0].len(), 2);
        assert!(sim[0][0] > sim[0][1]);
        assert!(sim[2][1] > sim[2][0]);
    }

    proptest! {
        #[test]
        fn test_topic_similarity_is_symmetric(
            weights in proptest::collection::vec(0.0f64..1.0, 5 * 4)
        ) {
            let m = Array2::from_shape_vec((5, 4), weights).unwrap();
            let sim = topic_cosine_similarity(m.view(), DEFAULT_THRESHOLD).unwrap();
            prop_assert!(sim.check_symmetric().is_ok());
            for r in 0..4 {
                for c in 0..4 {
                    let v = sim.get_value(r, c).unwrap();
                    prop_assert!((0.0..=1.0).contains(&v));
                }
            }
        }
    }
}
