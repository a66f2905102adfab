//! Hellinger distance over sparse word distributions.
//!
//! ```text
//! H(A, B) = ‖√A − √B‖₂ / √2
//! ```
//!
//! Inputs must be probability vectors. Unlike the cosine path, nothing is
//! normalised silently: a vector whose entries do not sum to 1 (±1e-4) is
//! rejected.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::rounding;
use crate::similarity::SimilarityMatrix;

/// Allowed deviation of a vector total from 1.
pub const NORMALISATION_TOLERANCE: f64 = 0.0001;

/// Sparse vector over a fixed-size index space (e.g. a vocabulary).
///
/// Only non-zero entries are stored; putting a zero removes the entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: BTreeMap<usize, f64>,
    dim: usize,
}

impl SparseVector {
    /// Empty vector of dimension `dim`.
    pub fn new(dim: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            dim,
        }
    }

    /// Build from (index, value) pairs.
    pub fn from_entries(dim: usize, entries: impl IntoIterator<Item = (usize, f64)>) -> Result<Self> {
        let mut v = Self::new(dim);
        for (i, value) in entries {
            v.put(i, value)?;
        }
        Ok(v)
    }

    /// Dimension of the index space.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of non-zero entries.
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Set entry `i`.
    pub fn put(&mut self, i: usize, value: f64) -> Result<()> {
        self.check_index(i)?;
        if value == 0.0 {
            let _ = self.entries.remove(&i);
        } else {
            let _ = self.entries.insert(i, value);
        }
        Ok(())
    }

    /// Entry `i`, zero when absent.
    pub fn get(&self, i: usize) -> Result<f64> {
        self.check_index(i)?;
        Ok(self.entries.get(&i).copied().unwrap_or(0.0))
    }

    /// Sum of entries.
    pub fn total(&self) -> f64 {
        self.entries.values().sum()
    }

    /// L1-normalised copy. An all-zero vector stays empty.
    pub fn normalise(&self) -> Self {
        let total = self.total();
        if total == 0.0 {
            return self.clone();
        }
        Self {
            entries: self.entries.iter().map(|(&i, &v)| (i, v / total)).collect(),
            dim: self.dim,
        }
    }

    /// Elementwise square root of the non-zero entries.
    pub fn sqrt(&self) -> Self {
        Self {
            entries: self.entries.iter().map(|(&i, &v)| (i, v.sqrt())).collect(),
            dim: self.dim,
        }
    }

    /// `self - other`.
    pub fn diff(&self, other: &Self) -> Result<Self> {
        self.check_dim(other)?;
        let mut out = self.clone();
        for (&i, &v) in &other.entries {
            let current = out.entries.get(&i).copied().unwrap_or(0.0);
            out.put(i, current - v)?;
        }
        Ok(out)
    }

    /// Dot product.
    pub fn dot(&self, other: &Self) -> Result<f64> {
        self.check_dim(other)?;
        let (small, large) = if self.nnz() <= other.nnz() {
            (self, other)
        } else {
            (other, self)
        };
        Ok(small
            .entries
            .iter()
            .filter_map(|(i, a)| large.entries.get(i).map(|b| a * b))
            .sum())
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f64 {
        self.entries.values().map(|v| v * v).sum::<f64>().sqrt()
    }

    fn check_index(&self, i: usize) -> Result<()> {
        if i >= self.dim {
            return Err(Error::IndexOutOfBounds {
                row: i,
                col: 0,
                size: self.dim,
            });
        }
        Ok(())
    }

    fn check_dim(&self, other: &Self) -> Result<()> {
        if self.dim != other.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                found: other.dim,
            });
        }
        Ok(())
    }

    fn check_normalised(&self) -> Result<()> {
        let total = self.total();
        if (total - 1.0).abs() > NORMALISATION_TOLERANCE {
            return Err(Error::NotNormalised { total });
        }
        Ok(())
    }
}

/// Hellinger distance between two probability vectors, in [0, 1].
pub fn hellinger_distance(a: &SparseVector, b: &SparseVector) -> Result<f64> {
    a.check_normalised()?;
    b.check_normalised()?;
    let d = a.sqrt().diff(&b.sqrt())?;
    Ok(d.norm() / std::f64::consts::SQRT_2)
}

/// Topic-topic similarity `1 - H` over topic word distributions.
///
/// Upper triangle computed and mirrored; cells rounded to 15 decimals, half-up.
pub fn hellinger_similarity_matrix(vectors: &[SparseVector]) -> Result<SimilarityMatrix> {
    if vectors.is_empty() {
        return Err(Error::EmptyInput);
    }
    let n = vectors.len();
    let mut cells = vec![0.0; n * n];
    for x in 0..n {
        for y in x..n {
            let v = rounding::matrix_cell(1.0 - hellinger_distance(&vectors[x], &vectors[y])?);
            cells[x * n + y] = v;
            cells[y * n + x] = v;
        }
    }
    Ok(SimilarityMatrix::from_fn(n, |r, c| cells[r * n + c]))
}

/// Distance from a document's word distribution to every topic.
///
/// An empty document (no words left) is at distance 1 from every topic.
pub fn document_topic_distances(topics: &[SparseVector], doc: &SparseVector) -> Result<Vec<f64>> {
    if doc.nnz() == 0 {
        return Ok(vec![1.0; topics.len()]);
    }
    let doc = doc.normalise();
    topics.iter().map(|t| hellinger_distance(t, &doc)).collect()
}
