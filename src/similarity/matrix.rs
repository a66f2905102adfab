//! Square topic-topic similarity matrix.

use crate::error::{Error, Result};

/// Symmetric square matrix of similarities in [0, 1].
///
/// Construction only checks squareness; symmetry and range are checked by
/// [`check_symmetric`](Self::check_symmetric) and
/// [`check_unit_range`](Self::check_unit_range), which clustering calls
/// before it runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    /// Row-major cells.
    cells: Vec<f64>,
    /// Number of rows (and columns).
    size: usize,
}

impl SimilarityMatrix {
    /// Build from nested rows. Every row must have as many cells as there are rows.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let size = rows.len();
        let mut cells = Vec::with_capacity(size * size);
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != size {
                return Err(Error::NotSquare {
                    row,
                    expected: size,
                    found: values.len(),
                });
            }
            cells.extend(values);
        }
        Ok(Self { cells, size })
    }

    /// Build a `size x size` matrix from a cell function.
    pub fn from_fn(size: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut cells = Vec::with_capacity(size * size);
        for row in 0..size {
            for col in 0..size {
                cells.push(f(row, col));
            }
        }
        Self { cells, size }
    }

    /// Number of rows (and columns).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Stored similarity at (row, col).
    pub fn get_value(&self, row: usize, col: usize) -> Result<f64> {
        if row >= self.size || col >= self.size {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                size: self.size,
            });
        }
        Ok(self.cells[row * self.size + col])
    }

    /// Matrix restricted to `indices`, in the given order.
    pub fn get_sub_matrix(&self, indices: &[usize]) -> Result<Self> {
        let mut cells = Vec::with_capacity(indices.len() * indices.len());
        for &row in indices {
            for &col in indices {
                cells.push(self.get_value(row, col)?);
            }
        }
        Ok(Self {
            cells,
            size: indices.len(),
        })
    }

    /// Matrix without the rows and columns in `removed` (e.g. generic topics).
    pub fn without_indices(&self, removed: &[usize]) -> Result<Self> {
        if let Some(&bad) = removed.iter().find(|&&i| i >= self.size) {
            return Err(Error::IndexOutOfBounds {
                row: bad,
                col: bad,
                size: self.size,
            });
        }
        let kept: Vec<usize> = (0..self.size).filter(|i| !removed.contains(i)).collect();
        self.get_sub_matrix(&kept)
    }

    /// Elementwise `1 - similarity`, same dimensions.
    pub fn get_dissimilarity_matrix(&self) -> Self {
        Self {
            cells: self.cells.iter().map(|v| 1.0 - v).collect(),
            size: self.size,
        }
    }

    /// Copy out as nested rows.
    pub fn similarity_rows(&self) -> Vec<Vec<f64>> {
        if self.size == 0 {
            return Vec::new();
        }
        self.cells.chunks(self.size).map(<[f64]>::to_vec).collect()
    }

    /// Row `row` as a slice.
    pub(crate) fn row(&self, row: usize) -> &[f64] {
        &self.cells[row * self.size..(row + 1) * self.size]
    }

    /// Fail on the first (row, col) where `m[row][col] != m[col][row]`.
    pub fn check_symmetric(&self) -> Result<()> {
        for row in 0..self.size {
            for col in (row + 1)..self.size {
                let value = self.cells[row * self.size + col];
                let mirrored = self.cells[col * self.size + row];
                if value != mirrored {
                    return Err(Error::AsymmetricMatrix {
                        row,
                        col,
                        value,
                        mirrored,
                    });
                }
            }
        }
        Ok(())
    }

    /// Fail on the first value outside [0, 1].
    pub fn check_unit_range(&self) -> Result<()> {
        for (i, &value) in self.cells.iter().enumerate() {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::ValueOutOfRange {
                    row: i / self.size,
                    col: i % self.size,
                    value,
                });
            }
        }
        Ok(())
    }
}
