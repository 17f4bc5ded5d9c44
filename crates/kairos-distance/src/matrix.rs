//! Precomputed distance and neighbour matrices.

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::distance::Distance;
use crate::error::DistanceError;
use crate::series::TimeSeries;

/// Symmetric distance matrix stored as a lower-triangular flat vector.
///
/// For `n` series, stores `n*(n-1)/2` distances. Access is symmetric:
/// `get(i, j) == get(j, i)`. Diagonal is always zero. Rows and columns are
/// addressed by series index.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DistanceMatrix {
    /// Create a matrix from pre-computed lower-triangular data.
    ///
    /// `data` must contain exactly `n*(n-1)/2` elements, stored as
    /// `data[row*(row-1)/2 + col]` where `row > col`.
    pub(crate) fn from_raw(n: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), n * n.saturating_sub(1) / 2);
        Self { n, data }
    }

    /// Build a matrix by evaluating `f(i, j)` for every pair `i > j`.
    pub fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 1..n {
            for j in 0..i {
                data.push(f(i, j));
            }
        }
        Self::from_raw(n, data)
    }

    /// Build a matrix from upper-triangular rows.
    ///
    /// Row `i` holds `distances[i][k] = d(i, i + k)` for `k` in `0..n-i`, so
    /// its first entry is the diagonal and is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::MalformedMatrixRow`] when row `i` does not
    /// have exactly `n - i` entries.
    pub fn from_upper_rows(rows: Vec<Vec<f64>>) -> Result<Self, DistanceError> {
        let n = rows.len();
        for (row, entries) in rows.iter().enumerate() {
            if entries.len() != n - row {
                return Err(DistanceError::MalformedMatrixRow {
                    row,
                    expected: n - row,
                    got: entries.len(),
                });
            }
        }
        Ok(Self::from_fn(n, |i, j| rows[j][i - j]))
    }

    /// Return the number of series in the matrix.
    #[must_use]
    pub fn len(&self) -> usize {
        self.n
    }

    /// Return true if the matrix is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Return the distance between series `i` and series `j`.
    ///
    /// Returns zero for `i == j` (diagonal).
    ///
    /// # Panics
    ///
    /// Panics if `i >= n` or `j >= n`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.n, "row index {i} out of bounds for matrix of size {}", self.n);
        assert!(j < self.n, "column index {j} out of bounds for matrix of size {}", self.n);
        if i == j {
            return 0.0;
        }
        let (row, col) = if i > j { (i, j) } else { (j, i) };
        self.data[row * (row - 1) / 2 + col]
    }

    /// Return all distances from series `i` to every series.
    #[must_use]
    pub fn row(&self, i: usize) -> Vec<f64> {
        (0..self.n).map(|j| self.get(i, j)).collect()
    }
}

/// Compute the pairwise distances of `series` in parallel.
///
/// Entry `(i, j)` is the distance between `series[i]` and `series[j]`, so
/// the matrix rows line up with series indices when the collection was
/// built with [`Dataset::indexed`][crate::Dataset::indexed].
///
/// # Errors
///
/// Propagates the first error of [`Distance::distance`].
#[instrument(skip_all, fields(measure = measure.name(), n = series.len()))]
pub fn pairwise<D, S>(measure: &D, series: &[S]) -> Result<DistanceMatrix, DistanceError>
where
    D: Distance + ?Sized,
    S: AsRef<TimeSeries> + Sync,
{
    let n = series.len();
    let total_pairs = n * n.saturating_sub(1) / 2;

    let data = (0..total_pairs)
        .into_par_iter()
        .map(|flat_idx| {
            // flat_idx = i*(i-1)/2 + j with i > j
            let mut i = ((1.0 + (1.0 + 8.0 * flat_idx as f64).sqrt()) / 2.0).floor() as usize;
            // Guard against rounding at large indices.
            while i * (i - 1) / 2 > flat_idx {
                i -= 1;
            }
            while (i + 1) * i / 2 <= flat_idx {
                i += 1;
            }
            let j = flat_idx - i * (i - 1) / 2;
            measure.distance(series[i].as_ref(), series[j].as_ref())
        })
        .collect::<Result<Vec<f64>, DistanceError>>()?;

    debug!(pairs = total_pairs, "pairwise matrix computed");
    Ok(DistanceMatrix::from_raw(n, data))
}

/// For every series, all series indices ordered by ascending distance.
///
/// Row `i` contains every index `0..n` exactly once, `i` itself included.
/// Ties are ordered by ascending index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighbourMatrix {
    rows: Vec<Vec<usize>>,
}

impl NeighbourMatrix {
    /// Wrap externally computed neighbour rows.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::NeighbourOutOfBounds`] if any row references
    /// an index `>= rows.len()`.
    pub fn new(rows: Vec<Vec<usize>>) -> Result<Self, DistanceError> {
        let len = rows.len();
        for (row, entries) in rows.iter().enumerate() {
            if let Some(&index) = entries.iter().find(|&&index| index >= len) {
                return Err(DistanceError::NeighbourOutOfBounds { row, index, len });
            }
        }
        Ok(Self { rows })
    }

    /// Rank every row of `distances` in parallel.
    #[must_use]
    #[instrument(skip_all, fields(n = distances.len()))]
    pub fn from_distances(distances: &DistanceMatrix) -> Self {
        let n = distances.len();
        let rows = (0..n)
            .into_par_iter()
            .map(|i| {
                let row = distances.row(i);
                let mut order: Vec<usize> = (0..n).collect();
                // Stable: equal distances keep ascending index order.
                order.sort_by(|&x, &y| row[x].total_cmp(&row[y]));
                order
            })
            .collect();
        Self { rows }
    }

    /// Return the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Return true if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Return the ranked neighbours of series `i`, if `i` is in range.
    #[must_use]
    pub fn row(&self, i: usize) -> Option<&[usize]> {
        self.rows.get(i).map(Vec::as_slice)
    }

    /// Iterate over the rows in index order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[usize]> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }
}
