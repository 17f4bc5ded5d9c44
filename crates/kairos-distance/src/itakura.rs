//! Itakura parallelogram geometry and its per-shape cache.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::{Arc, RwLock};

use tracing::debug;

/// Per-row column bounds of an Itakura parallelogram over a `len x len` grid.
///
/// Rows and columns are 1-based. The parallelogram has corners `(1, 1)`,
/// `(x, y)`, `(len, len)` and `(y, x)` (row, column), where
/// `x = (len - width) / 2 + 1` and `y = len - x + 1`. When `x >= y` it
/// degenerates to the main diagonal.
///
/// For every row `start(i) <= i <= end(i)`, and both bounds are
/// non-decreasing in `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItakuraParallelogram {
    len: usize,
    width: usize,
    // Index 0 is unused so rows can be addressed directly.
    start: Vec<usize>,
    end: Vec<usize>,
}

impl ItakuraParallelogram {
    /// Compute the parallelogram for series length `len` and absolute band
    /// width `width` (clamped to `len`).
    #[must_use]
    pub fn new(len: usize, width: usize) -> Self {
        let width = width.min(len);
        let mut start = vec![0; len + 1];
        let mut end = vec![0; len + 1];

        let x = (len - width) / 2 + 1;
        let y = (len + 1).saturating_sub(x);

        if x >= y {
            for i in 1..=len {
                start[i] = i;
                end[i] = i;
            }
        } else {
            // Upper boundary: (1,1) -> (x,y) -> (len,len); floor keeps it inside.
            // Lower boundary: (1,1) -> (y,x) -> (len,len); ceil keeps it inside.
            for i in 1..=len {
                let upper = if i < x {
                    1 + (i - 1) * (y - 1) / (x - 1)
                } else {
                    y + (i - x) * (x - 1) / (y - 1)
                };
                let lower = if i <= y {
                    1 + ((i - 1) * (x - 1)).div_ceil(y - 1)
                } else {
                    x + ((i - y) * (y - 1)).div_ceil(x - 1)
                };
                start[i] = lower.clamp(1, len);
                end[i] = upper.clamp(1, len);
            }
        }

        Self {
            len,
            width,
            start,
            end,
        }
    }

    /// Return the series length the parallelogram was built for.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Return true if the parallelogram covers a zero-length grid.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Return the (clamped) band width.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// First admitted column of row `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row > len`.
    #[must_use]
    pub fn start(&self, row: usize) -> usize {
        self.start[row]
    }

    /// Last admitted column of row `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row > len`.
    #[must_use]
    pub fn end(&self, row: usize) -> usize {
        self.end[row]
    }

    /// Inclusive column range of row `row`.
    #[must_use]
    pub fn column_range(&self, row: usize) -> RangeInclusive<usize> {
        self.start[row]..=self.end[row]
    }

    /// Last border index reachable from the origin corner.
    ///
    /// Border cells `(i, 0)` and `(0, i)` are admitted for `i` up to this
    /// value: one less than the extent of column 1 (row 1), or the full
    /// length when the parallelogram covers the grid. The shape is symmetric
    /// about the diagonal, so rows and columns share one reach.
    pub(crate) fn border_reach(&self) -> usize {
        if self.len == 0 {
            return 0;
        }
        let first_row_end = self.end[1];
        if first_row_end == self.len {
            self.len
        } else {
            first_row_end - 1
        }
    }
}

/// Thread-safe cache of parallelograms keyed by `(len, width)`.
///
/// Cloning yields an independent cache holding the same entries.
#[derive(Debug, Default)]
pub struct ParallelogramCache {
    entries: RwLock<HashMap<(usize, usize), Arc<ItakuraParallelogram>>>,
}

impl ParallelogramCache {
    /// Return the cached parallelogram for `(len, width)`, computing it on a miss.
    pub fn get(&self, len: usize, width: usize) -> Arc<ItakuraParallelogram> {
        let key = (len, width.min(len));
        {
            let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
            if let Some(p) = entries.get(&key) {
                return Arc::clone(p);
            }
        }

        let parallelogram = Arc::new(ItakuraParallelogram::new(key.0, key.1));
        debug!(len = key.0, width = key.1, "computed itakura parallelogram");
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        Arc::clone(entries.entry(key).or_insert(parallelogram))
    }

    /// Number of cached shapes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Return true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for ParallelogramCache {
    fn clone(&self) -> Self {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner()).clone();
        Self {
            entries: RwLock::new(entries),
        }
    }
}
