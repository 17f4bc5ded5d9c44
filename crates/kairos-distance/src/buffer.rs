//! Rolling two-row buffer shared by the elastic dynamic programs.

use crate::constraint::Band;

/// Two full-width rows of a banded DP grid, swapped after every row.
///
/// Slot `j` holds column `j` of the extended grid (column 0 is the border).
/// Only the cells a row actually reads are (re)initialised, so each row
/// costs `O(band width)` besides the one-off allocation.
///
/// Per row `i` spanning columns `start..=end`:
/// - `curr[start - 1]` is the left sentinel: the border value `(i, 0)` when
///   the band reaches column 0, `outside` otherwise;
/// - `curr[end + 1]` is the right sentinel, `outside`;
/// - `prev` cells right of the previous row's band and up to `end` are reset
///   to `outside`, since an Itakura row may widen by more than one column.
pub(crate) struct RowBuffers {
    prev: Vec<f64>,
    curr: Vec<f64>,
    prev_end: usize,
    cols: usize,
    left_reach: usize,
    outside: f64,
}

impl RowBuffers {
    /// Allocate the buffers and seed row 0 with `top(j)` for every column
    /// the band admits on the top border.
    pub(crate) fn new(band: &Band, outside: f64, top: impl Fn(usize) -> f64) -> Self {
        let cols = band.cols();
        let mut prev = vec![outside; cols + 1];
        for (j, cell) in prev
            .iter_mut()
            .enumerate()
            .take(band.top_border_reach().min(cols) + 1)
        {
            *cell = top(j);
        }
        Self {
            prev,
            curr: vec![outside; cols + 1],
            prev_end: cols,
            cols,
            left_reach: band.left_border_reach(),
            outside,
        }
    }

    /// Seal the sentinels of row `row` before its cells are computed.
    ///
    /// `left` is the border value `(row, 0)`.
    pub(crate) fn begin_row(&mut self, row: usize, start: usize, end: usize, left: f64) {
        if end > self.prev_end {
            self.prev[self.prev_end + 1..=end].fill(self.outside);
        }
        self.curr[start - 1] = if start == 1 && row <= self.left_reach {
            left
        } else {
            self.outside
        };
        if end < self.cols {
            self.curr[end + 1] = self.outside;
        }
    }

    /// Previous row (read) and current row (write).
    pub(crate) fn split(&mut self) -> (&[f64], &mut [f64]) {
        (&self.prev, &mut self.curr)
    }

    /// Finish a row ending at column `end` and make it the previous row.
    pub(crate) fn end_row(&mut self, end: usize) {
        self.prev_end = end;
        std::mem::swap(&mut self.prev, &mut self.curr);
    }

    /// Value of column `col` in the last finished row.
    pub(crate) fn last(&self, col: usize) -> f64 {
        self.prev[col]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itakura::ItakuraParallelogram;
    use std::sync::Arc;

    #[test]
    fn top_border_respects_reach() {
        let band = Band::SakoeChiba { len: 6, width: 2 };
        let rows = RowBuffers::new(&band, -1.0, |j| j as f64);
        assert_eq!(rows.prev, vec![0.0, 1.0, 2.0, -1.0, -1.0, -1.0, -1.0]);
    }

    #[test]
    fn left_sentinel_uses_border_only_within_reach() {
        let band = Band::SakoeChiba { len: 6, width: 1 };
        let mut rows = RowBuffers::new(&band, -1.0, |_| 0.0);

        rows.begin_row(1, 1, 2, 10.0);
        assert_eq!(rows.curr[0], 10.0);
        assert_eq!(rows.curr[3], -1.0);
        rows.end_row(2);

        rows.begin_row(2, 1, 3, 20.0);
        assert_eq!(rows.curr[0], -1.0);
    }

    #[test]
    fn widening_row_resets_stale_cells() {
        let band = Band::Itakura(Arc::new(ItakuraParallelogram::new(10, 4)));
        let mut rows = RowBuffers::new(&band, f64::INFINITY, |_| 0.0);
        // Pretend two earlier rows left garbage behind.
        rows.prev.fill(7.0);
        rows.prev_end = 3;
        rows.begin_row(3, 2, 5, 0.0);
        assert_eq!(rows.prev[3], 7.0);
        assert!(rows.prev[4].is_infinite());
        assert!(rows.prev[5].is_infinite());
        assert!(rows.curr[1].is_infinite());
        assert!(rows.curr[6].is_infinite());
    }
}
