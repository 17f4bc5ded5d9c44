//! Dynamic Time Warping.

use tracing::instrument;

use crate::buffer::RowBuffers;
use crate::constraint::{Banding, GlobalConstraint, Window};
use crate::distance::Distance;
use crate::error::DistanceError;
use crate::memo::Memo;
use crate::series::TimeSeries;

/// Dynamic Time Warping with squared local cost.
///
/// The result is the raw accumulated cost of the optimal alignment; no
/// square root is taken. Runs in `O(n * bw)` time and `O(m)` space using a
/// rolling two-row buffer, where `bw` is the band width (`m` when
/// unconstrained).
///
/// Unconstrained DTW accepts series of different lengths. The Sakoe-Chiba
/// and Itakura variants require equal lengths.
///
/// # Examples
///
/// ```
/// use kairos_distance::{Distance, Dtw, TimeSeries};
///
/// let a = TimeSeries::new(vec![0.0, 1.0, 2.0], 0.0).unwrap();
/// let b = TimeSeries::new(vec![0.0, 2.0], 0.0).unwrap();
/// assert_eq!(Dtw::unconstrained().distance(&a, &b).unwrap(), 1.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Dtw {
    banding: Banding,
    memo: Memo,
}

impl Dtw {
    /// Create an unconstrained DTW measure.
    #[must_use]
    pub fn unconstrained() -> Self {
        Self::default()
    }

    /// Create a DTW measure restricted to a Sakoe-Chiba band.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::InvalidParameter`] if a relative window is
    /// not in `[0, 100]`.
    pub fn sakoe_chiba(window: Window) -> Result<Self, DistanceError> {
        Self::with_constraint(GlobalConstraint::SakoeChiba(window))
    }

    /// Create a DTW measure restricted to an Itakura parallelogram.
    ///
    /// # Errors
    ///
    /// Same as [`Dtw::sakoe_chiba`].
    pub fn itakura(window: Window) -> Result<Self, DistanceError> {
        Self::with_constraint(GlobalConstraint::Itakura(window))
    }

    /// Create a DTW measure from an explicit [`GlobalConstraint`].
    ///
    /// # Errors
    ///
    /// Same as [`Dtw::sakoe_chiba`].
    pub fn with_constraint(constraint: GlobalConstraint) -> Result<Self, DistanceError> {
        Ok(Self {
            banding: Banding::new(constraint)?,
            memo: Memo::new(),
        })
    }

    /// Return the global constraint.
    #[must_use]
    pub fn constraint(&self) -> GlobalConstraint {
        self.banding.constraint()
    }

    /// Replace the global constraint.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::InvalidParameter`] if the window is out of
    /// range; the previous constraint is kept.
    pub fn set_constraint(&mut self, constraint: GlobalConstraint) -> Result<(), DistanceError> {
        if self.banding.set_constraint(constraint)? {
            self.memo.invalidate();
        }
        Ok(())
    }

    /// Set a relative warping window of `r` percent.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DistanceError::InvalidParameter`] | `r` outside `[0, 100]` |
    /// | [`DistanceError::NoWarpingWindow`] | The measure is unconstrained |
    pub fn set_r(&mut self, r: f64) -> Result<(), DistanceError> {
        self.set_window(Window::relative(r)?)
    }

    /// Set an absolute warping window of `w` time steps.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::NoWarpingWindow`] if the measure is unconstrained.
    pub fn set_w(&mut self, w: usize) -> Result<(), DistanceError> {
        self.set_window(Window::absolute(w))
    }

    fn set_window(&mut self, window: Window) -> Result<(), DistanceError> {
        if self.banding.set_window(window, "dtw")? {
            self.memo.invalidate();
        }
        Ok(())
    }
}

impl Distance for Dtw {
    fn name(&self) -> &'static str {
        "dtw"
    }

    #[instrument(level = "trace", skip_all, fields(a_len = a.len(), b_len = b.len()))]
    fn compute(&self, a: &TimeSeries, b: &TimeSeries) -> Result<f64, DistanceError> {
        // Shorter series in the inner loop.
        let (a, b) = if a.len() < b.len() { (b, a) } else { (a, b) };
        let band = self.banding.band(a.len(), b.len())?;

        let mut rows = RowBuffers::new(&band, f64::INFINITY, |j| {
            if j == 0 { 0.0 } else { f64::INFINITY }
        });

        for i in 1..=band.rows() {
            let (start, end) = band.columns(i);
            rows.begin_row(i, start, end, f64::INFINITY);
            let (prev, curr) = rows.split();
            let ai = a.y(i - 1);
            for j in start..=end {
                let cost = (ai - b.y(j - 1)).powi(2);
                curr[j] = cost + prev[j - 1].min(prev[j]).min(curr[j - 1]);
            }
            rows.end_row(end);
        }

        Ok(rows.last(band.cols()))
    }

    fn memo(&self) -> Option<&Memo> {
        Some(&self.memo)
    }

    fn memo_mut(&mut self) -> Option<&mut Memo> {
        Some(&mut self.memo)
    }
}
