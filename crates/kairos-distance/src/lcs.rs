//! Longest Common Subsequence with a matching threshold.

use crate::buffer::RowBuffers;
use crate::constraint::{Banding, GlobalConstraint, Window};
use crate::distance::Distance;
use crate::error::DistanceError;
use crate::memo::Memo;
use crate::params;
use crate::series::TimeSeries;

/// LCS dissimilarity in `[0, 1]`.
///
/// Two points match when `|a_i - b_j| <= epsilon`. With `L` the length of
/// the longest common subsequence, the distance is `(n + m - 2L) / (n + m)`
/// unconstrained and `(len - L) / len` for the constrained variants.
#[derive(Debug, Clone, Default)]
pub struct Lcs {
    epsilon: f64,
    banding: Banding,
    memo: Memo,
}

impl Lcs {
    /// Create an unconstrained LCS measure.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::InvalidParameter`] if `epsilon` is negative
    /// or non-finite.
    pub fn unconstrained(epsilon: f64) -> Result<Self, DistanceError> {
        Self::with_constraint(epsilon, GlobalConstraint::Unconstrained)
    }

    /// Create an LCS measure restricted to a Sakoe-Chiba band.
    ///
    /// # Errors
    ///
    /// Same as [`Lcs::unconstrained`], and also
    /// [`DistanceError::InvalidParameter`] for a relative window outside
    /// `[0, 100]`.
    pub fn sakoe_chiba(epsilon: f64, window: Window) -> Result<Self, DistanceError> {
        Self::with_constraint(epsilon, GlobalConstraint::SakoeChiba(window))
    }

    /// Create an LCS measure restricted to an Itakura parallelogram.
    ///
    /// # Errors
    ///
    /// Same as [`Lcs::sakoe_chiba`].
    pub fn itakura(epsilon: f64, window: Window) -> Result<Self, DistanceError> {
        Self::with_constraint(epsilon, GlobalConstraint::Itakura(window))
    }

    /// Create an LCS measure from an explicit [`GlobalConstraint`].
    ///
    /// # Errors
    ///
    /// Same as [`Lcs::sakoe_chiba`].
    pub fn with_constraint(
        epsilon: f64,
        constraint: GlobalConstraint,
    ) -> Result<Self, DistanceError> {
        params::check_non_negative("epsilon", epsilon)?;
        Ok(Self {
            epsilon,
            banding: Banding::new(constraint)?,
            memo: Memo::new(),
        })
    }

    /// Return the matching threshold.
    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Set the matching threshold.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::InvalidParameter`] if `epsilon` is negative
    /// or non-finite.
    pub fn set_epsilon(&mut self, epsilon: f64) -> Result<(), DistanceError> {
        params::check_non_negative("epsilon", epsilon)?;
        if self.epsilon != epsilon {
            self.epsilon = epsilon;
            self.memo.invalidate();
        }
        Ok(())
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
        if self.banding.set_window(window, "lcs")? {
            self.memo.invalidate();
        }
        Ok(())
    }
}

impl Distance for Lcs {
    fn name(&self) -> &'static str {
        "lcs"
    }

    fn compute(&self, a: &TimeSeries, b: &TimeSeries) -> Result<f64, DistanceError> {
        let (a, b) = if a.len() < b.len() { (b, a) } else { (a, b) };
        let band = self.banding.band(a.len(), b.len())?;

        // Border and out-of-band cells contribute no matches.
        let mut rows = RowBuffers::new(&band, 0.0, |_| 0.0);

        for i in 1..=band.rows() {
            let (start, end) = band.columns(i);
            rows.begin_row(i, start, end, 0.0);
            let (prev, curr) = rows.split();
            let ai = a.y(i - 1);
            for j in start..=end {
                curr[j] = if (ai - b.y(j - 1)).abs() <= self.epsilon {
                    prev[j - 1] + 1.0
                } else {
                    prev[j].max(curr[j - 1])
                };
            }
            rows.end_row(end);
        }

        let common = rows.last(band.cols());
        let distance = if self.banding.constraint().is_unconstrained() {
            let total = (a.len() + b.len()) as f64;
            (total - 2.0 * common) / total
        } else {
            let len = a.len() as f64;
            (len - common) / len
        };
        Ok(distance)
    }

    fn memo(&self) -> Option<&Memo> {
        Some(&self.memo)
    }

    fn memo_mut(&mut self) -> Option<&mut Memo> {
        Some(&mut self.memo)
    }
}
