//! Edit distance with Real Penalty.

use crate::buffer::RowBuffers;
use crate::constraint::{Banding, GlobalConstraint, Window};
use crate::distance::Distance;
use crate::error::DistanceError;
use crate::memo::Memo;
use crate::params;
use crate::series::TimeSeries;

/// ERP: an edit distance where a gap is charged against the constant `g`.
///
/// ```text
/// cell[i][j] = min(cell[i-1][j-1] + |a_i - b_j|,
///                  cell[i-1][j]   + |a_i - g|,
///                  cell[i][j-1]   + |b_j - g|)
/// ```
///
/// The border rows hold the cumulative gap cost of each prefix. The result
/// is the raw accumulated cost. ERP is a metric, so `d(a, a) = 0`.
#[derive(Debug, Clone, Default)]
pub struct Erp {
    g: f64,
    banding: Banding,
    memo: Memo,
}

impl Erp {
    /// Create an unconstrained ERP measure with gap value `g`.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::InvalidParameter`] if `g` is non-finite.
    pub fn unconstrained(g: f64) -> Result<Self, DistanceError> {
        Self::with_constraint(g, GlobalConstraint::Unconstrained)
    }

    /// Create an ERP measure restricted to a Sakoe-Chiba band.
    ///
    /// # Errors
    ///
    /// Same as [`Erp::unconstrained`], and also
    /// [`DistanceError::InvalidParameter`] for a relative window outside
    /// `[0, 100]`.
    pub fn sakoe_chiba(g: f64, window: Window) -> Result<Self, DistanceError> {
        Self::with_constraint(g, GlobalConstraint::SakoeChiba(window))
    }

    /// Create an ERP measure restricted to an Itakura parallelogram.
    ///
    /// # Errors
    ///
    /// Same as [`Erp::sakoe_chiba`].
    pub fn itakura(g: f64, window: Window) -> Result<Self, DistanceError> {
        Self::with_constraint(g, GlobalConstraint::Itakura(window))
    }

    /// Create an ERP measure from an explicit [`GlobalConstraint`].
    ///
    /// # Errors
    ///
    /// Same as [`Erp::sakoe_chiba`].
    pub fn with_constraint(g: f64, constraint: GlobalConstraint) -> Result<Self, DistanceError> {
        params::check_finite("g", g)?;
        Ok(Self {
            g,
            banding: Banding::new(constraint)?,
            memo: Memo::new(),
        })
    }

    /// Return the gap value.
    #[must_use]
    pub fn g(&self) -> f64 {
        self.g
    }

    /// Set the gap value.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::InvalidParameter`] if `g` is non-finite.
    pub fn set_g(&mut self, g: f64) -> Result<(), DistanceError> {
        params::check_finite("g", g)?;
        if self.g != g {
            self.g = g;
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
        if self.banding.set_window(window, "erp")? {
            self.memo.invalidate();
        }
        Ok(())
    }

    /// Cumulative gap cost of every prefix: `out[k] = sum_{t < k} |s_t - g|`.
    fn gap_costs(&self, s: &TimeSeries) -> Vec<f64> {
        let mut out = Vec::with_capacity(s.len() + 1);
        let mut total = 0.0;
        out.push(total);
        for y in s.values() {
            total += (y - self.g).abs();
            out.push(total);
        }
        out
    }
}

impl Distance for Erp {
    fn name(&self) -> &'static str {
        "erp"
    }

    fn compute(&self, a: &TimeSeries, b: &TimeSeries) -> Result<f64, DistanceError> {
        let (a, b) = if a.len() < b.len() { (b, a) } else { (a, b) };
        let band = self.banding.band(a.len(), b.len())?;

        let left = self.gap_costs(a);
        let top = self.gap_costs(b);
        let mut rows = RowBuffers::new(&band, f64::INFINITY, |j| top[j]);

        for i in 1..=band.rows() {
            let (start, end) = band.columns(i);
            rows.begin_row(i, start, end, left[i]);
            let (prev, curr) = rows.split();
            let ai = a.y(i - 1);
            let gap_a = (ai - self.g).abs();
            for j in start..=end {
                let bj = b.y(j - 1);
                let matched = prev[j - 1] + (ai - bj).abs();
                let gap_in_b = prev[j] + gap_a;
                let gap_in_a = curr[j - 1] + (bj - self.g).abs();
                curr[j] = matched.min(gap_in_b).min(gap_in_a);
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
