//! Time Warp Edit Distance.

use crate::buffer::RowBuffers;
use crate::constraint::{Banding, GlobalConstraint, Window};
use crate::distance::Distance;
use crate::error::DistanceError;
use crate::memo::Memo;
use crate::params;
use crate::series::{DataPoint, TimeSeries};

/// TWED: an elastic metric combining value and time-stamp differences.
///
/// `nu` is the stiffness applied to time-stamp differences and `lambda`
/// the constant penalty of a deletion. Each series is preceded by a virtual
/// origin point `(0, 0)`. With `delta_i = |y_i - y_{i-1}| + nu * |x_i - x_{i-1}|`:
///
/// ```text
/// cell[i][j] = min(cell[i-1][j-1] + match(i, j),
///                  cell[i-1][j]   + delta_a_i + lambda,
///                  cell[i][j-1]   + delta_b_j + lambda)
/// match(i, j) = |ya_i - yb_j| + |ya_{i-1} - yb_{j-1}|
///             + nu * (|xa_i - xb_j| + |xa_{i-1} - xb_{j-1}|)
/// ```
///
/// Time stamps come from the points' `x` coordinates. The result is the raw
/// accumulated cost.
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | `nu` | 0.001 |
/// | `lambda` | 1.0 |
#[derive(Debug, Clone)]
pub struct Twed {
    nu: f64,
    lambda: f64,
    banding: Banding,
    memo: Memo,
}

impl Default for Twed {
    fn default() -> Self {
        Self {
            nu: 0.001,
            lambda: 1.0,
            banding: Banding::default(),
            memo: Memo::new(),
        }
    }
}

impl Twed {
    /// Create an unconstrained TWED measure.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::InvalidParameter`] if `nu` or `lambda` is
    /// negative or non-finite.
    pub fn unconstrained(nu: f64, lambda: f64) -> Result<Self, DistanceError> {
        Self::with_constraint(nu, lambda, GlobalConstraint::Unconstrained)
    }

    /// Create a TWED measure restricted to a Sakoe-Chiba band.
    ///
    /// # Errors
    ///
    /// Same as [`Twed::unconstrained`], and also
    /// [`DistanceError::InvalidParameter`] for a relative window outside
    /// `[0, 100]`.
    pub fn sakoe_chiba(nu: f64, lambda: f64, window: Window) -> Result<Self, DistanceError> {
        Self::with_constraint(nu, lambda, GlobalConstraint::SakoeChiba(window))
    }

    /// Create a TWED measure restricted to an Itakura parallelogram.
    ///
    /// # Errors
    ///
    /// Same as [`Twed::sakoe_chiba`].
    pub fn itakura(nu: f64, lambda: f64, window: Window) -> Result<Self, DistanceError> {
        Self::with_constraint(nu, lambda, GlobalConstraint::Itakura(window))
    }

    /// Create a TWED measure from an explicit [`GlobalConstraint`].
    ///
    /// # Errors
    ///
    /// Same as [`Twed::sakoe_chiba`].
    pub fn with_constraint(
        nu: f64,
        lambda: f64,
        constraint: GlobalConstraint,
    ) -> Result<Self, DistanceError> {
        params::check_non_negative("nu", nu)?;
        params::check_non_negative("lambda", lambda)?;
        Ok(Self {
            nu,
            lambda,
            banding: Banding::new(constraint)?,
            memo: Memo::new(),
        })
    }

    /// Return the stiffness.
    #[must_use]
    pub fn nu(&self) -> f64 {
        self.nu
    }

    /// Return the deletion penalty.
    #[must_use]
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Set the stiffness.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::InvalidParameter`] if `nu` is negative or
    /// non-finite.
    pub fn set_nu(&mut self, nu: f64) -> Result<(), DistanceError> {
        params::check_non_negative("nu", nu)?;
        if self.nu != nu {
            self.nu = nu;
            self.memo.invalidate();
        }
        Ok(())
    }

    /// Set the deletion penalty.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::InvalidParameter`] if `lambda` is negative or
    /// non-finite.
    pub fn set_lambda(&mut self, lambda: f64) -> Result<(), DistanceError> {
        params::check_non_negative("lambda", lambda)?;
        if self.lambda != lambda {
            self.lambda = lambda;
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
        if self.banding.set_window(window, "twed")? {
            self.memo.invalidate();
        }
        Ok(())
    }

    /// Deletion cost `delta_k + lambda` of every point, 1-based with the
    /// virtual origin at index 0.
    fn deletion_costs(&self, s: &TimeSeries) -> Vec<f64> {
        let mut out = Vec::with_capacity(s.len() + 1);
        out.push(0.0);
        let mut last = ORIGIN;
        for &p in s.points() {
            out.push((p.y - last.y).abs() + self.nu * (p.x - last.x).abs() + self.lambda);
            last = p;
        }
        out
    }

    fn match_cost(&self, a: DataPoint, a_prev: DataPoint, b: DataPoint, b_prev: DataPoint) -> f64 {
        (a.y - b.y).abs()
            + (a_prev.y - b_prev.y).abs()
            + self.nu * ((a.x - b.x).abs() + (a_prev.x - b_prev.x).abs())
    }
}

const ORIGIN: DataPoint = DataPoint { x: 0.0, y: 0.0 };

fn point_or_origin(s: &TimeSeries, k: usize) -> DataPoint {
    if k == 0 { ORIGIN } else { s[k - 1] }
}

impl Distance for Twed {
    fn name(&self) -> &'static str {
        "twed"
    }

    fn compute(&self, a: &TimeSeries, b: &TimeSeries) -> Result<f64, DistanceError> {
        let (a, b) = if a.len() < b.len() { (b, a) } else { (a, b) };
        let band = self.banding.band(a.len(), b.len())?;

        let del_a = self.deletion_costs(a);
        let del_b = self.deletion_costs(b);

        // Border cells accumulate deletions of the other series' prefix.
        let mut top = Vec::with_capacity(del_b.len());
        let mut total = 0.0;
        for cost in &del_b {
            total += cost;
            top.push(total);
        }
        let mut rows = RowBuffers::new(&band, f64::INFINITY, |j| top[j]);

        let mut left = 0.0;
        for i in 1..=band.rows() {
            left += del_a[i];
            let (start, end) = band.columns(i);
            rows.begin_row(i, start, end, left);
            let (prev, curr) = rows.split();
            let ai = a[i - 1];
            let ai_prev = point_or_origin(a, i - 1);
            for j in start..=end {
                let bj = b[j - 1];
                let bj_prev = point_or_origin(b, j - 1);
                let matched = prev[j - 1] + self.match_cost(ai, ai_prev, bj, bj_prev);
                let delete_a = prev[j] + del_a[i];
                let delete_b = curr[j - 1] + del_b[j];
                curr[j] = matched.min(delete_a).min(delete_b);
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
