//! Global constraint types: warping windows, Sakoe-Chiba bands and the
//! per-row band geometry shared by every elastic dynamic program.

use std::sync::Arc;

use crate::error::DistanceError;
use crate::itakura::{ItakuraParallelogram, ParallelogramCache};
use crate::params;

/// Width of a warping window.
///
/// The relative and absolute forms are mutually exclusive: setting one
/// replaces the other.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    /// Percentage of the series length, in `[0, 100]`.
    Relative(f64),
    /// Absolute number of time steps.
    Absolute(usize),
}

impl Window {
    /// Create a relative window of `r` percent.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::InvalidParameter`] if `r` is not in `[0, 100]`.
    pub fn relative(r: f64) -> Result<Self, DistanceError> {
        params::check_percent("r", r)?;
        Ok(Self::Relative(r))
    }

    /// Create an absolute window of `w` time steps.
    #[must_use]
    pub fn absolute(w: usize) -> Self {
        Self::Absolute(w)
    }

    /// Check the window's range.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::InvalidParameter`] if a relative window is
    /// not in `[0, 100]`.
    pub fn validate(&self) -> Result<(), DistanceError> {
        match *self {
            Self::Relative(r) => params::check_percent("r", r),
            Self::Absolute(_) => Ok(()),
        }
    }

    /// Resolve the window to an absolute width for a series of length `len`,
    /// clamped to `len`.
    #[must_use]
    pub fn resolve(self, len: usize) -> usize {
        let width = match self {
            Self::Absolute(w) => w,
            Self::Relative(r) => (len as f64 * r / 100.0).floor() as usize,
        };
        width.min(len)
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::Relative(100.0)
    }
}

/// Global constraint applied to an elastic measure's alignment grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalConstraint {
    /// Full grid; series may differ in length.
    #[default]
    Unconstrained,
    /// Sakoe-Chiba band: cell `(i, j)` is valid only if `|i - j| <= width`.
    SakoeChiba(Window),
    /// Itakura parallelogram of the given width.
    Itakura(Window),
}

impl GlobalConstraint {
    /// Return the warping window, if the constraint has one.
    #[must_use]
    pub fn window(&self) -> Option<Window> {
        match self {
            Self::Unconstrained => None,
            Self::SakoeChiba(w) | Self::Itakura(w) => Some(*w),
        }
    }

    /// Check the window of a constrained variant.
    ///
    /// # Errors
    ///
    /// Same as [`Window::validate`].
    pub fn validate(&self) -> Result<(), DistanceError> {
        self.window().map_or(Ok(()), |w| w.validate())
    }

    /// Return true for the unconstrained variant.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        matches!(self, Self::Unconstrained)
    }
}

/// Compute the Sakoe-Chiba band width for two series.
///
/// `width = w` for an absolute window, `floor(len * r / 100)` for a relative
/// one, then clamped to `len`.
///
/// # Errors
///
/// Returns [`DistanceError::IncomparableLength`] when the lengths differ.
pub fn sakoe_chiba_width(a_len: usize, b_len: usize, window: Window) -> Result<usize, DistanceError> {
    if a_len != b_len {
        return Err(DistanceError::IncomparableLength { a_len, b_len });
    }
    Ok(window.resolve(a_len))
}

/// Per-row column bounds of a dynamic-programming grid.
///
/// Rows and columns are 1-based; row 0 and column 0 are the border. For
/// row `i` in `1..=rows`, [`columns`][Band::columns] returns the inclusive
/// range of columns that are computed.
#[derive(Debug, Clone)]
pub(crate) enum Band {
    /// Every cell of a `rows x cols` grid.
    Full { rows: usize, cols: usize },
    /// Diagonal band of half-width `width` over a square grid.
    SakoeChiba { len: usize, width: usize },
    /// Itakura parallelogram over a square grid.
    Itakura(Arc<ItakuraParallelogram>),
}

impl Band {
    pub(crate) fn rows(&self) -> usize {
        match self {
            Self::Full { rows, .. } => *rows,
            Self::SakoeChiba { len, .. } => *len,
            Self::Itakura(p) => p.len(),
        }
    }

    pub(crate) fn cols(&self) -> usize {
        match self {
            Self::Full { cols, .. } => *cols,
            Self::SakoeChiba { len, .. } => *len,
            Self::Itakura(p) => p.len(),
        }
    }

    /// Inclusive `(start, end)` columns of row `row` (1-based).
    pub(crate) fn columns(&self, row: usize) -> (usize, usize) {
        match self {
            Self::Full { cols, .. } => (1, *cols),
            Self::SakoeChiba { len, width } => {
                let start = row.saturating_sub(*width).max(1);
                let end = (row + width).min(*len);
                (start, end)
            }
            Self::Itakura(p) => (p.start(row), p.end(row)),
        }
    }

    /// Last row `i` whose left border cell `(i, 0)` lies inside the band.
    pub(crate) fn left_border_reach(&self) -> usize {
        match self {
            Self::Full { rows, .. } => *rows,
            Self::SakoeChiba { len, width } => (*width).min(*len),
            Self::Itakura(p) => p.border_reach(),
        }
    }

    /// Last column `j` whose top border cell `(0, j)` lies inside the band.
    pub(crate) fn top_border_reach(&self) -> usize {
        match self {
            Self::Full { cols, .. } => *cols,
            Self::SakoeChiba { len, width } => (*width).min(*len),
            Self::Itakura(p) => p.border_reach(),
        }
    }
}

/// A global constraint together with the parallelogram cache it needs.
///
/// Embedded in every elastic measure.
#[derive(Debug, Clone, Default)]
pub(crate) struct Banding {
    constraint: GlobalConstraint,
    parallelograms: ParallelogramCache,
}

impl Banding {
    pub(crate) fn new(constraint: GlobalConstraint) -> Result<Self, DistanceError> {
        constraint.validate()?;
        Ok(Self {
            constraint,
            parallelograms: ParallelogramCache::default(),
        })
    }

    pub(crate) fn constraint(&self) -> GlobalConstraint {
        self.constraint
    }

    /// Replace the constraint. Returns true if it actually changed.
    pub(crate) fn set_constraint(
        &mut self,
        constraint: GlobalConstraint,
    ) -> Result<bool, DistanceError> {
        constraint.validate()?;
        if self.constraint == constraint {
            return Ok(false);
        }
        self.constraint = constraint;
        Ok(true)
    }

    /// Replace the window of a constrained variant, keeping its kind.
    /// Returns true if the window actually changed.
    pub(crate) fn set_window(
        &mut self,
        window: Window,
        measure: &'static str,
    ) -> Result<bool, DistanceError> {
        let next = match self.constraint {
            GlobalConstraint::Unconstrained => {
                return Err(DistanceError::NoWarpingWindow { measure });
            }
            GlobalConstraint::SakoeChiba(_) => GlobalConstraint::SakoeChiba(window),
            GlobalConstraint::Itakura(_) => GlobalConstraint::Itakura(window),
        };
        self.set_constraint(next)
    }

    /// Build the band for a pair of series lengths.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DistanceError::IncomparableLength`] | A constrained variant receives series of different lengths |
    /// | [`DistanceError::InvalidParameter`] | The relative window is outside `[0, 100]` |
    pub(crate) fn band(&self, a_len: usize, b_len: usize) -> Result<Band, DistanceError> {
        match self.constraint {
            GlobalConstraint::Unconstrained => Ok(Band::Full {
                rows: a_len,
                cols: b_len,
            }),
            GlobalConstraint::SakoeChiba(window) => {
                window.validate()?;
                let width = sakoe_chiba_width(a_len, b_len, window)?;
                Ok(Band::SakoeChiba { len: a_len, width })
            }
            GlobalConstraint::Itakura(window) => {
                window.validate()?;
                let width = sakoe_chiba_width(a_len, b_len, window)?;
                Ok(Band::Itakura(self.parallelograms.get(a_len, width)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_width_floors() {
        assert_eq!(sakoe_chiba_width(10, 10, Window::Relative(25.0)).unwrap(), 2);
        assert_eq!(sakoe_chiba_width(10, 10, Window::Relative(100.0)).unwrap(), 10);
        assert_eq!(sakoe_chiba_width(10, 10, Window::Relative(0.0)).unwrap(), 0);
    }

    #[test]
    fn absolute_width_clamped_to_length() {
        assert_eq!(sakoe_chiba_width(5, 5, Window::Absolute(3)).unwrap(), 3);
        assert_eq!(sakoe_chiba_width(5, 5, Window::Absolute(20)).unwrap(), 5);
    }

    #[test]
    fn width_rejects_unequal_lengths() {
        let result = sakoe_chiba_width(4, 5, Window::Absolute(1));
        assert_eq!(
            result,
            Err(DistanceError::IncomparableLength { a_len: 4, b_len: 5 })
        );
    }

    #[test]
    fn relative_window_validates_range() {
        assert!(Window::relative(50.0).is_ok());
        assert!(Window::relative(-1.0).is_err());
        assert!(Window::relative(100.5).is_err());
        assert!(Window::relative(f64::NAN).is_err());
    }

    #[test]
    fn sakoe_chiba_band_rows() {
        let band = Band::SakoeChiba { len: 10, width: 2 };
        assert_eq!(band.columns(1), (1, 3));
        assert_eq!(band.columns(6), (4, 8));
        assert_eq!(band.columns(10), (8, 10));
        assert_eq!(band.left_border_reach(), 2);
        assert_eq!(band.top_border_reach(), 2);
    }

    #[test]
    fn full_band_rows() {
        let band = Band::Full { rows: 3, cols: 7 };
        assert_eq!(band.columns(2), (1, 7));
        assert_eq!(band.left_border_reach(), 3);
        assert_eq!(band.top_border_reach(), 7);
    }

    #[test]
    fn set_window_keeps_kind() {
        let mut banding = Banding::new(GlobalConstraint::Itakura(Window::Relative(10.0))).unwrap();
        assert!(banding.set_window(Window::Absolute(3), "dtw").unwrap());
        assert_eq!(
            banding.constraint(),
            GlobalConstraint::Itakura(Window::Absolute(3))
        );
        assert!(!banding.set_window(Window::Absolute(3), "dtw").unwrap());
    }

    #[test]
    fn set_window_on_unconstrained_fails() {
        let mut banding = Banding::default();
        assert!(matches!(
            banding.set_window(Window::Absolute(1), "dtw"),
            Err(DistanceError::NoWarpingWindow { measure: "dtw" })
        ));
    }

    #[test]
    fn constrained_band_requires_equal_lengths() {
        let banding = Banding::new(GlobalConstraint::SakoeChiba(Window::Absolute(1))).unwrap();
        assert!(matches!(
            banding.band(3, 4),
            Err(DistanceError::IncomparableLength { a_len: 3, b_len: 4 })
        ));
        assert!(Banding::default().band(3, 4).is_ok());
    }

    #[test]
    fn out_of_range_windows_are_rejected() {
        for window in [
            Window::Relative(-40.0),
            Window::Relative(250.0),
            Window::Relative(f64::NAN),
        ] {
            for constraint in [
                GlobalConstraint::SakoeChiba(window),
                GlobalConstraint::Itakura(window),
            ] {
                assert!(matches!(
                    Banding::new(constraint),
                    Err(DistanceError::InvalidParameter { name: "r", .. })
                ));
                let mut banding = Banding::default();
                assert!(banding.set_constraint(constraint).is_err());
                assert_eq!(banding.constraint(), GlobalConstraint::Unconstrained);
            }
        }
        assert!(GlobalConstraint::Unconstrained.validate().is_ok());
        assert!(Window::Absolute(usize::MAX).validate().is_ok());
    }

    #[test]
    fn set_window_rejects_out_of_range() {
        let mut banding = Banding::new(GlobalConstraint::SakoeChiba(Window::Absolute(2))).unwrap();
        assert!(banding.set_window(Window::Relative(101.0), "dtw").is_err());
        assert_eq!(
            banding.constraint(),
            GlobalConstraint::SakoeChiba(Window::Absolute(2))
        );
    }
}
