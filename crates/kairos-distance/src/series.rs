//! Time series and dataset types with validation guarantees.

use std::ops::Index;
use std::sync::Arc;

use crate::error::DistanceError;

/// A single observation: `x` is the time coordinate, `y` the value.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DataPoint {
    /// Time coordinate.
    pub x: f64,
    /// Observed value.
    pub y: f64,
}

impl DataPoint {
    /// Create a new point.
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Owned, validated, labelled time series. Guaranteed non-empty with all finite values.
///
/// The optional `index` is the identity key used by the memo cache and by
/// precomputed distance / neighbour matrices. It must be assigned before any
/// matrix-backed lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    points: Vec<DataPoint>,
    label: f64,
    index: Option<usize>,
}

impl TimeSeries {
    /// Create a series from values sampled at `x = 0, 1, 2, ...`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DistanceError::EmptySeries`] | `values` is empty |
    /// | [`DistanceError::NonFiniteValue`] | Any value is NaN or infinite |
    /// | [`DistanceError::NonFiniteLabel`] | `label` is NaN or infinite |
    pub fn new(values: Vec<f64>, label: f64) -> Result<Self, DistanceError> {
        let points = values
            .into_iter()
            .enumerate()
            .map(|(i, y)| DataPoint::new(i as f64, y))
            .collect();
        Self::from_points(points, label)
    }

    /// Create a series from explicit `(x, y)` points.
    ///
    /// # Errors
    ///
    /// Same conditions as [`TimeSeries::new`]; a non-finite `x` is reported
    /// as [`DistanceError::NonFiniteValue`] too.
    pub fn from_points(points: Vec<DataPoint>, label: f64) -> Result<Self, DistanceError> {
        if points.is_empty() {
            return Err(DistanceError::EmptySeries);
        }
        if let Some(index) = points
            .iter()
            .position(|p| !p.x.is_finite() || !p.y.is_finite())
        {
            return Err(DistanceError::NonFiniteValue { index });
        }
        if !label.is_finite() {
            return Err(DistanceError::NonFiniteLabel { label });
        }
        Ok(Self {
            points,
            label,
            index: None,
        })
    }

    /// Assign the identity index, consuming and returning the series.
    #[must_use]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Assign the identity index in place.
    pub fn set_index(&mut self, index: usize) {
        self.index = Some(index);
    }

    /// Return the identity index, if assigned.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Return the class label.
    #[must_use]
    pub fn label(&self) -> f64 {
        self.label
    }

    /// Return the points as a slice.
    #[must_use]
    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    /// Return the `y` value at position `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= len()`.
    #[must_use]
    pub fn y(&self, i: usize) -> f64 {
        self.points[i].y
    }

    /// Return the `x` coordinate at position `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= len()`.
    #[must_use]
    pub fn x(&self, i: usize) -> f64 {
        self.points[i].x
    }

    /// Iterate over the `y` values.
    pub fn values(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.y)
    }

    /// Return the number of time steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Return true if the series has no time steps.
    ///
    /// A [`TimeSeries`] built through the validating constructors is always
    /// non-empty, so this always returns `false` for valid instances. Provided
    /// to satisfy the `len_without_is_empty` convention.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl AsRef<TimeSeries> for TimeSeries {
    fn as_ref(&self) -> &TimeSeries {
        self
    }
}

impl Index<usize> for TimeSeries {
    type Output = DataPoint;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

/// Ordered collection of shared time series.
///
/// The same [`TimeSeries`] may appear in several datasets (for example a
/// full dataset and its training split); sharing goes through [`Arc`].
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    series: Vec<Arc<TimeSeries>>,
}

impl Dataset {
    /// Create a dataset from shared series, keeping their indices as they are.
    #[must_use]
    pub fn new(series: Vec<Arc<TimeSeries>>) -> Self {
        Self { series }
    }

    /// Create a dataset assigning `index = position` to every series.
    ///
    /// This is the layout expected by [`crate::pairwise`] and by the
    /// precomputed matrices, whose rows are addressed by series index.
    #[must_use]
    pub fn indexed(series: Vec<TimeSeries>) -> Self {
        let series = series
            .into_iter()
            .enumerate()
            .map(|(i, s)| Arc::new(s.with_index(i)))
            .collect();
        Self { series }
    }

    /// Return the number of series.
    #[must_use]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Return true if the dataset holds no series.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Return the series at `position`, if any.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&Arc<TimeSeries>> {
        self.series.get(position)
    }

    /// Return the series as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Arc<TimeSeries>] {
        &self.series
    }

    /// Iterate over the series in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<TimeSeries>> {
        self.series.iter()
    }

    /// Append a series.
    pub fn push(&mut self, series: Arc<TimeSeries>) {
        self.series.push(series);
    }

    /// Return the subset of series for which `keep` returns true, in order.
    #[must_use]
    pub fn filter(&self, mut keep: impl FnMut(&TimeSeries) -> bool) -> Self {
        Self {
            series: self.series.iter().filter(|s| keep(s)).cloned().collect(),
        }
    }

    /// Split into `n` contiguous parts of near-equal size.
    ///
    /// Part sizes differ by at most one; earlier parts receive the extra
    /// elements. Order is preserved, so concatenating the parts yields the
    /// original dataset. `n` is clamped to `[1, len]` (an empty dataset
    /// yields a single empty part).
    #[must_use]
    pub fn split(&self, n: usize) -> Vec<Dataset> {
        let len = self.series.len();
        let parts = n.clamp(1, len.max(1));
        let base = len / parts;
        let extra = len % parts;

        let mut out = Vec::with_capacity(parts);
        let mut start = 0;
        for p in 0..parts {
            let size = base + usize::from(p < extra);
            out.push(Dataset::new(self.series[start..start + size].to_vec()));
            start += size;
        }
        out
    }
}

impl Index<usize> for Dataset {
    type Output = Arc<TimeSeries>;

    fn index(&self, position: usize) -> &Self::Output {
        &self.series[position]
    }
}

impl FromIterator<Arc<TimeSeries>> for Dataset {
    fn from_iter<T: IntoIterator<Item = Arc<TimeSeries>>>(iter: T) -> Self {
        Self {
            series: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Arc<TimeSeries>;
    type IntoIter = std::slice::Iter<'a, Arc<TimeSeries>>;

    fn into_iter(self) -> Self::IntoIter {
        self.series.iter()
    }
}
