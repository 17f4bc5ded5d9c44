//! Error types for time series construction and distance computation.

/// Errors from time series validation, distance configuration and computation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DistanceError {
    /// Returned when an empty slice is provided as a time series.
    #[error("time series must be non-empty")]
    EmptySeries,

    /// Returned when a time series contains NaN, infinity, or negative infinity.
    #[error("time series contains non-finite value at index {index}")]
    NonFiniteValue {
        /// Position of the first non-finite value found.
        index: usize,
    },

    /// Returned when a class label is NaN or infinite.
    #[error("time series label must be finite, got {label}")]
    NonFiniteLabel {
        /// The rejected label.
        label: f64,
    },

    /// Returned when a measure requires equal-length series and the lengths differ.
    #[error("incomparable series lengths: {a_len} vs {b_len}")]
    IncomparableLength {
        /// Length of the first series.
        a_len: usize,
        /// Length of the second series.
        b_len: usize,
    },

    /// Returned when a parameter is negative, non-finite, or out of its range.
    #[error("invalid value {value} for parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name, e.g. `epsilon`.
        name: &'static str,
        /// The rejected value.
        value: f64,
        /// What the parameter requires.
        reason: &'static str,
    },

    /// Returned when a warping window is set on an unconstrained measure.
    #[error("measure `{measure}` is unconstrained and has no warping window")]
    NoWarpingWindow {
        /// Name of the measure.
        measure: &'static str,
    },

    /// Returned when upper-triangular matrix rows have the wrong shape.
    #[error("distance matrix row {row} has {got} entries, expected {expected}")]
    MalformedMatrixRow {
        /// Zero-based row index.
        row: usize,
        /// Expected number of entries (`n - row`).
        expected: usize,
        /// Actual number of entries.
        got: usize,
    },

    /// Returned when a neighbour row references an index outside the matrix.
    #[error("neighbour row {row} references index {index}, matrix covers {len} series")]
    NeighbourOutOfBounds {
        /// Zero-based row index.
        row: usize,
        /// The offending neighbour index.
        index: usize,
        /// Number of series covered.
        len: usize,
    },
}
