use kairos_distance::DistanceError;

/// Errors from classifier configuration and classification.
#[derive(Debug, thiserror::Error)]
pub enum KnnError {
    /// Returned when classification is attempted without training data.
    #[error("training set is empty or was never initialized")]
    EmptyTrainingSet,

    /// Returned when k is zero.
    #[error("k must be at least 1, got {k}")]
    InvalidK {
        /// The invalid k value provided.
        k: usize,
    },

    /// Returned when exclude is not smaller than k.
    #[error("exclude must be smaller than k = {k}, got {exclude}")]
    InvalidExclude {
        /// The invalid exclude value provided.
        exclude: usize,
        /// The current number of neighbours.
        k: usize,
    },

    /// Returned when the thread count is zero.
    #[error("number of threads must be at least 1, got {threads}")]
    InvalidThreadCount {
        /// The invalid thread count provided.
        threads: usize,
    },

    /// Returned when a weighting parameter is out of range.
    #[error("invalid value {value} for weighting parameter `{name}`: {reason}")]
    InvalidWeighting {
        /// Parameter name, e.g. `epsilon`.
        name: &'static str,
        /// The rejected value.
        value: f64,
        /// What the parameter requires.
        reason: &'static str,
    },

    /// Returned when a precomputed matrix is in use and a series has no index.
    #[error("{role} series has no index, required by the precomputed matrix")]
    UnindexedSeries {
        /// Which series was missing its index: `query` or `training`.
        role: &'static str,
    },

    /// Returned when a series index falls outside a precomputed matrix.
    #[error("series index {index} outside precomputed matrix covering {len} series")]
    MatrixOutOfBounds {
        /// The offending series index.
        index: usize,
        /// Number of series the matrix covers.
        len: usize,
    },

    /// Returned when every neighbour was excluded.
    #[error("no neighbours left to vote after exclusion")]
    NoNeighbours,

    /// Returned when classification was cancelled through its token.
    #[error("classification interrupted")]
    Interrupted,

    /// Returned when the worker pool cannot be built.
    #[error("failed to build worker pool")]
    ThreadPool {
        /// The underlying rayon error.
        source: rayon::ThreadPoolBuildError,
    },

    /// Returned when a distance computation fails.
    #[error(transparent)]
    Distance(#[from] DistanceError),
}
