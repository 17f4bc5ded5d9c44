//! k-nearest-neighbour classification of time series.
//!
//! Any [`kairos_distance::Distance`] can drive a [`KnnClassifier`]: the `k`
//! closest training series vote for their label under a [`Weighting`]
//! scheme. Query-time distances are fanned out over a per-classifier rayon
//! pool, or read from precomputed distance and neighbour matrices.

mod cancel;
mod classifier;
mod config;
mod error;
mod executor;
mod neighbours;
mod nn;
mod weighting;

pub use cancel::CancelToken;
pub use classifier::{Classifier, KnnClassifier};
pub use config::KnnConfig;
pub use error::KnnError;
pub use executor::{global_thread_limit, set_global_thread_limit};
pub use neighbours::{Neighbour, SortedNeighbours};
pub use nn::NnClassifier;
pub use weighting::Weighting;
