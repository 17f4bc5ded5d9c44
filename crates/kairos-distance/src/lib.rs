//! Time series distance measures.
//!
//! Pure math library, zero I/O. Provides lock-step vector distances and the
//! elastic measures DTW, LCS, ERP and TWED, each unconstrained or restricted
//! by a Sakoe-Chiba band or an Itakura parallelogram. Measures share the
//! [`Distance`] trait with opt-in memoization, and pairwise distance /
//! neighbour matrices can be precomputed in parallel.

mod buffer;
mod constraint;
mod distance;
mod dtw;
mod erp;
mod error;
mod itakura;
mod lcs;
mod matrix;
mod measure;
mod memo;
mod params;
mod series;
mod twed;
mod vector;

pub use constraint::{GlobalConstraint, Window, sakoe_chiba_width};
pub use distance::Distance;
pub use dtw::Dtw;
pub use erp::Erp;
pub use error::DistanceError;
pub use itakura::{ItakuraParallelogram, ParallelogramCache};
pub use lcs::Lcs;
pub use matrix::{DistanceMatrix, NeighbourMatrix, pairwise};
pub use measure::{Measure, MeasureConfig};
pub use memo::Memo;
pub use series::{DataPoint, Dataset, TimeSeries};
pub use twed::Twed;
pub use vector::{Pointwise, VectorDistance};
