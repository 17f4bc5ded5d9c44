//! The k-nearest-neighbour classifier.

use std::collections::HashMap;
use std::sync::Arc;

use kairos_distance::{Dataset, Distance, DistanceMatrix, NeighbourMatrix, TimeSeries};
use tracing::{debug, info, instrument};

use crate::cancel::CancelToken;
use crate::error::KnnError;
use crate::executor::DistanceExecutor;
use crate::neighbours::{Neighbour, SortedNeighbours};
use crate::weighting::Weighting;

/// Something that learns from a labelled dataset and labels new series.
pub trait Classifier {
    /// Bind a training set, discarding state derived from a previous one.
    ///
    /// # Errors
    ///
    /// Implementation specific; see the implementor.
    fn initialize(&mut self, trainset: &Dataset) -> Result<(), KnnError>;

    /// Predict the label of `query`.
    ///
    /// # Errors
    ///
    /// Implementation specific; see the implementor.
    fn classify(&self, query: &TimeSeries) -> Result<f64, KnnError>;

    /// Predict the label of every series of `queries`, in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing query and returns its error.
    fn classify_batch(&self, queries: &Dataset) -> Result<Vec<f64>, KnnError> {
        queries.iter().map(|q| self.classify(q)).collect()
    }
}

/// Training state shared by the nearest-neighbour classifiers.
#[derive(Debug, Clone, Default)]
pub(crate) struct TrainingState {
    pub(crate) trainset: Option<Dataset>,
    pub(crate) distances: Option<Arc<DistanceMatrix>>,
}

impl TrainingState {
    /// The bound training members, or [`KnnError::EmptyTrainingSet`].
    pub(crate) fn members(&self) -> Result<&[Arc<TimeSeries>], KnnError> {
        match &self.trainset {
            Some(trainset) if !trainset.is_empty() => Ok(trainset.as_slice()),
            _ => Err(KnnError::EmptyTrainingSet),
        }
    }

    /// Distances from `query` to every member, in member order.
    ///
    /// Read from the distance matrix when one is set, otherwise computed by
    /// the executor.
    pub(crate) fn distances<D: Distance + ?Sized>(
        &self,
        measure: &D,
        executor: &DistanceExecutor,
        query: &TimeSeries,
        cancel: &CancelToken,
    ) -> Result<Vec<f64>, KnnError> {
        let members = self.members()?;
        let result: Result<Vec<f64>, KnnError> = match &self.distances {
            Some(matrix) => {
                let q = matrix_index(matrix, query, "query")?;
                members
                    .iter()
                    .map(|m| Ok(matrix.get(q, matrix_index(matrix, m, "training")?)))
                    .collect()
            }
            None => executor.distances(measure, query, members, cancel),
        };
        let distances = result.map_err(|e| {
            if matches!(e, KnnError::Interrupted) {
                cancel.take();
            }
            e
        })?;
        if cancel.take() {
            return Err(KnnError::Interrupted);
        }
        Ok(distances)
    }
}

/// Filter every neighbour-matrix row down to members of `trainset`, keeping
/// at most `depth` per row. Empty unless both are present.
fn rank_members(
    neighbours: Option<&NeighbourMatrix>,
    trainset: Option<&Dataset>,
    depth: usize,
) -> Result<Vec<Vec<Arc<TimeSeries>>>, KnnError> {
    let (Some(neighbours), Some(trainset)) = (neighbours, trainset) else {
        return Ok(Vec::new());
    };

    let mut by_index = HashMap::with_capacity(trainset.len());
    for member in trainset {
        let index = member
            .index()
            .ok_or(KnnError::UnindexedSeries { role: "training" })?;
        by_index.insert(index, Arc::clone(member));
    }

    let ranked: Vec<Vec<Arc<TimeSeries>>> = neighbours
        .iter()
        .map(|row| {
            row.iter()
                .filter_map(|index| by_index.get(index).cloned())
                .take(depth)
                .collect()
        })
        .collect();
    debug!(rows = ranked.len(), depth, "neighbour rows ranked");
    Ok(ranked)
}

fn matrix_index(
    matrix: &DistanceMatrix,
    series: &TimeSeries,
    role: &'static str,
) -> Result<usize, KnnError> {
    let index = series.index().ok_or(KnnError::UnindexedSeries { role })?;
    if index >= matrix.len() {
        return Err(KnnError::MatrixOutOfBounds {
            index,
            len: matrix.len(),
        });
    }
    Ok(index)
}

/// k-nearest-neighbour classifier over any [`Distance`].
///
/// The `k` closest training series vote for their label, weighted by the
/// configured [`Weighting`]. The first `exclude` neighbours are dropped
/// before voting.
///
/// Distances come from, in order of preference:
/// 1. a [`NeighbourMatrix`] set with [`set_neighbours`][Self::set_neighbours],
///    when the query has an index it covers;
/// 2. a [`DistanceMatrix`] set with [`set_distances`][Self::set_distances];
/// 3. live computation, fanned out over the classifier's worker pool.
///
/// Matrices are addressed by [`TimeSeries::index`] and must cover the whole
/// dataset the training set was drawn from.
#[derive(Debug)]
pub struct KnnClassifier<D> {
    measure: D,
    k: usize,
    exclude: usize,
    weighting: Weighting,
    executor: DistanceExecutor,
    state: TrainingState,
    neighbours: Option<Arc<NeighbourMatrix>>,
    // Per neighbour-matrix row: closest training members, truncated to the
    // search depth.
    ranked: Vec<Vec<Arc<TimeSeries>>>,
    cancel: CancelToken,
}

impl<D: Distance> KnnClassifier<D> {
    /// Create a classifier voting over `k` neighbours with majority weighting.
    ///
    /// # Errors
    ///
    /// Returns [`KnnError::InvalidK`] if `k` is zero.
    pub fn new(measure: D, k: usize) -> Result<Self, KnnError> {
        if k == 0 {
            return Err(KnnError::InvalidK { k });
        }
        Ok(Self {
            measure,
            k,
            exclude: 0,
            weighting: Weighting::Majority,
            executor: DistanceExecutor::new(1),
            state: TrainingState::default(),
            neighbours: None,
            ranked: Vec::new(),
            cancel: CancelToken::new(),
        })
    }

    /// Return the distance measure.
    pub fn measure(&self) -> &D {
        &self.measure
    }

    /// Return the distance measure for reconfiguration.
    pub fn measure_mut(&mut self) -> &mut D {
        &mut self.measure
    }

    /// Return the number of voting neighbours.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Set the number of voting neighbours.
    ///
    /// `exclude` is reset to 0 if it is no longer smaller than `k`.
    ///
    /// # Errors
    ///
    /// Returns [`KnnError::InvalidK`] if `k` is zero.
    pub fn set_k(&mut self, k: usize) -> Result<(), KnnError> {
        if k == 0 {
            return Err(KnnError::InvalidK { k });
        }
        self.ranked = rank_members(
            self.neighbours.as_deref(),
            self.state.trainset.as_ref(),
            self.weighting.search_depth(k),
        )?;
        self.k = k;
        if self.exclude >= k {
            debug!(exclude = self.exclude, k, "exclude reset to 0");
            self.exclude = 0;
        }
        Ok(())
    }

    /// Return the number of excluded closest neighbours.
    #[must_use]
    pub fn exclude(&self) -> usize {
        self.exclude
    }

    /// Discard the `exclude` closest neighbours before voting.
    ///
    /// # Errors
    ///
    /// Returns [`KnnError::InvalidExclude`] if `exclude >= k`.
    pub fn set_exclude(&mut self, exclude: usize) -> Result<(), KnnError> {
        if exclude >= self.k {
            return Err(KnnError::InvalidExclude { exclude, k: self.k });
        }
        self.exclude = exclude;
        Ok(())
    }

    /// Return the weighting scheme.
    #[must_use]
    pub fn weighting(&self) -> Weighting {
        self.weighting
    }

    /// Replace the weighting scheme.
    ///
    /// # Errors
    ///
    /// Returns [`KnnError::InvalidWeighting`] for out-of-range parameters.
    pub fn set_weighting(&mut self, weighting: Weighting) -> Result<(), KnnError> {
        weighting.validate()?;
        self.ranked = rank_members(
            self.neighbours.as_deref(),
            self.state.trainset.as_ref(),
            weighting.search_depth(self.k),
        )?;
        self.weighting = weighting;
        Ok(())
    }

    /// Return the configured number of worker threads.
    #[must_use]
    pub fn number_of_threads(&self) -> usize {
        self.executor.threads()
    }

    /// Set the number of worker threads used per query.
    ///
    /// The pool is resized lazily on the next parallel batch.
    ///
    /// # Errors
    ///
    /// Returns [`KnnError::InvalidThreadCount`] if `threads` is zero.
    pub fn set_number_of_threads(&mut self, threads: usize) -> Result<(), KnnError> {
        if threads == 0 {
            return Err(KnnError::InvalidThreadCount { threads });
        }
        self.executor.set_threads(threads);
        Ok(())
    }

    /// Release the worker pool. Idempotent; a later query rebuilds it.
    pub fn shutdown(&self) {
        self.executor.shutdown();
    }

    /// Use a precomputed distance matrix instead of computing distances.
    pub fn set_distances(&mut self, distances: Option<Arc<DistanceMatrix>>) {
        self.state.distances = distances;
    }

    /// Use a precomputed neighbour matrix for indexed queries.
    ///
    /// # Errors
    ///
    /// Returns [`KnnError::UnindexedSeries`] if a training set is already
    /// bound and one of its members has no index. The previous matrix is
    /// kept.
    pub fn set_neighbours(
        &mut self,
        neighbours: Option<Arc<NeighbourMatrix>>,
    ) -> Result<(), KnnError> {
        self.ranked = rank_members(
            neighbours.as_deref(),
            self.state.trainset.as_ref(),
            self.weighting.search_depth(self.k),
        )?;
        self.neighbours = neighbours;
        Ok(())
    }

    /// Handle that interrupts this classifier's in-flight queries.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Closest neighbours of `query`, ascending, at most the search depth.
    fn search(&self, query: &TimeSeries) -> Result<Vec<Neighbour>, KnnError> {
        let members = self.state.members()?;
        let depth = self.weighting.search_depth(self.k);

        if let Some(ranked) = query.index().and_then(|i| self.ranked.get(i)) {
            let neighbours = ranked
                .iter()
                .map(|member| -> Result<Neighbour, KnnError> {
                    let d = match &self.state.distances {
                        Some(matrix) => matrix.get(
                            matrix_index(matrix, query, "query")?,
                            matrix_index(matrix, member, "training")?,
                        ),
                        None => self.measure.distance(query, member)?,
                    };
                    Ok(Neighbour::new(Arc::clone(member), d))
                })
                .collect::<Result<Vec<_>, _>>()?;
            if self.cancel.take() {
                return Err(KnnError::Interrupted);
            }
            return Ok(neighbours);
        }

        let distances = self
            .state
            .distances(&self.measure, &self.executor, query, &self.cancel)?;
        let mut list = SortedNeighbours::new(depth);
        for (member, d) in members.iter().zip(distances) {
            list.insert(Arc::clone(member), d);
        }
        Ok(list.as_slice().to_vec())
    }
}

impl<D: Distance> Classifier for KnnClassifier<D> {
    /// # Errors
    ///
    /// Returns [`KnnError::UnindexedSeries`] when a neighbour matrix is set
    /// and a training member has no index. The previous training set stays
    /// bound.
    #[instrument(skip_all, fields(measure = self.measure.name(), n = trainset.len()))]
    fn initialize(&mut self, trainset: &Dataset) -> Result<(), KnnError> {
        self.ranked = rank_members(
            self.neighbours.as_deref(),
            Some(trainset),
            self.weighting.search_depth(self.k),
        )?;
        self.state.trainset = Some(trainset.clone());
        info!(k = self.k, exclude = self.exclude, "knn classifier initialized");
        Ok(())
    }

    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`KnnError::EmptyTrainingSet`] | No training set, or an empty one |
    /// | [`KnnError::Distance`] | A distance computation failed, e.g. incomparable lengths |
    /// | [`KnnError::Interrupted`] | The cancel token was triggered |
    /// | [`KnnError::UnindexedSeries`] | A matrix is set and a series has no index |
    /// | [`KnnError::MatrixOutOfBounds`] | A series index is outside the distance matrix |
    /// | [`KnnError::NoNeighbours`] | Exclusion left no neighbour to vote |
    #[instrument(level = "debug", skip_all, fields(query = ?query.index()))]
    fn classify(&self, query: &TimeSeries) -> Result<f64, KnnError> {
        self.state.members()?;
        let neighbours = self.search(query)?;

        let ranked = &neighbours[self.exclude.min(neighbours.len())..];
        let voters = (self.k - self.exclude).min(ranked.len());
        match voters {
            0 => Err(KnnError::NoNeighbours),
            1 => Ok(ranked[0].label()),
            _ => self
                .weighting
                .vote(ranked, voters)
                .ok_or(KnnError::NoNeighbours),
        }
    }
}

impl<D: Clone> Clone for KnnClassifier<D> {
    /// Same measure, parameters, training set and matrices; a fresh worker
    /// pool and cancel token.
    fn clone(&self) -> Self {
        Self {
            measure: self.measure.clone(),
            k: self.k,
            exclude: self.exclude,
            weighting: self.weighting,
            executor: self.executor.clone(),
            state: self.state.clone(),
            neighbours: self.neighbours.clone(),
            ranked: self.ranked.clone(),
            cancel: CancelToken::new(),
        }
    }
}

impl<D> Drop for KnnClassifier<D> {
    fn drop(&mut self) {
        self.executor.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use kairos_distance::{Dtw, Pointwise, VectorDistance};

    use super::*;

    fn ts(value: f64, label: f64) -> TimeSeries {
        TimeSeries::new(vec![value], label).unwrap()
    }

    /// Training points on a line; the query at 0 sees them at distance |v|.
    fn line(points: &[(f64, f64)]) -> Dataset {
        Dataset::indexed(points.iter().map(|&(v, l)| ts(v, l)).collect())
    }

    fn manhattan() -> VectorDistance {
        VectorDistance::new(Pointwise::Manhattan).unwrap()
    }

    #[test]
    fn unweighted_three_nearest() {
        let mut knn = KnnClassifier::new(manhattan(), 3).unwrap();
        knn.initialize(&line(&[(1.0, 0.0), (2.0, 1.0), (3.0, 1.0), (10.0, 0.0)]))
            .unwrap();
        assert_eq!(knn.classify(&ts(0.0, -1.0)).unwrap(), 1.0);
    }

    #[test]
    fn empty_training_set() {
        let knn = KnnClassifier::new(manhattan(), 1).unwrap();
        assert!(matches!(
            knn.classify(&ts(0.0, 0.0)),
            Err(KnnError::EmptyTrainingSet)
        ));
        let mut knn = knn;
        knn.initialize(&Dataset::default()).unwrap();
        assert!(matches!(
            knn.classify(&ts(0.0, 0.0)),
            Err(KnnError::EmptyTrainingSet)
        ));
    }

    #[test]
    fn exclude_skips_closest() {
        // P at 0 (label 9), Q at 1 and R at 2 (label 5): majority over {Q, R}.
        let mut knn = KnnClassifier::new(manhattan(), 3).unwrap();
        knn.set_exclude(1).unwrap();
        knn.initialize(&line(&[(0.0, 9.0), (1.0, 5.0), (2.0, 5.0)]))
            .unwrap();
        assert_eq!(knn.classify(&ts(0.0, -1.0)).unwrap(), 5.0);
    }

    #[test]
    fn single_remaining_neighbour_short_circuits() {
        let mut knn = KnnClassifier::new(manhattan(), 2).unwrap();
        knn.set_exclude(1).unwrap();
        knn.initialize(&line(&[(0.0, 1.0), (1.0, 2.0), (5.0, 3.0)]))
            .unwrap();
        assert_eq!(knn.classify(&ts(0.0, -1.0)).unwrap(), 2.0);
    }

    #[test]
    fn set_k_resets_invalid_exclude() {
        let mut knn = KnnClassifier::new(manhattan(), 4).unwrap();
        knn.set_exclude(3).unwrap();
        knn.set_k(2).unwrap();
        assert_eq!(knn.exclude(), 0);
        assert!(matches!(
            knn.set_exclude(2),
            Err(KnnError::InvalidExclude { exclude: 2, k: 2 })
        ));
        assert!(matches!(knn.set_k(0), Err(KnnError::InvalidK { k: 0 })));
    }

    #[test]
    fn k_larger_than_training_set() {
        let mut knn = KnnClassifier::new(manhattan(), 10).unwrap();
        knn.initialize(&line(&[(1.0, 3.0), (2.0, 4.0), (3.0, 4.0)]))
            .unwrap();
        assert_eq!(knn.classify(&ts(0.0, -1.0)).unwrap(), 4.0);
    }

    #[test]
    fn incomparable_lengths_surface() {
        let mut knn = KnnClassifier::new(manhattan(), 1).unwrap();
        knn.initialize(&line(&[(1.0, 3.0)])).unwrap();
        let query = TimeSeries::new(vec![0.0, 0.0], 0.0).unwrap();
        assert!(matches!(
            knn.classify(&query),
            Err(KnnError::Distance(_))
        ));
    }

    #[test]
    fn distance_matrix_replaces_measure() {
        // Matrix says series 3 is closest to 0, though the values disagree.
        let data = line(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (50.0, 3.0)]);
        let matrix = DistanceMatrix::from_fn(4, |i, j| if (i, j) == (3, 0) { 0.1 } else { 5.0 });
        let mut knn = KnnClassifier::new(manhattan(), 1).unwrap();
        knn.set_distances(Some(Arc::new(matrix)));
        let trainset = Dataset::new(data.as_slice()[1..].to_vec());
        knn.initialize(&trainset).unwrap();
        assert_eq!(knn.classify(&data[0]).unwrap(), 3.0);

        assert!(matches!(
            knn.classify(&ts(0.0, 0.0)),
            Err(KnnError::UnindexedSeries { role: "query" })
        ));
    }

    #[test]
    fn neighbour_matrix_filters_to_training_members() {
        let data = line(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 2.0), (4.0, 1.0)]);
        let dtw = Dtw::unconstrained();
        let matrix = kairos_distance::pairwise(&dtw, data.as_slice()).unwrap();
        let neighbours = NeighbourMatrix::from_distances(&matrix);

        // Leave out series 1: the nearest training members of 0 are 2, 3, 4.
        let trainset = data.filter(|s| s.index() != Some(0) && s.index() != Some(1));
        let mut knn = KnnClassifier::new(Dtw::unconstrained(), 3).unwrap();
        knn.set_neighbours(Some(Arc::new(neighbours))).unwrap();
        knn.initialize(&trainset).unwrap();
        assert_eq!(knn.classify(&data[0]).unwrap(), 2.0);

        // Without the matrix the answer is the same.
        knn.set_neighbours(None).unwrap();
        assert_eq!(knn.classify(&data[0]).unwrap(), 2.0);
    }

    #[test]
    fn failed_initialize_keeps_previous_training_set() {
        let data = line(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 2.0)]);
        let matrix = kairos_distance::pairwise(&manhattan(), data.as_slice()).unwrap();
        let mut knn = KnnClassifier::new(manhattan(), 1).unwrap();
        knn.set_neighbours(Some(Arc::new(NeighbourMatrix::from_distances(&matrix))))
            .unwrap();
        knn.initialize(&data.filter(|s| s.index() != Some(0)))
            .unwrap();
        assert_eq!(knn.classify(&data[0]).unwrap(), 1.0);

        let unindexed = Dataset::new(vec![Arc::new(ts(0.5, 7.0))]);
        assert!(matches!(
            knn.initialize(&unindexed),
            Err(KnnError::UnindexedSeries { role: "training" })
        ));
        assert_eq!(knn.classify(&data[0]).unwrap(), 1.0);
        assert_eq!(knn.classify(&ts(0.4, -1.0)).unwrap(), 1.0);
    }

    #[test]
    fn failed_set_neighbours_keeps_previous_matrix() {
        let mut knn = KnnClassifier::new(manhattan(), 1).unwrap();
        knn.initialize(&Dataset::new(vec![Arc::new(ts(1.0, 3.0))]))
            .unwrap();
        let matrix = NeighbourMatrix::new(vec![vec![0]]).unwrap();
        assert!(knn.set_neighbours(Some(Arc::new(matrix))).is_err());
        assert!(knn.neighbours.is_none());
        assert_eq!(knn.classify(&ts(0.0, -1.0)).unwrap(), 3.0);
    }

    #[test]
    fn cancelled_query_reports_once() {
        let mut knn = KnnClassifier::new(manhattan(), 1).unwrap();
        knn.initialize(&line(&[(1.0, 3.0), (2.0, 4.0)])).unwrap();
        let token = knn.cancel_token();
        token.cancel();
        assert!(matches!(knn.classify(&ts(0.0, 0.0)), Err(KnnError::Interrupted)));
        assert!(!token.is_cancelled());
        assert_eq!(knn.classify(&ts(0.0, 0.0)).unwrap(), 3.0);
    }

    #[test]
    fn clone_is_independent() {
        let mut knn = KnnClassifier::new(manhattan(), 3).unwrap();
        knn.set_weighting(Weighting::Inverse { epsilon: 0.5 }).unwrap();
        knn.initialize(&line(&[(1.0, 3.0), (2.0, 4.0)])).unwrap();
        let copy = knn.clone();
        knn.cancel_token().cancel();
        assert_eq!(copy.weighting(), Weighting::Inverse { epsilon: 0.5 });
        assert_eq!(copy.k(), 3);
        assert!(copy.classify(&ts(0.0, 0.0)).is_ok());
    }

    #[test]
    fn batch_preserves_order() {
        let mut knn = KnnClassifier::new(manhattan(), 1).unwrap();
        knn.initialize(&line(&[(0.0, 0.0), (10.0, 1.0)])).unwrap();
        let queries = line(&[(9.0, -1.0), (1.0, -1.0), (8.0, -1.0)]);
        assert_eq!(knn.classify_batch(&queries).unwrap(), vec![1.0, 0.0, 1.0]);
    }
}
