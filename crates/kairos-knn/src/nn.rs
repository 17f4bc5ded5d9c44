//! One-nearest-neighbour classifier.

use std::sync::Arc;

use kairos_distance::{Dataset, Distance, DistanceMatrix, TimeSeries};
use tracing::{info, instrument};

use crate::cancel::CancelToken;
use crate::classifier::{Classifier, TrainingState};
use crate::error::KnnError;
use crate::executor::DistanceExecutor;

/// Labels a query with the label of its single closest training series.
///
/// On equal distances the earlier training member wins. Distances come from
/// a [`DistanceMatrix`] when one is set, otherwise from the measure.
#[derive(Debug)]
pub struct NnClassifier<D> {
    measure: D,
    executor: DistanceExecutor,
    state: TrainingState,
    cancel: CancelToken,
}

impl<D: Distance> NnClassifier<D> {
    /// Create an untrained classifier computing on one thread.
    pub fn new(measure: D) -> Self {
        Self {
            measure,
            executor: DistanceExecutor::new(1),
            state: TrainingState::default(),
            cancel: CancelToken::new(),
        }
    }

    /// Return the distance measure.
    pub fn measure(&self) -> &D {
        &self.measure
    }

    /// Return the distance measure for reconfiguration.
    pub fn measure_mut(&mut self) -> &mut D {
        &mut self.measure
    }

    /// Return the configured number of worker threads.
    #[must_use]
    pub fn number_of_threads(&self) -> usize {
        self.executor.threads()
    }

    /// Set the number of worker threads used per query.
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

    /// Release the worker pool.
    pub fn shutdown(&self) {
        self.executor.shutdown();
    }

    /// Use a precomputed distance matrix, indexed by series index, instead
    /// of computing distances. `None` restores on-demand computation.
    pub fn set_distances(&mut self, distances: Option<Arc<DistanceMatrix>>) {
        self.state.distances = distances;
    }

    /// Handle that interrupts this classifier's in-flight queries.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

impl<D: Distance> Classifier for NnClassifier<D> {
    #[instrument(skip_all, fields(measure = self.measure.name(), n = trainset.len()))]
    fn initialize(&mut self, trainset: &Dataset) -> Result<(), KnnError> {
        self.state.trainset = Some(trainset.clone());
        info!("1nn classifier initialized");
        Ok(())
    }

    /// # Errors
    ///
    /// Same conditions as [`KnnClassifier::classify`][crate::KnnClassifier],
    /// except [`KnnError::NoNeighbours`], which cannot occur.
    #[instrument(level = "debug", skip_all, fields(query = ?query.index()))]
    fn classify(&self, query: &TimeSeries) -> Result<f64, KnnError> {
        let members = self.state.members()?;
        let distances = self
            .state
            .distances(&self.measure, &self.executor, query, &self.cancel)?;

        let mut best = 0;
        for (i, &d) in distances.iter().enumerate().skip(1) {
            if d < distances[best] {
                best = i;
            }
        }
        Ok(members[best].label())
    }
}

impl<D: Clone> Clone for NnClassifier<D> {
    fn clone(&self) -> Self {
        Self {
            measure: self.measure.clone(),
            executor: self.executor.clone(),
            state: self.state.clone(),
            cancel: CancelToken::new(),
        }
    }
}

impl<D> Drop for NnClassifier<D> {
    fn drop(&mut self) {
        self.executor.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use kairos_distance::{Dtw, Erp};

    use super::*;

    fn dataset(rows: &[(&[f64], f64)]) -> Dataset {
        Dataset::indexed(
            rows.iter()
                .map(|(v, l)| TimeSeries::new(v.to_vec(), *l).unwrap())
                .collect(),
        )
    }

    #[test]
    fn picks_closest() {
        let mut nn = NnClassifier::new(Dtw::unconstrained());
        nn.initialize(&dataset(&[
            (&[0.0, 0.0, 0.0], 1.0),
            (&[5.0, 5.0, 5.0], 2.0),
        ]))
        .unwrap();
        let query = TimeSeries::new(vec![4.0, 5.0, 6.0], 0.0).unwrap();
        assert_eq!(nn.classify(&query).unwrap(), 2.0);
    }

    #[test]
    fn tie_goes_to_first_member() {
        let mut nn = NnClassifier::new(Erp::default());
        nn.initialize(&dataset(&[(&[1.0], 7.0), (&[-1.0], 3.0)]))
            .unwrap();
        let query = TimeSeries::new(vec![0.0], 0.0).unwrap();
        assert_eq!(nn.classify(&query).unwrap(), 7.0);
    }

    #[test]
    fn parallel_agrees_with_sequential() {
        let rows: Vec<(Vec<f64>, f64)> = (0..30)
            .map(|i| (vec![i as f64, (i * 7 % 5) as f64], f64::from(i % 4)))
            .collect();
        let data = Dataset::indexed(
            rows.iter()
                .map(|(v, l)| TimeSeries::new(v.clone(), *l).unwrap())
                .collect(),
        );
        let mut sequential = NnClassifier::new(Dtw::unconstrained());
        sequential.initialize(&data).unwrap();
        let mut parallel = sequential.clone();
        parallel.set_number_of_threads(4).unwrap();

        for q in [[3.2, 1.0], [17.9, 4.0], [-2.0, 0.0]] {
            let query = TimeSeries::new(q.to_vec(), 0.0).unwrap();
            assert_eq!(
                sequential.classify(&query).unwrap(),
                parallel.classify(&query).unwrap()
            );
        }
    }

    #[test]
    fn untrained_is_empty() {
        let nn = NnClassifier::new(Dtw::unconstrained());
        let query = TimeSeries::new(vec![0.0], 0.0).unwrap();
        assert!(matches!(nn.classify(&query), Err(KnnError::EmptyTrainingSet)));
    }
}
