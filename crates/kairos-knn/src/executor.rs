//! Query-time fan-out of distance computations over a worker pool.

use std::num::NonZeroUsize;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use kairos_distance::{Distance, TimeSeries};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, instrument};

use crate::cancel::CancelToken;
use crate::error::KnnError;

static GLOBAL_THREAD_LIMIT: AtomicUsize = AtomicUsize::new(usize::MAX);

/// Cap the worker count of every classifier in the process.
///
/// Takes effect the next time a pool is (re)built. A limit of 0 is treated
/// as 1.
pub fn set_global_thread_limit(limit: usize) {
    GLOBAL_THREAD_LIMIT.store(limit.max(1), Ordering::SeqCst);
}

/// Current process-wide worker cap.
#[must_use]
pub fn global_thread_limit() -> usize {
    GLOBAL_THREAD_LIMIT.load(Ordering::SeqCst)
}

fn available_processors() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Split `0..len` into `parts` contiguous ranges whose sizes differ by at
/// most one, earlier ranges taking the extra elements.
pub(crate) fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.clamp(1, len.max(1));
    let base = len / parts;
    let extra = len % parts;
    let mut out = Vec::with_capacity(parts);
    let mut start = 0;
    for p in 0..parts {
        let size = base + usize::from(p < extra);
        out.push(start..start + size);
        start += size;
    }
    out
}

/// Outcome of one chunk: its distances, or why it stopped. `Err(None)`
/// means the chunk gave up because a sibling failed first.
type ChunkResult = Result<Vec<f64>, Option<KnnError>>;

/// Per-classifier worker pool, built lazily and resized on demand.
#[derive(Debug)]
pub(crate) struct DistanceExecutor {
    threads: usize,
    pool: Mutex<Option<Arc<ThreadPool>>>,
}

impl DistanceExecutor {
    pub(crate) fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
            pool: Mutex::new(None),
        }
    }

    /// Configured thread count.
    pub(crate) fn threads(&self) -> usize {
        self.threads
    }

    pub(crate) fn set_threads(&mut self, threads: usize) {
        self.threads = threads.max(1);
    }

    /// Threads a batch may use: configured count capped by the global limit
    /// and the processor count.
    pub(crate) fn effective_threads(&self) -> usize {
        self.threads
            .min(global_thread_limit())
            .min(available_processors())
            .max(1)
    }

    /// Drop the pool. A later batch builds a new one.
    pub(crate) fn shutdown(&self) {
        let mut pool = self.pool.lock().unwrap_or_else(|p| p.into_inner());
        if pool.take().is_some() {
            debug!("worker pool shut down");
        }
    }

    fn pool(&self, threads: usize) -> Result<Arc<ThreadPool>, KnnError> {
        let mut slot = self.pool.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(pool) = slot.as_ref()
            && pool.current_num_threads() == threads
        {
            return Ok(Arc::clone(pool));
        }
        let pool = Arc::new(
            ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("kairos-knn-{i}"))
                .build()
                .map_err(|source| KnnError::ThreadPool { source })?,
        );
        debug!(threads, "worker pool built");
        *slot = Some(Arc::clone(&pool));
        Ok(pool)
    }

    #[cfg(test)]
    fn current_pool(&self) -> Option<Arc<ThreadPool>> {
        self.pool.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Distances from `query` to every member, in member order.
    ///
    /// Memoized distances are recalled first; only the misses are computed,
    /// split into at most one contiguous chunk per worker. The pool is sized
    /// by [`effective_threads`][Self::effective_threads] alone, so batches
    /// with few misses reuse it. Every worker checks
    /// `cancel` and a per-batch poison flag before each element, so the first
    /// failure stops the remaining work.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`KnnError::Interrupted`] | `cancel` was triggered during the batch |
    /// | [`KnnError::Distance`] | A distance computation failed |
    /// | [`KnnError::ThreadPool`] | The pool could not be built |
    #[instrument(skip_all, fields(members = members.len()))]
    pub(crate) fn distances<D>(
        &self,
        measure: &D,
        query: &TimeSeries,
        members: &[Arc<TimeSeries>],
        cancel: &CancelToken,
    ) -> Result<Vec<f64>, KnnError>
    where
        D: Distance + ?Sized,
    {
        let mut out: Vec<f64> = vec![f64::NAN; members.len()];
        let mut pending = Vec::new();
        for (i, member) in members.iter().enumerate() {
            match measure.recall(query, member) {
                Some(d) => out[i] = d,
                None => pending.push(i),
            }
        }
        if pending.is_empty() {
            return Ok(out);
        }

        let threads = self.effective_threads();
        let parts = threads.min(pending.len());
        debug!(pending = pending.len(), threads, parts, "dispatching distance batch");

        if parts <= 1 {
            for &i in &pending {
                if cancel.is_cancelled() {
                    return Err(KnnError::Interrupted);
                }
                out[i] = measure.distance(query, &members[i])?;
            }
            return Ok(out);
        }

        let pool = self.pool(threads)?;
        let chunks = partition(pending.len(), parts);
        let poison = AtomicBool::new(false);

        let outcomes: Vec<ChunkResult> = pool.install(|| {
            chunks
                .par_iter()
                .map(|range| {
                    let mut values = Vec::with_capacity(range.len());
                    for &i in &pending[range.clone()] {
                        if poison.load(Ordering::Relaxed) {
                            return Err(None);
                        }
                        if cancel.is_cancelled() {
                            poison.store(true, Ordering::Relaxed);
                            return Err(Some(KnnError::Interrupted));
                        }
                        match measure.distance(query, &members[i]) {
                            Ok(d) => values.push(d),
                            Err(e) => {
                                poison.store(true, Ordering::Relaxed);
                                return Err(Some(e.into()));
                            }
                        }
                    }
                    Ok(values)
                })
                .collect()
        });

        let mut abandoned = false;
        for (range, outcome) in chunks.iter().zip(outcomes) {
            match outcome {
                Ok(values) => {
                    for (&i, d) in pending[range.clone()].iter().zip(values) {
                        out[i] = d;
                    }
                }
                Err(Some(e)) => return Err(e),
                Err(None) => abandoned = true,
            }
        }
        if abandoned {
            // Poison is only set next to a reported error.
            return Err(KnnError::Interrupted);
        }
        Ok(out)
    }
}

impl Clone for DistanceExecutor {
    fn clone(&self) -> Self {
        Self::new(self.threads)
    }
}

#[cfg(test)]
mod tests {
    use kairos_distance::{DistanceError, Dtw, Memo};

    use super::*;

    fn members(n: usize) -> Vec<Arc<TimeSeries>> {
        (0..n)
            .map(|i| {
                Arc::new(
                    TimeSeries::new(vec![i as f64, (i % 3) as f64, 1.0], 0.0)
                        .unwrap()
                        .with_index(i + 1),
                )
            })
            .collect()
    }

    fn query() -> TimeSeries {
        TimeSeries::new(vec![0.5, 1.0, 1.5], 0.0).unwrap().with_index(0)
    }

    /// Fails on one member and counts computations.
    struct Failing {
        fail_on: usize,
        calls: AtomicUsize,
    }

    impl Distance for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn compute(&self, _a: &TimeSeries, b: &TimeSeries) -> Result<f64, DistanceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if b.index() == Some(self.fail_on) {
                Err(DistanceError::IncomparableLength { a_len: 1, b_len: 2 })
            } else {
                Ok(1.0)
            }
        }
    }

    /// Records memo hits through a real memo.
    struct Memoized {
        memo: Memo,
        calls: AtomicUsize,
    }

    impl Distance for Memoized {
        fn name(&self) -> &'static str {
            "memoized"
        }

        fn compute(&self, _a: &TimeSeries, b: &TimeSeries) -> Result<f64, DistanceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(b.y(0))
        }

        fn memo(&self) -> Option<&Memo> {
            Some(&self.memo)
        }

        fn memo_mut(&mut self) -> Option<&mut Memo> {
            Some(&mut self.memo)
        }
    }

    #[test]
    fn partition_is_contiguous_and_balanced() {
        assert_eq!(partition(10, 3), vec![0..4, 4..7, 7..10]);
        assert_eq!(partition(2, 5), vec![0..1, 1..2]);
        assert_eq!(partition(0, 4), vec![0..0]);
    }

    #[test]
    fn parallel_matches_sequential_order() {
        let dtw = Dtw::unconstrained();
        let members = members(37);
        let q = query();
        let sequential = DistanceExecutor::new(1)
            .distances(&dtw, &q, &members, &CancelToken::new())
            .unwrap();
        let parallel = DistanceExecutor::new(4)
            .distances(&dtw, &q, &members, &CancelToken::new())
            .unwrap();
        assert_eq!(sequential, parallel);
        for (member, d) in members.iter().zip(&sequential) {
            assert_eq!(*d, dtw.distance(&q, member).unwrap());
        }
    }

    #[test]
    fn first_error_propagates_and_pool_stays_usable() {
        let executor = DistanceExecutor::new(4);
        let members = members(40);
        let failing = Failing {
            fail_on: 5,
            calls: AtomicUsize::new(0),
        };
        let result = executor.distances(&failing, &query(), &members, &CancelToken::new());
        assert!(matches!(
            result,
            Err(KnnError::Distance(DistanceError::IncomparableLength { .. }))
        ));

        let dtw = Dtw::unconstrained();
        let again = executor.distances(&dtw, &query(), &members, &CancelToken::new());
        assert_eq!(again.unwrap().len(), 40);
    }

    #[test]
    fn cancelled_batch_is_interrupted() {
        let token = CancelToken::new();
        token.cancel();
        for threads in [1, 4] {
            let result = DistanceExecutor::new(threads).distances(
                &Dtw::unconstrained(),
                &query(),
                &members(12),
                &token,
            );
            assert!(matches!(result, Err(KnnError::Interrupted)), "threads {threads}");
        }
    }

    #[test]
    fn memo_hits_skip_dispatch() {
        let mut measure = Memoized {
            memo: Memo::new(),
            calls: AtomicUsize::new(0),
        };
        measure.set_storing(true);
        let members = members(20);
        let executor = DistanceExecutor::new(4);

        let first = executor
            .distances(&measure, &query(), &members, &CancelToken::new())
            .unwrap();
        assert_eq!(measure.calls.load(Ordering::SeqCst), 20);

        let second = executor
            .distances(&measure, &query(), &members, &CancelToken::new())
            .unwrap();
        assert_eq!(measure.calls.load(Ordering::SeqCst), 20);
        assert_eq!(first, second);
    }

    #[test]
    fn small_batches_reuse_the_pool() {
        let executor = DistanceExecutor::new(4);
        let dtw = Dtw::unconstrained();
        let q = query();
        executor
            .distances(&dtw, &q, &members(40), &CancelToken::new())
            .unwrap();
        let first = executor.current_pool();
        executor
            .distances(&dtw, &q, &members(2), &CancelToken::new())
            .unwrap();
        executor
            .distances(&dtw, &q, &members(3), &CancelToken::new())
            .unwrap();
        let last = executor.current_pool();
        match (first, last) {
            (Some(first), Some(last)) => {
                assert!(Arc::ptr_eq(&first, &last));
                assert_eq!(last.current_num_threads(), executor.effective_threads());
            }
            (None, None) => assert!(executor.effective_threads() < 2),
            _ => panic!("pool appeared or vanished between batches"),
        }
    }

    #[test]
    fn shutdown_then_reuse() {
        let executor = DistanceExecutor::new(2);
        let dtw = Dtw::unconstrained();
        executor
            .distances(&dtw, &query(), &members(8), &CancelToken::new())
            .unwrap();
        executor.shutdown();
        executor.shutdown();
        assert!(
            executor
                .distances(&dtw, &query(), &members(8), &CancelToken::new())
                .is_ok()
        );
    }

    #[test]
    fn effective_threads_capped_by_processors() {
        let executor = DistanceExecutor::new(usize::MAX);
        assert!(executor.effective_threads() <= available_processors());
        assert!(executor.effective_threads() >= 1);
    }
}
