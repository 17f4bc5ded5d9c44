//! The distance capability shared by every measure.

use crate::error::DistanceError;
use crate::memo::Memo;
use crate::series::TimeSeries;

/// A distance between two time series.
///
/// Implementors provide [`compute`][Distance::compute], the raw algorithm,
/// and may expose a [`Memo`]. Callers use [`distance`][Distance::distance],
/// which consults the memo first and stores fresh results.
pub trait Distance: Send + Sync {
    /// Short stable name of the measure, e.g. `"dtw"`.
    fn name(&self) -> &'static str;

    /// Compute the distance without consulting the memo.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::IncomparableLength`] when the measure requires
    /// equal-length series and the lengths differ.
    fn compute(&self, a: &TimeSeries, b: &TimeSeries) -> Result<f64, DistanceError>;

    /// The memo backing this measure, if it has one.
    fn memo(&self) -> Option<&Memo> {
        None
    }

    /// Mutable access to the memo, used to toggle storing.
    fn memo_mut(&mut self) -> Option<&mut Memo> {
        None
    }

    /// Enable or disable result memoization. No-op for measures without a memo.
    fn set_storing(&mut self, storing: bool) {
        if let Some(memo) = self.memo_mut() {
            memo.set_storing(storing);
        }
    }

    /// Return the memoized distance between `a` and `b`, if any.
    fn recall(&self, a: &TimeSeries, b: &TimeSeries) -> Option<f64> {
        self.memo().and_then(|memo| memo.recall(a, b))
    }

    /// Compute the distance, recalling and storing through the memo.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`compute`][Distance::compute].
    fn distance(&self, a: &TimeSeries, b: &TimeSeries) -> Result<f64, DistanceError> {
        let Some(memo) = self.memo() else {
            return self.compute(a, b);
        };
        if let Some(d) = memo.recall(a, b) {
            return Ok(d);
        }
        let d = self.compute(a, b)?;
        memo.store(a, b, d);
        Ok(d)
    }
}

impl<D: Distance + ?Sized> Distance for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn compute(&self, a: &TimeSeries, b: &TimeSeries) -> Result<f64, DistanceError> {
        (**self).compute(a, b)
    }

    fn memo(&self) -> Option<&Memo> {
        (**self).memo()
    }

    fn memo_mut(&mut self) -> Option<&mut Memo> {
        (**self).memo_mut()
    }

    fn distance(&self, a: &TimeSeries, b: &TimeSeries) -> Result<f64, DistanceError> {
        (**self).distance(a, b)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Counts how often the raw computation runs.
    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        memo: Memo,
    }

    impl Distance for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn compute(&self, a: &TimeSeries, b: &TimeSeries) -> Result<f64, DistanceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((a.y(0) - b.y(0)).abs())
        }

        fn memo(&self) -> Option<&Memo> {
            Some(&self.memo)
        }

        fn memo_mut(&mut self) -> Option<&mut Memo> {
            Some(&mut self.memo)
        }
    }

    fn series(value: f64, index: usize) -> TimeSeries {
        TimeSeries::new(vec![value], 0.0).unwrap().with_index(index)
    }

    #[test]
    fn storing_skips_second_computation() {
        let mut d = Counting::default();
        d.set_storing(true);
        let (a, b) = (series(1.0, 0), series(4.0, 1));

        let first = d.distance(&a, &b).unwrap();
        let second = d.distance(&a, &b).unwrap();
        let swapped = d.distance(&b, &a).unwrap();

        assert_eq!(first.to_bits(), second.to_bits());
        assert_eq!(first.to_bits(), swapped.to_bits());
        assert_eq!(d.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn not_storing_recomputes() {
        let d = Counting::default();
        let (a, b) = (series(1.0, 0), series(4.0, 1));
        d.distance(&a, &b).unwrap();
        d.distance(&a, &b).unwrap();
        assert_eq!(d.calls.load(Ordering::SeqCst), 2);
        assert_eq!(d.recall(&a, &b), None);
    }

    #[test]
    fn boxed_measure_delegates_memo() {
        let mut d: Box<dyn Distance> = Box::new(Counting::default());
        d.set_storing(true);
        let (a, b) = (series(0.0, 0), series(2.0, 1));
        d.distance(&a, &b).unwrap();
        assert_eq!(d.recall(&a, &b), Some(2.0));
    }
}
