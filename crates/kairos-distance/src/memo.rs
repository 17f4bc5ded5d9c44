//! Opt-in memoization of pairwise distances keyed by series identity.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::series::TimeSeries;

/// Distance cache keyed by the `(index, index)` pair of two series.
///
/// Keys are normalised to ascending order, so a value stored for `(a, b)`
/// is recalled for `(b, a)`. Series without an assigned index are never
/// cached. The cache is read-shared across worker threads; writes take a
/// short exclusive lock.
#[derive(Debug, Default)]
pub struct Memo {
    storing: bool,
    entries: RwLock<HashMap<(usize, usize), f64>>,
}

impl Memo {
    /// Create a disabled memo.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return whether results are being stored and recalled.
    #[must_use]
    pub fn is_storing(&self) -> bool {
        self.storing
    }

    /// Enable or disable storing. Disabling also drops cached entries.
    pub fn set_storing(&mut self, storing: bool) {
        self.storing = storing;
        if !storing {
            self.invalidate();
        }
    }

    /// Drop every cached entry.
    pub fn invalidate(&mut self) {
        self.entries
            .get_mut()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
    }

    /// Return the cached distance between `a` and `b`, if any.
    #[must_use]
    pub fn recall(&self, a: &TimeSeries, b: &TimeSeries) -> Option<f64> {
        if !self.storing {
            return None;
        }
        let key = key(a, b)?;
        self.entries
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&key)
            .copied()
    }

    /// Store the distance between `a` and `b`.
    pub fn store(&self, a: &TimeSeries, b: &TimeSeries, distance: f64) {
        if !self.storing {
            return;
        }
        if let Some(key) = key(a, b) {
            self.entries
                .write()
                .unwrap_or_else(|p| p.into_inner())
                .insert(key, distance);
        }
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Return true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for Memo {
    fn clone(&self) -> Self {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner()).clone();
        Self {
            storing: self.storing,
            entries: RwLock::new(entries),
        }
    }
}

fn key(a: &TimeSeries, b: &TimeSeries) -> Option<(usize, usize)> {
    let (i, j) = (a.index()?, b.index()?);
    Some(if i <= j { (i, j) } else { (j, i) })
}
