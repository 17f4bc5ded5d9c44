//! Bounded, distance-sorted neighbour list.

use std::sync::Arc;

use kairos_distance::TimeSeries;

/// A training series and its distance from the query.
#[derive(Debug, Clone)]
pub struct Neighbour {
    /// The training series.
    pub series: Arc<TimeSeries>,
    /// Distance from the query.
    pub distance: f64,
}

impl Neighbour {
    /// Pair a series with its distance.
    #[must_use]
    pub fn new(series: Arc<TimeSeries>, distance: f64) -> Self {
        Self { series, distance }
    }

    /// Label of the neighbouring series.
    #[must_use]
    pub fn label(&self) -> f64 {
        self.series.label()
    }
}

/// Ascending list of at most `capacity` neighbours.
///
/// A candidate is inserted while the list is not full, or when it is
/// strictly closer than the current farthest entry, which is then evicted.
/// Candidates at an equal distance go after the entries already present,
/// so ties keep insertion order.
#[derive(Debug, Clone)]
pub struct SortedNeighbours {
    capacity: usize,
    items: Vec<Neighbour>,
}

impl SortedNeighbours {
    /// Create an empty list holding at most `capacity` neighbours.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::with_capacity(capacity.min(64)),
        }
    }

    /// Offer a candidate. Returns true if it was kept.
    ///
    /// NaN distances are never kept.
    pub fn insert(&mut self, series: Arc<TimeSeries>, distance: f64) -> bool {
        if self.capacity == 0 || distance.is_nan() {
            return false;
        }
        if self.is_full()
            && let Some(last) = self.items.last()
            && distance >= last.distance
        {
            return false;
        }
        let position = self.items.partition_point(|n| n.distance <= distance);
        self.items.insert(position, Neighbour::new(series, distance));
        self.items.truncate(self.capacity);
        true
    }

    /// Maximum number of neighbours kept.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of neighbours currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Return true if no neighbour is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Return true once `capacity` neighbours are held.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Closest neighbour.
    #[must_use]
    pub fn first(&self) -> Option<&Neighbour> {
        self.items.first()
    }

    /// Farthest neighbour kept.
    #[must_use]
    pub fn last(&self) -> Option<&Neighbour> {
        self.items.last()
    }

    /// Neighbours in ascending distance order.
    #[must_use]
    pub fn as_slice(&self) -> &[Neighbour] {
        &self.items
    }

    /// Iterate in ascending distance order.
    pub fn iter(&self) -> std::slice::Iter<'_, Neighbour> {
        self.items.iter()
    }
}
