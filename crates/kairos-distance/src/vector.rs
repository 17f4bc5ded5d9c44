//! Lock-step measures over equal-length series.

use crate::distance::Distance;
use crate::error::DistanceError;
use crate::memo::Memo;
use crate::params;
use crate::series::TimeSeries;

/// Point-by-point formula applied to the `y` values of two aligned series.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pointwise {
    /// `sqrt(sum (a_i - b_i)^2)`.
    Euclidean,
    /// `sum (a_i - b_i)^2`.
    SquaredEuclidean,
    /// `sum |a_i - b_i|`.
    Manhattan,
    /// `max |a_i - b_i|`.
    Chebyshev,
    /// `(sum |a_i - b_i|^p)^(1/p)`, `p > 0`.
    Minkowski {
        /// Order of the norm.
        p: f64,
    },
    /// `sum |a_i - b_i| / (|a_i| + |b_i|)`, skipping terms whose denominator is 0.
    Canberra,
    /// `1 - cos(a, b)`; 1 if exactly one series has zero norm, 0 if both do.
    Cosine,
}

impl Pointwise {
    fn name(self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::SquaredEuclidean => "squared_euclidean",
            Self::Manhattan => "manhattan",
            Self::Chebyshev => "chebyshev",
            Self::Minkowski { .. } => "minkowski",
            Self::Canberra => "canberra",
            Self::Cosine => "cosine",
        }
    }

    fn apply(self, a: &TimeSeries, b: &TimeSeries) -> f64 {
        let pairs = a.values().zip(b.values());
        match self {
            Self::Euclidean => pairs.map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt(),
            Self::SquaredEuclidean => pairs.map(|(x, y)| (x - y).powi(2)).sum(),
            Self::Manhattan => pairs.map(|(x, y)| (x - y).abs()).sum(),
            Self::Chebyshev => pairs.map(|(x, y)| (x - y).abs()).fold(0.0, f64::max),
            Self::Minkowski { p } => pairs
                .map(|(x, y)| (x - y).abs().powf(p))
                .sum::<f64>()
                .powf(p.recip()),
            Self::Canberra => pairs
                .filter_map(|(x, y)| {
                    let denom = x.abs() + y.abs();
                    (denom > 0.0).then(|| (x - y).abs() / denom)
                })
                .sum(),
            Self::Cosine => {
                let (mut dot, mut na, mut nb) = (0.0, 0.0, 0.0);
                for (x, y) in pairs {
                    dot += x * y;
                    na += x * x;
                    nb += y * y;
                }
                match (na > 0.0, nb > 0.0) {
                    (true, true) => 1.0 - dot / (na.sqrt() * nb.sqrt()),
                    (false, false) => 0.0,
                    _ => 1.0,
                }
            }
        }
    }
}

/// A lock-step measure with an optional memo.
///
/// Both series must have the same length.
#[derive(Debug, Clone)]
pub struct VectorDistance {
    kind: Pointwise,
    memo: Memo,
}

impl VectorDistance {
    /// Create a measure for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::InvalidParameter`] for a Minkowski order that
    /// is not finite and positive.
    pub fn new(kind: Pointwise) -> Result<Self, DistanceError> {
        if let Pointwise::Minkowski { p } = kind {
            params::check_positive("p", p)?;
        }
        Ok(Self {
            kind,
            memo: Memo::new(),
        })
    }

    /// Euclidean distance.
    #[must_use]
    pub fn euclidean() -> Self {
        Self {
            kind: Pointwise::Euclidean,
            memo: Memo::new(),
        }
    }

    /// Return the formula in use.
    #[must_use]
    pub fn kind(&self) -> Pointwise {
        self.kind
    }

    /// Set the Minkowski order.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::InvalidParameter`] if `p` is not finite and
    /// positive, or if the measure is not Minkowski.
    pub fn set_p(&mut self, p: f64) -> Result<(), DistanceError> {
        params::check_positive("p", p)?;
        let Pointwise::Minkowski { p: current } = self.kind else {
            return Err(DistanceError::InvalidParameter {
                name: "p",
                value: p,
                reason: "only the Minkowski measure has an order",
            });
        };
        if current != p {
            self.kind = Pointwise::Minkowski { p };
            self.memo.invalidate();
        }
        Ok(())
    }
}

impl Distance for VectorDistance {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn compute(&self, a: &TimeSeries, b: &TimeSeries) -> Result<f64, DistanceError> {
        params::check_same_length(a.len(), b.len())?;
        Ok(self.kind.apply(a, b))
    }

    fn memo(&self) -> Option<&Memo> {
        Some(&self.memo)
    }

    fn memo_mut(&mut self) -> Option<&mut Memo> {
        Some(&mut self.memo)
    }
}
