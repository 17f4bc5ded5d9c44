//! Neighbour weighting schemes and the voting rule.

use crate::error::KnnError;
use crate::neighbours::Neighbour;

/// How each neighbour's vote is weighted.
///
/// Ranks are 0-based over the voting neighbours (after exclusion), `count`
/// is their number, `d_1` the closest distance and `d_k` the farthest
/// voting distance. Distance-difference schemes fall back to a factor of 1
/// when the difference they divide by is zero.
///
/// | Scheme | Weight |
/// |---|---|
/// | `Majority` | `1` |
/// | `Rank` | `count - rank` |
/// | `Uniform` | `1 / (rank + 1)` |
/// | `Fibonacci` | `F(count - rank)`, `F(1) = F(2) = 1` |
/// | `Inverse` | `1 / (d + epsilon)` |
/// | `InverseSquared` | `1 / (d^2 + epsilon)` |
/// | `Dudani` | `(d_k - d) / (d_k - d_1)` |
/// | `Macleod` | `((d_s - d) + alpha (d_s - d_1)) / ((1 + alpha)(d_s - d_1))` |
/// | `Zavrel` | `exp(-alpha d^beta)` |
/// | `DualUniform` | Dudani weight `* 1 / (rank + 1)` |
/// | `DualDistance` | Dudani weight `* (d_k + d_1) / (d_k + d)` |
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum Weighting {
    /// Unweighted majority vote.
    #[default]
    Majority,
    /// Linearly decreasing integer weight by rank.
    Rank,
    /// Inverse rank.
    Uniform,
    /// Fibonacci number of the reversed rank.
    Fibonacci,
    /// Inverse distance.
    Inverse {
        /// Added to the distance; 0 lets an exact match outvote everything.
        epsilon: f64,
    },
    /// Inverse squared distance.
    InverseSquared {
        /// Added to the squared distance.
        epsilon: f64,
    },
    /// Dudani's linear distance weighting.
    Dudani,
    /// Macleod's weighting against the `s`-th neighbour.
    Macleod {
        /// Position (1-based) of the reference neighbour; the search depth is
        /// extended to at least `s`.
        s: usize,
        /// Blend between Dudani (`0`) and majority (large values).
        alpha: f64,
    },
    /// Zavrel's exponential decay.
    Zavrel {
        /// Decay rate.
        alpha: f64,
        /// Distance exponent.
        beta: f64,
    },
    /// Dudani weight times inverse rank.
    DualUniform,
    /// Dudani weight times the Gou dual-distance factor.
    DualDistance,
}

impl Weighting {
    /// Check the scheme's parameters.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`KnnError::InvalidWeighting`] | `epsilon`, `alpha` or `beta` negative or non-finite |
    /// | [`KnnError::InvalidWeighting`] | Macleod `s` is zero |
    pub fn validate(&self) -> Result<(), KnnError> {
        match *self {
            Self::Inverse { epsilon } | Self::InverseSquared { epsilon } => {
                non_negative("epsilon", epsilon)
            }
            Self::Macleod { s, alpha } => {
                if s == 0 {
                    return Err(KnnError::InvalidWeighting {
                        name: "s",
                        value: 0.0,
                        reason: "must be at least 1",
                    });
                }
                non_negative("alpha", alpha)
            }
            Self::Zavrel { alpha, beta } => {
                non_negative("alpha", alpha)?;
                non_negative("beta", beta)
            }
            _ => Ok(()),
        }
    }

    /// Number of neighbours to search for when voting with `k`.
    #[must_use]
    pub fn search_depth(&self, k: usize) -> usize {
        match *self {
            Self::Macleod { s, .. } => k.max(s),
            _ => k,
        }
    }

    /// Weight of every voting neighbour.
    ///
    /// `voters` are the first neighbours of `ranked`, which may hold extra
    /// neighbours beyond them (used only by Macleod's reference distance).
    #[must_use]
    pub fn weights(&self, ranked: &[Neighbour], voters: usize) -> Vec<f64> {
        let voters = &ranked[..voters.min(ranked.len())];
        let count = voters.len();
        let (Some(first), Some(last)) = (voters.first(), voters.last()) else {
            return Vec::new();
        };
        let (d_1, d_k) = (first.distance, last.distance);

        match *self {
            Self::Majority => vec![1.0; count],
            Self::Rank => (0..count).map(|rank| (count - rank) as f64).collect(),
            Self::Uniform => (0..count).map(|rank| 1.0 / (rank + 1) as f64).collect(),
            Self::Fibonacci => {
                let fib = fibonacci(count);
                (0..count).map(|rank| fib[count - rank]).collect()
            }
            Self::Inverse { epsilon } => voters
                .iter()
                .map(|n| 1.0 / (n.distance + epsilon))
                .collect(),
            Self::InverseSquared { epsilon } => voters
                .iter()
                .map(|n| 1.0 / (n.distance * n.distance + epsilon))
                .collect(),
            Self::Dudani => voters.iter().map(|n| dudani(n.distance, d_1, d_k)).collect(),
            Self::Macleod { s, alpha } => {
                let d_s = ranked[s.clamp(1, ranked.len()) - 1].distance;
                let diff = d_s - d_1;
                voters
                    .iter()
                    .map(|n| {
                        if diff == 0.0 {
                            1.0
                        } else {
                            ((d_s - n.distance) + alpha * diff) / ((1.0 + alpha) * diff)
                        }
                    })
                    .collect()
            }
            Self::Zavrel { alpha, beta } => voters
                .iter()
                .map(|n| (-alpha * n.distance.powf(beta)).exp())
                .collect(),
            Self::DualUniform => voters
                .iter()
                .enumerate()
                .map(|(rank, n)| dudani(n.distance, d_1, d_k) / (rank + 1) as f64)
                .collect(),
            Self::DualDistance => voters
                .iter()
                .map(|n| {
                    let denom = d_k + n.distance;
                    let dual = if denom == 0.0 { 1.0 } else { (d_k + d_1) / denom };
                    dudani(n.distance, d_1, d_k) * dual
                })
                .collect(),
        }
    }

    /// Pick the winning label among the first `voters` neighbours of `ranked`.
    ///
    /// Neighbours are scanned in ascending distance order, accumulating
    /// weight per label; the running best changes only on a strictly greater
    /// total, so a label that merely ties the leader never takes over. Returns
    /// `None` when there is no voter.
    #[must_use]
    pub fn vote(&self, ranked: &[Neighbour], voters: usize) -> Option<f64> {
        let weights = self.weights(ranked, voters);
        let mut totals: Vec<(f64, f64)> = Vec::new();
        let mut best: Option<(f64, f64)> = None;

        for (neighbour, weight) in ranked.iter().zip(weights) {
            let label = neighbour.label();
            let total = match totals.iter_mut().find(|(l, _)| *l == label) {
                Some((_, acc)) => {
                    *acc += weight;
                    *acc
                }
                None => {
                    totals.push((label, weight));
                    weight
                }
            };
            match best {
                Some((_, best_total)) if total <= best_total => {}
                _ => best = Some((label, total)),
            }
        }
        best.map(|(label, _)| label)
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), KnnError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(KnnError::InvalidWeighting {
            name,
            value,
            reason: "must be finite and >= 0",
        })
    }
}

fn dudani(d: f64, d_1: f64, d_k: f64) -> f64 {
    let diff = d_k - d_1;
    if diff == 0.0 { 1.0 } else { (d_k - d) / diff }
}

/// `out[i] = F(i)` for `i` in `0..=n`, with `F(0) = 0`, `F(1) = F(2) = 1`.
fn fibonacci(n: usize) -> Vec<f64> {
    let mut out = vec![0.0; n + 1];
    for i in 1..=n {
        out[i] = if i <= 2 { 1.0 } else { out[i - 1] + out[i - 2] };
    }
    out
}
