//! Choosing a measure by value.

use crate::constraint::GlobalConstraint;
use crate::distance::Distance;
use crate::dtw::Dtw;
use crate::erp::Erp;
use crate::error::DistanceError;
use crate::lcs::Lcs;
use crate::memo::Memo;
use crate::series::TimeSeries;
use crate::twed::Twed;
use crate::vector::{Pointwise, VectorDistance};

/// Serializable description of a measure and its parameters.
///
/// ```
/// use kairos_distance::{GlobalConstraint, MeasureConfig, Window};
///
/// let config: MeasureConfig = serde_json::from_str(
///     r#"{"measure":"dtw","constraint":{"sakoe_chiba":{"relative":10.0}}}"#,
/// ).unwrap();
/// assert_eq!(
///     config,
///     MeasureConfig::Dtw { constraint: GlobalConstraint::SakoeChiba(Window::Relative(10.0)) },
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "measure", rename_all = "snake_case")]
pub enum MeasureConfig {
    /// Dynamic Time Warping.
    Dtw {
        /// Global constraint.
        #[serde(default)]
        constraint: GlobalConstraint,
    },
    /// Longest Common Subsequence.
    Lcs {
        /// Matching threshold.
        epsilon: f64,
        /// Global constraint.
        #[serde(default)]
        constraint: GlobalConstraint,
    },
    /// Edit distance with Real Penalty.
    Erp {
        /// Gap value.
        #[serde(default)]
        g: f64,
        /// Global constraint.
        #[serde(default)]
        constraint: GlobalConstraint,
    },
    /// Time Warp Edit Distance.
    Twed {
        /// Stiffness.
        nu: f64,
        /// Deletion penalty.
        lambda: f64,
        /// Global constraint.
        #[serde(default)]
        constraint: GlobalConstraint,
    },
    /// A lock-step measure.
    Vector {
        /// The formula.
        metric: Pointwise,
    },
}

impl MeasureConfig {
    /// Build the configured measure.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::InvalidParameter`] for out-of-range
    /// parameters, including relative warping windows outside `[0, 100]`.
    pub fn build(&self) -> Result<Measure, DistanceError> {
        Ok(match *self {
            Self::Dtw { constraint } => Measure::Dtw(Dtw::with_constraint(constraint)?),
            Self::Lcs {
                epsilon,
                constraint,
            } => Measure::Lcs(Lcs::with_constraint(epsilon, constraint)?),
            Self::Erp { g, constraint } => Measure::Erp(Erp::with_constraint(g, constraint)?),
            Self::Twed {
                nu,
                lambda,
                constraint,
            } => Measure::Twed(Twed::with_constraint(nu, lambda, constraint)?),
            Self::Vector { metric } => Measure::Vector(VectorDistance::new(metric)?),
        })
    }
}

/// Any measure of the crate behind one type.
#[derive(Debug, Clone)]
pub enum Measure {
    /// Dynamic Time Warping.
    Dtw(Dtw),
    /// Longest Common Subsequence.
    Lcs(Lcs),
    /// Edit distance with Real Penalty.
    Erp(Erp),
    /// Time Warp Edit Distance.
    Twed(Twed),
    /// A lock-step measure.
    Vector(VectorDistance),
}

impl Measure {
    /// Describe the measure as a serializable config.
    #[must_use]
    pub fn config(&self) -> MeasureConfig {
        match self {
            Self::Dtw(m) => MeasureConfig::Dtw {
                constraint: m.constraint(),
            },
            Self::Lcs(m) => MeasureConfig::Lcs {
                epsilon: m.epsilon(),
                constraint: m.constraint(),
            },
            Self::Erp(m) => MeasureConfig::Erp {
                g: m.g(),
                constraint: m.constraint(),
            },
            Self::Twed(m) => MeasureConfig::Twed {
                nu: m.nu(),
                lambda: m.lambda(),
                constraint: m.constraint(),
            },
            Self::Vector(m) => MeasureConfig::Vector { metric: m.kind() },
        }
    }

    fn inner(&self) -> &dyn Distance {
        match self {
            Self::Dtw(m) => m,
            Self::Lcs(m) => m,
            Self::Erp(m) => m,
            Self::Twed(m) => m,
            Self::Vector(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Distance {
        match self {
            Self::Dtw(m) => m,
            Self::Lcs(m) => m,
            Self::Erp(m) => m,
            Self::Twed(m) => m,
            Self::Vector(m) => m,
        }
    }
}

impl TryFrom<MeasureConfig> for Measure {
    type Error = DistanceError;

    fn try_from(config: MeasureConfig) -> Result<Self, Self::Error> {
        config.build()
    }
}

impl Distance for Measure {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn compute(&self, a: &TimeSeries, b: &TimeSeries) -> Result<f64, DistanceError> {
        self.inner().compute(a, b)
    }

    fn memo(&self) -> Option<&Memo> {
        self.inner().memo()
    }

    fn memo_mut(&mut self) -> Option<&mut Memo> {
        self.inner_mut().memo_mut()
    }
}
