//! Configuration builder for kNN classifiers.

use kairos_distance::Distance;

use crate::classifier::KnnClassifier;
use crate::error::KnnError;
use crate::weighting::Weighting;

/// Configuration for a [`KnnClassifier`].
///
/// Construct via [`KnnConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter   | Default    |
/// |-------------|------------|
/// | `exclude`   | 0          |
/// | `weighting` | `Majority` |
/// | `threads`   | 1          |
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct KnnConfig {
    pub(crate) k: usize,
    #[serde(default)]
    pub(crate) exclude: usize,
    #[serde(default)]
    pub(crate) weighting: Weighting,
    #[serde(default = "default_threads")]
    pub(crate) threads: usize,
}

fn default_threads() -> usize {
    1
}

impl KnnConfig {
    /// Create a new config voting over `k` neighbours.
    ///
    /// # Errors
    ///
    /// Returns [`KnnError::InvalidK`] if `k` is zero.
    pub fn new(k: usize) -> Result<Self, KnnError> {
        if k == 0 {
            return Err(KnnError::InvalidK { k });
        }
        Ok(Self {
            k,
            exclude: 0,
            weighting: Weighting::Majority,
            threads: default_threads(),
        })
    }

    // --- Setters ---

    /// Set how many of the closest neighbours are discarded before voting.
    #[must_use]
    pub fn with_exclude(mut self, exclude: usize) -> Self {
        self.exclude = exclude;
        self
    }

    /// Set the weighting scheme.
    #[must_use]
    pub fn with_weighting(mut self, weighting: Weighting) -> Self {
        self.weighting = weighting;
        self
    }

    /// Set the number of worker threads used per query.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    // --- Getters ---

    /// Return the number of voting neighbours.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Return the number of excluded closest neighbours.
    #[must_use]
    pub fn exclude(&self) -> usize {
        self.exclude
    }

    /// Return the weighting scheme.
    #[must_use]
    pub fn weighting(&self) -> Weighting {
        self.weighting
    }

    /// Return the number of worker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Check every parameter.
    ///
    /// # Errors
    ///
    /// | Variant                          | When                            |
    /// |----------------------------------|---------------------------------|
    /// | [`KnnError::InvalidK`]           | `k` is zero                     |
    /// | [`KnnError::InvalidExclude`]     | `exclude >= k`                  |
    /// | [`KnnError::InvalidThreadCount`] | `threads` is zero               |
    /// | [`KnnError::InvalidWeighting`]   | a weighting parameter is invalid |
    pub fn validate(&self) -> Result<(), KnnError> {
        if self.k == 0 {
            return Err(KnnError::InvalidK { k: self.k });
        }
        if self.exclude >= self.k {
            return Err(KnnError::InvalidExclude {
                exclude: self.exclude,
                k: self.k,
            });
        }
        if self.threads == 0 {
            return Err(KnnError::InvalidThreadCount {
                threads: self.threads,
            });
        }
        self.weighting.validate()
    }

    /// Build a classifier using `measure`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`KnnConfig::validate`].
    pub fn build<D: Distance>(&self, measure: D) -> Result<KnnClassifier<D>, KnnError> {
        self.validate()?;
        let mut classifier = KnnClassifier::new(measure, self.k)?;
        classifier.set_weighting(self.weighting)?;
        classifier.set_exclude(self.exclude)?;
        classifier.set_number_of_threads(self.threads)?;
        Ok(classifier)
    }
}

#[cfg(test)]
mod tests {
    use kairos_distance::Dtw;

    use super::*;

    #[test]
    fn zero_k_rejected() {
        assert!(matches!(KnnConfig::new(0), Err(KnnError::InvalidK { k: 0 })));
    }

    #[test]
    fn defaults() {
        let config = KnnConfig::new(3).unwrap();
        assert_eq!(config.k(), 3);
        assert_eq!(config.exclude(), 0);
        assert_eq!(config.weighting(), Weighting::Majority);
        assert_eq!(config.threads(), 1);
    }

    #[test]
    fn exclude_must_be_below_k() {
        let config = KnnConfig::new(2).unwrap().with_exclude(2);
        assert!(matches!(
            config.validate(),
            Err(KnnError::InvalidExclude { exclude: 2, k: 2 })
        ));
        assert!(config.build(Dtw::unconstrained()).is_err());
    }

    #[test]
    fn build_applies_settings() {
        let classifier = KnnConfig::new(5)
            .unwrap()
            .with_exclude(1)
            .with_weighting(Weighting::Rank)
            .with_threads(3)
            .build(Dtw::unconstrained())
            .unwrap();
        assert_eq!(classifier.k(), 5);
        assert_eq!(classifier.exclude(), 1);
        assert_eq!(classifier.weighting(), Weighting::Rank);
        assert_eq!(classifier.number_of_threads(), 3);
    }

    #[test]
    fn json_fills_defaults() {
        let config: KnnConfig = serde_json::from_str(r#"{"k":4}"#).unwrap();
        assert_eq!(config, KnnConfig::new(4).unwrap());
        let json = serde_json::to_string(&config.with_weighting(Weighting::Dudani)).unwrap();
        let back: KnnConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.weighting(), Weighting::Dudani);
    }
}
