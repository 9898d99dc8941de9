use abtest_core::{CoreError, EngineConfig, Result, NORMALITY_SAMPLE_LIMIT};
use abtest_metrics::StatisticalAnalyzer;
use rand::Rng;
use std::borrow::Cow;

/// Smallest sample Shapiro-Wilk accepts.
pub const NORMALITY_MIN_OBSERVATIONS: usize = 3;

/// Per-arm Shapiro-Wilk normality check.
#[derive(Debug, Clone, Copy)]
pub struct NormalityCheck {
    alpha: f64,
    sample_limit: usize,
}

impl NormalityCheck {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            sample_limit: NORMALITY_SAMPLE_LIMIT,
        }
    }

    pub fn with_sample_limit(mut self, sample_limit: usize) -> Self {
        self.sample_limit = sample_limit;
        self
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.alpha).with_sample_limit(config.normality_sample_limit)
    }

    pub fn sample_limit(&self) -> usize {
        self.sample_limit
    }

    /// True when Shapiro-Wilk fails to reject normality (`p > alpha`).
    ///
    /// Samples above the limit are down-sampled first, so the answer for
    /// large arms depends on `rng`.
    pub fn is_normal<R: Rng + ?Sized>(&self, label: &str, sample: &[f64], rng: &mut R) -> Result<bool> {
        if sample.len() < NORMALITY_MIN_OBSERVATIONS {
            return Err(CoreError::InsufficientObservations {
                variant: label.to_string(),
                found: sample.len(),
                required: NORMALITY_MIN_OBSERVATIONS,
            });
        }

        let tested = self.downsample(sample, rng);
        let result = StatisticalAnalyzer::shapiro_wilk(&tested).map_err(|e| match e {
            CoreError::NumericInstability(reason) => {
                CoreError::NumericInstability(format!("variant '{}': {}", label, reason))
            }
            other => other,
        })?;

        tracing::debug!(
            "Shapiro-Wilk for variant {}: n={}, W={:.5}, p={:.6}",
            label,
            tested.len(),
            result.statistic,
            result.p_value
        );

        Ok(result.p_value > self.alpha)
    }

    /// Uniform selection of `sample_limit` observations without replacement,
    /// or the sample itself when it is already small enough.
    pub fn downsample<'a, R: Rng + ?Sized>(&self, sample: &'a [f64], rng: &mut R) -> Cow<'a, [f64]> {
        if sample.len() <= self.sample_limit {
            return Cow::Borrowed(sample);
        }

        let picked = rand::seq::index::sample(rng, sample.len(), self.sample_limit);
        Cow::Owned(picked.into_iter().map(|i| sample[i]).collect())
    }
}
