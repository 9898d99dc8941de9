use abtest_core::{CoreError, EngineConfig, ExperimentDataset, Result, SrmResult, VariantCount};
use abtest_metrics::StatisticalAnalyzer;
use std::collections::BTreeMap;

/// Sample ratio mismatch check over raw variant assignment counts.
#[derive(Debug, Clone)]
pub struct SampleRatioCheck {
    alpha: f64,
    expected_allocation: Option<BTreeMap<String, f64>>,
}

impl SampleRatioCheck {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            expected_allocation: None,
        }
    }

    pub fn with_expected_allocation(mut self, weights: BTreeMap<String, f64>) -> Self {
        self.expected_allocation = Some(weights);
        self
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            alpha: config.alpha,
            expected_allocation: config.expected_allocation.clone(),
        }
    }

    /// Count rows per variant label and run the check over those counts.
    pub fn check(&self, dataset: &ExperimentDataset, variant_column: &str) -> Result<SrmResult> {
        let counts = dataset.label_counts(variant_column)?;
        self.check_counts(&counts)
    }

    /// Pearson chi-square test of observed counts against the target split,
    /// with one degree of freedom less than the number of labels.
    pub fn check_counts(&self, counts: &[(&str, usize)]) -> Result<SrmResult> {
        if counts.len() < 2 {
            return Err(CoreError::DegenerateSrm(format!(
                "{} distinct variant label(s); the chi-square test needs at least 2",
                counts.len()
            )));
        }

        let observed: Vec<f64> = counts.iter().map(|(_, n)| *n as f64).collect();
        let expected = self.expected_counts(counts, &observed)?;
        let result = StatisticalAnalyzer::chi_square_goodness_of_fit(&observed, &expected)?;
        let srm_detected = result.p_value < self.alpha;

        if srm_detected {
            tracing::warn!(
                "Sample ratio mismatch detected: chi2={:.4}, p={:.6}, counts={:?}",
                result.statistic,
                result.p_value,
                counts
            );
        }

        Ok(SrmResult {
            chi2: result.statistic,
            p_value: result.p_value,
            srm_detected,
            counts: counts
                .iter()
                .zip(expected)
                .map(|((label, observed), expected)| VariantCount {
                    label: label.to_string(),
                    observed: *observed,
                    expected,
                })
                .collect(),
        })
    }

    fn expected_counts(&self, counts: &[(&str, usize)], observed: &[f64]) -> Result<Vec<f64>> {
        let total: f64 = observed.iter().sum();

        let Some(weights) = &self.expected_allocation else {
            let mean = total / observed.len() as f64;
            return Ok(vec![mean; observed.len()]);
        };

        let observed_weights = counts
            .iter()
            .map(|(label, _)| {
                weights.get(*label).copied().ok_or_else(|| {
                    CoreError::MalformedInput(format!(
                        "variant '{}' has no weight in the expected allocation",
                        label
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        let weight_sum: f64 = observed_weights.iter().sum();
        Ok(observed_weights
            .into_iter()
            .map(|w| total * w / weight_sum)
            .collect())
    }
}
