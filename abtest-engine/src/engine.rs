use abtest_core::{
    ArmRole, CoreError, EngineConfig, ExperimentDataset, Result, SrmResult, Verdict,
};
use abtest_metrics::MetricAggregator;
use rand::rngs::StdRng;
use rand::SeedableRng;
use validator::Validate;

use crate::classifier::MetricClassifier;
use crate::dispatcher::TestDispatcher;
use crate::normality::NormalityCheck;
use crate::srm::SampleRatioCheck;

/// Fewest non-null observations an arm needs for any of the tests.
pub const MIN_ARM_OBSERVATIONS: usize = 2;

/// Entry point: SRM check, metric classification and test dispatch over one
/// dataset.
///
/// The engine holds only its validated configuration and can be shared
/// across threads; each call builds its own random source.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    config: EngineConfig,
    srm: SampleRatioCheck,
    normality: NormalityCheck,
    dispatcher: TestDispatcher,
}

impl DecisionEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            srm: SampleRatioCheck::from_config(&config),
            normality: NormalityCheck::from_config(&config),
            dispatcher: TestDispatcher::new(config.alpha),
            config,
        })
    }

    pub fn with_alpha(alpha: f64) -> Result<Self> {
        Self::new(EngineConfig::new(alpha))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn check_srm(&self, dataset: &ExperimentDataset, variant_column: &str) -> Result<SrmResult> {
        self.srm.check(dataset, variant_column)
    }

    /// Analyze `metric_column` against the configured variant column.
    pub fn analyze_test(&self, dataset: &ExperimentDataset, metric_column: &str) -> Result<Verdict> {
        self.analyze_test_with(dataset, metric_column, &self.config.variant_column)
    }

    pub fn analyze_test_with(
        &self,
        dataset: &ExperimentDataset,
        metric_column: &str,
        variant_column: &str,
    ) -> Result<Verdict> {
        dataset.labels(variant_column)?;
        dataset.metric(metric_column)?;

        let counts = dataset.label_counts(variant_column)?;
        let (control_label, treatment_label) = self.resolve_arms(&counts, variant_column)?;

        tracing::debug!(
            "Analyzing {} by {}: control={}, treatment={}",
            metric_column,
            variant_column,
            control_label,
            treatment_label
        );

        let srm = self.srm.check_counts(&counts)?;

        let control = Self::extract_arm(dataset, variant_column, metric_column, control_label)?;
        let treatment = Self::extract_arm(dataset, variant_column, metric_column, treatment_label)?;
        let distinct_values = dataset.distinct_metric_values(metric_column)?;

        let mut rng = self.rng();
        let metric_type = MetricClassifier::classify(&distinct_values, &control, &treatment, |role, sample| {
            let label = match role {
                ArmRole::Control => control_label,
                ArmRole::Treatment => treatment_label,
            };
            self.normality.is_normal(label, sample, &mut rng)
        })?;

        tracing::debug!("Metric {} classified as {}", metric_column, metric_type);

        let outcome = self.dispatcher.dispatch(metric_type, &control, &treatment)?;

        tracing::info!(
            "{} on {}: statistic={:.4}, p={:.6}, significant={}, srm_detected={}",
            outcome.test,
            metric_column,
            outcome.statistic,
            outcome.p_value,
            outcome.significant,
            srm.srm_detected
        );

        Ok(Verdict::new(
            outcome,
            metric_type,
            srm,
            MetricAggregator::summarize(control_label, ArmRole::Control, &control),
            MetricAggregator::summarize(treatment_label, ArmRole::Treatment, &treatment),
        ))
    }

    /// Control and treatment labels: the configured pair when set, otherwise
    /// the first two labels in order of first appearance.
    fn resolve_arms<'a>(
        &'a self,
        counts: &[(&'a str, usize)],
        variant_column: &str,
    ) -> Result<(&'a str, &'a str)> {
        if counts.len() < 2 {
            return Err(CoreError::InsufficientVariants { found: counts.len() });
        }

        if let Some((control, treatment)) = self.config.explicit_arms() {
            for label in [control, treatment] {
                if !counts.iter().any(|(observed, _)| *observed == label) {
                    return Err(CoreError::MalformedInput(format!(
                        "variant '{}' does not occur in column '{}'",
                        label, variant_column
                    )));
                }
            }
            return Ok((control, treatment));
        }

        if counts.len() > 2 {
            return Err(CoreError::AmbiguousVariants { found: counts.len() });
        }

        Ok((counts[0].0, counts[1].0))
    }

    fn extract_arm(
        dataset: &ExperimentDataset,
        variant_column: &str,
        metric_column: &str,
        label: &str,
    ) -> Result<Vec<f64>> {
        let values = dataset.arm_values(variant_column, metric_column, label)?;

        match values.len() {
            0 => Err(CoreError::EmptyArm(label.to_string())),
            n if n < MIN_ARM_OBSERVATIONS => Err(CoreError::InsufficientObservations {
                variant: label.to_string(),
                found: n,
                required: MIN_ARM_OBSERVATIONS,
            }),
            _ => Ok(values),
        }
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            srm: SampleRatioCheck::from_config(&config),
            normality: NormalityCheck::from_config(&config),
            dispatcher: TestDispatcher::new(config.alpha),
            config,
        }
    }
}
