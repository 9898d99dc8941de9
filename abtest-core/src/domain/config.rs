use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidationError};

/// Significance threshold used when none is configured.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Name of the column holding variant labels when none is configured.
pub const DEFAULT_VARIANT_COLUMN: &str = "variant";

/// Largest arm the normality check tests without down-sampling.
pub const NORMALITY_SAMPLE_LIMIT: usize = 5000;

// ===== Engine Configuration =====

/// Immutable settings shared by every analysis one engine instance performs.
///
/// `alpha` applies uniformly to the SRM check, the per-arm normality check
/// and the final hypothesis test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_engine_config"))]
pub struct EngineConfig {
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub alpha: f64,
    #[validate(length(min = 1, max = 255))]
    pub variant_column: String,
    #[validate(range(min = 3, max = 5000))]
    pub normality_sample_limit: usize,
    /// Seed for the down-sampling step; `None` draws from OS entropy.
    pub seed: Option<u64>,
    pub control_label: Option<String>,
    pub treatment_label: Option<String>,
    /// Target traffic weights per variant label for the SRM check.
    /// `None` means an equal split across observed labels.
    pub expected_allocation: Option<BTreeMap<String, f64>>,
}

impl EngineConfig {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            ..Self::default()
        }
    }

    pub fn with_variant_column(mut self, column: impl Into<String>) -> Self {
        self.variant_column = column.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_normality_sample_limit(mut self, limit: usize) -> Self {
        self.normality_sample_limit = limit;
        self
    }

    pub fn with_arms(mut self, control: impl Into<String>, treatment: impl Into<String>) -> Self {
        self.control_label = Some(control.into());
        self.treatment_label = Some(treatment.into());
        self
    }

    pub fn with_expected_allocation<I, K>(mut self, weights: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        self.expected_allocation = Some(
            weights
                .into_iter()
                .map(|(label, weight)| (label.into(), weight))
                .collect(),
        );
        self
    }

    /// Explicit `(control, treatment)` designation, if both labels are set.
    pub fn explicit_arms(&self) -> Option<(&str, &str)> {
        match (&self.control_label, &self.treatment_label) {
            (Some(control), Some(treatment)) => Some((control.as_str(), treatment.as_str())),
            _ => None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            variant_column: DEFAULT_VARIANT_COLUMN.to_string(),
            normality_sample_limit: NORMALITY_SAMPLE_LIMIT,
            seed: None,
            control_label: None,
            treatment_label: None,
            expected_allocation: None,
        }
    }
}

fn validate_engine_config(config: &EngineConfig) -> Result<(), ValidationError> {
    match (&config.control_label, &config.treatment_label) {
        (Some(control), Some(treatment)) if control == treatment => {
            return Err(ValidationError::new("control_equals_treatment"));
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(ValidationError::new("arm_labels_incomplete"));
        }
        _ => {}
    }

    if let Some(weights) = &config.expected_allocation {
        if weights.is_empty() {
            return Err(ValidationError::new("expected_allocation_empty"));
        }
        if weights.values().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err(ValidationError::new("expected_allocation_non_positive"));
        }
    }

    Ok(())
}
