use abtest_core::{ArmRole, MetricType, Result};

pub struct MetricClassifier;

impl MetricClassifier {
    /// Whether every distinct value is 0 or 1. The empty set counts as binary.
    pub fn is_binary(distinct_values: &[f64]) -> bool {
        distinct_values.iter().all(|&v| v == 0.0 || v == 1.0)
    }

    /// Decide the metric type from the dataset-wide distinct values.
    ///
    /// Continuous metrics run `is_normal` on the control arm and then on the
    /// treatment arm; both checks always run.
    pub fn classify<F>(
        distinct_values: &[f64],
        control: &[f64],
        treatment: &[f64],
        mut is_normal: F,
    ) -> Result<MetricType>
    where
        F: FnMut(ArmRole, &[f64]) -> Result<bool>,
    {
        if Self::is_binary(distinct_values) {
            return Ok(MetricType::Binary);
        }

        let control_normal = is_normal(ArmRole::Control, control)?;
        let treatment_normal = is_normal(ArmRole::Treatment, treatment)?;

        Ok(if control_normal && treatment_normal {
            MetricType::ContinuousNormal
        } else {
            MetricType::ContinuousNonNormal
        })
    }
}
