use abtest_core::{ArmRole, ArmSummary};
use statrs::statistics::Statistics;

pub struct MetricAggregator;

impl MetricAggregator {
    /// Describe one arm's metric values.
    ///
    /// Mean is 0 for an empty arm; standard deviation (n - 1 denominator)
    /// is 0 below two observations.
    pub fn summarize(label: &str, role: ArmRole, values: &[f64]) -> ArmSummary {
        let mean = if values.is_empty() { 0.0 } else { values.mean() };
        let std_dev = if values.len() < 2 { 0.0 } else { values.std_dev() };

        ArmSummary {
            label: label.to_string(),
            role,
            count: values.len(),
            mean,
            std_dev,
        }
    }

    /// Success count of a 0/1 sample (the sum of its values).
    pub fn successes(values: &[f64]) -> f64 {
        values.iter().sum()
    }
}
