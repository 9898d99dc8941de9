#![allow(dead_code)]

use abtest_core::ExperimentDataset;
use statrs::distribution::{ContinuousCDF, Normal};

/// Evenly spaced normal quantiles: a sample that is as normal as a sample gets
pub fn normal_quantiles(n: usize, mean: f64, sd: f64) -> Vec<f64> {
    let normal = Normal::new(mean, sd).unwrap();
    (1..=n)
        .map(|i| normal.inverse_cdf((i as f64 - 0.375) / (n as f64 + 0.25)))
        .collect()
}

/// Evenly spaced quantiles of Exponential(1)
pub fn exponential_quantiles(n: usize) -> Vec<f64> {
    (1..=n)
        .map(|i| -(1.0 - (i as f64 - 0.5) / n as f64).ln())
        .collect()
}

/// `count` rows with `ones` successes followed by zeros
pub fn binary_arm(count: usize, ones: usize) -> Vec<f64> {
    (0..count).map(|i| if i < ones { 1.0 } else { 0.0 }).collect()
}

/// Dataset with rows of `control` and `treatment` interleaved, so that
/// `control_label` is seen first.
pub fn two_arm_dataset(
    control_label: &str,
    control: &[f64],
    treatment_label: &str,
    treatment: &[f64],
) -> ExperimentDataset {
    let mut rows: Vec<(String, Option<f64>)> = Vec::with_capacity(control.len() + treatment.len());
    let longest = control.len().max(treatment.len());

    for i in 0..longest {
        if let Some(v) = control.get(i) {
            rows.push((control_label.to_string(), Some(*v)));
        }
        if let Some(v) = treatment.get(i) {
            rows.push((treatment_label.to_string(), Some(*v)));
        }
    }

    ExperimentDataset::from_observations("variant", "metric", rows)
}
