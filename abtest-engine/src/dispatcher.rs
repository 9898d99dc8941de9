use abtest_core::{MetricType, Result, TestKind, TestOutcome};
use abtest_metrics::{MetricAggregator, StatisticalAnalyzer, StatisticalResult};

/// Runs the one hypothesis test a metric type calls for.
///
/// Every test takes the treatment arm first, so positive statistics mean
/// treatment is larger.
#[derive(Debug, Clone, Copy)]
pub struct TestDispatcher {
    alpha: f64,
}

impl TestDispatcher {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    pub fn dispatch(&self, metric_type: MetricType, control: &[f64], treatment: &[f64]) -> Result<TestOutcome> {
        match metric_type {
            MetricType::Binary => self.proportion_test(control, treatment),
            MetricType::ContinuousNormal => self.two_sample_ttest(control, treatment),
            MetricType::ContinuousNonNormal => self.mann_whitney_u_test(control, treatment),
        }
    }

    pub fn proportion_test(&self, control: &[f64], treatment: &[f64]) -> Result<TestOutcome> {
        let result = StatisticalAnalyzer::proportions_z_test(
            [
                MetricAggregator::successes(treatment),
                MetricAggregator::successes(control),
            ],
            [treatment.len(), control.len()],
        )?;
        Ok(self.outcome(TestKind::ProportionZTest, result))
    }

    pub fn two_sample_ttest(&self, control: &[f64], treatment: &[f64]) -> Result<TestOutcome> {
        let result = StatisticalAnalyzer::welch_t_test(treatment, control)?;
        Ok(self.outcome(TestKind::WelchTTest, result))
    }

    pub fn mann_whitney_u_test(&self, control: &[f64], treatment: &[f64]) -> Result<TestOutcome> {
        let result = StatisticalAnalyzer::mann_whitney_u(treatment, control)?;
        Ok(self.outcome(TestKind::MannWhitneyU, result))
    }

    fn outcome(&self, test: TestKind, result: StatisticalResult) -> TestOutcome {
        TestOutcome {
            test,
            statistic: result.statistic,
            p_value: result.p_value,
            significant: result.p_value < self.alpha,
        }
    }
}
