use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Binary,
    ContinuousNormal,
    ContinuousNonNormal,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Binary => "binary",
            MetricType::ContinuousNormal => "continuous_normal",
            MetricType::ContinuousNonNormal => "continuous_non_normal",
        }
    }

    /// The hypothesis test this metric type is analysed with.
    pub fn test_kind(&self) -> TestKind {
        match self {
            MetricType::Binary => TestKind::ProportionZTest,
            MetricType::ContinuousNormal => TestKind::WelchTTest,
            MetricType::ContinuousNonNormal => TestKind::MannWhitneyU,
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hypothesis test behind a verdict. Serialized as its display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestKind {
    ProportionZTest,
    WelchTTest,
    MannWhitneyU,
}

impl TestKind {
    pub const ALL: [TestKind; 3] = [
        TestKind::ProportionZTest,
        TestKind::WelchTTest,
        TestKind::MannWhitneyU,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TestKind::ProportionZTest => "Proportion Z-Test",
            TestKind::WelchTTest => "Two Sample T-Test",
            TestKind::MannWhitneyU => "Mann-Whitney U",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TestKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown test '{}'", s))
    }
}

impl Serialize for TestKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for TestKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ArmRole {
    Control,
    Treatment,
}

/// Descriptive statistics of one arm's non-missing metric values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArmSummary {
    pub label: String,
    pub role: ArmRole,
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
}

/// Observed and expected row count of one variant label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariantCount {
    pub label: String,
    pub observed: usize,
    pub expected: f64,
}

/// Sample ratio mismatch diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SrmResult {
    pub chi2: f64,
    #[serde(rename = "pvalue")]
    pub p_value: f64,
    pub srm_detected: bool,
    pub counts: Vec<VariantCount>,
}

/// Output of exactly one hypothesis test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestOutcome {
    pub test: TestKind,
    pub statistic: f64,
    #[serde(rename = "pvalue")]
    pub p_value: f64,
    pub significant: bool,
}

/// Final result of one analysis call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
    pub test: TestKind,
    pub statistic: f64,
    #[serde(rename = "pvalue")]
    pub p_value: f64,
    pub significant: bool,
    pub metric_type: MetricType,
    pub srm: SrmResult,
    pub control: ArmSummary,
    pub treatment: ArmSummary,
}

impl Verdict {
    pub fn new(
        outcome: TestOutcome,
        metric_type: MetricType,
        srm: SrmResult,
        control: ArmSummary,
        treatment: ArmSummary,
    ) -> Self {
        Self {
            test: outcome.test,
            statistic: outcome.statistic,
            p_value: outcome.p_value,
            significant: outcome.significant,
            metric_type,
            srm,
            control,
            treatment,
        }
    }

    pub fn outcome(&self) -> TestOutcome {
        TestOutcome {
            test: self.test,
            statistic: self.statistic,
            p_value: self.p_value,
            significant: self.significant,
        }
    }
}
