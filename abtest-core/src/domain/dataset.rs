use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{CoreError, Result};

/// One named column of an [`ExperimentDataset`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum Column {
    /// Variant labels (or any other categorical values).
    Labels(Vec<String>),
    /// Numeric observations; `None` and `NaN` are both treated as missing.
    Numeric(Vec<Option<f64>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Labels(values) => values.len(),
            Column::Numeric(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kind(&self) -> &'static str {
        match self {
            Column::Labels(_) => "labels",
            Column::Numeric(_) => "numeric",
        }
    }
}

/// Column-oriented table of experiment observations.
///
/// Every column has the same number of rows; row `i` of the variant column
/// and row `i` of a metric column describe the same observation. The table
/// is read-only once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    try_from = "BTreeMap<String, Column>",
    into = "BTreeMap<String, Column>"
)]
pub struct ExperimentDataset {
    columns: BTreeMap<String, Column>,
    rows: usize,
}

impl ExperimentDataset {
    pub fn builder() -> DatasetBuilder {
        DatasetBuilder::default()
    }

    /// Build a two-column dataset from `(label, metric value)` rows.
    pub fn from_observations<I, L>(variant_column: &str, metric_column: &str, rows: I) -> Self
    where
        I: IntoIterator<Item = (L, Option<f64>)>,
        L: Into<String>,
    {
        let (labels, values): (Vec<String>, Vec<Option<f64>>) = rows
            .into_iter()
            .map(|(label, value)| (label.into(), value))
            .unzip();
        let rows = labels.len();

        let mut columns = BTreeMap::new();
        columns.insert(variant_column.to_string(), Column::Labels(labels));
        columns.insert(metric_column.to_string(), Column::Numeric(values));

        Self { columns, rows }
    }

    pub fn from_columns(columns: BTreeMap<String, Column>) -> Result<Self> {
        let mut rows = None;
        for (name, column) in &columns {
            match rows {
                None => rows = Some(column.len()),
                Some(expected) if expected != column.len() => {
                    return Err(CoreError::MalformedInput(format!(
                        "column '{}' has {} rows, expected {}",
                        name,
                        column.len(),
                        expected
                    )));
                }
                Some(_) => {}
            }
        }

        Ok(Self {
            columns,
            rows: rows.unwrap_or(0),
        })
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn labels(&self, name: &str) -> Result<&[String]> {
        match self.require(name)? {
            Column::Labels(values) => Ok(values),
            other => Err(Self::wrong_kind(name, "labels", other)),
        }
    }

    pub fn metric(&self, name: &str) -> Result<&[Option<f64>]> {
        match self.require(name)? {
            Column::Numeric(values) => Ok(values),
            other => Err(Self::wrong_kind(name, "numeric", other)),
        }
    }

    /// Distinct labels of `variant_column` in order of first appearance.
    pub fn distinct_labels(&self, variant_column: &str) -> Result<Vec<&str>> {
        Ok(self
            .label_counts(variant_column)?
            .into_iter()
            .map(|(label, _)| label)
            .collect())
    }

    /// Row count per distinct label, in order of first appearance.
    pub fn label_counts(&self, variant_column: &str) -> Result<Vec<(&str, usize)>> {
        let labels = self.labels(variant_column)?;
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut counts: Vec<(&str, usize)> = Vec::new();

        for label in labels {
            match index.get(label.as_str()) {
                Some(&slot) => counts[slot].1 += 1,
                None => {
                    index.insert(label.as_str(), counts.len());
                    counts.push((label.as_str(), 1));
                }
            }
        }

        Ok(counts)
    }

    /// Non-missing metric values of the rows labelled `label`, in row order.
    pub fn arm_values(&self, variant_column: &str, metric_column: &str, label: &str) -> Result<Vec<f64>> {
        let labels = self.labels(variant_column)?;
        let values = self.metric(metric_column)?;

        labels
            .iter()
            .zip(values)
            .filter(|(row_label, _)| row_label.as_str() == label)
            .filter_map(|(_, value)| present(*value))
            .map(|value| finite(metric_column, value))
            .collect()
    }

    /// Distinct non-missing values of a metric column, sorted ascending.
    pub fn distinct_metric_values(&self, metric_column: &str) -> Result<Vec<f64>> {
        let mut values = self
            .metric(metric_column)?
            .iter()
            .filter_map(|value| present(*value))
            .map(|value| finite(metric_column, value))
            .collect::<Result<Vec<f64>>>()?;

        values.sort_by(f64::total_cmp);
        // -0.0 and 0.0 compare equal, matching how the values are classified
        values.dedup_by(|a, b| a == b);
        Ok(values)
    }

    fn require(&self, name: &str) -> Result<&Column> {
        self.columns
            .get(name)
            .ok_or_else(|| CoreError::MalformedInput(format!("missing required column '{}'", name)))
    }

    fn wrong_kind(name: &str, expected: &str, found: &Column) -> CoreError {
        CoreError::MalformedInput(format!(
            "column '{}' must hold {} values, found {}",
            name,
            expected,
            found.kind()
        ))
    }
}

impl TryFrom<BTreeMap<String, Column>> for ExperimentDataset {
    type Error = CoreError;

    fn try_from(columns: BTreeMap<String, Column>) -> Result<Self> {
        Self::from_columns(columns)
    }
}

impl From<ExperimentDataset> for BTreeMap<String, Column> {
    fn from(dataset: ExperimentDataset) -> Self {
        dataset.columns
    }
}

fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

fn finite(column: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CoreError::MalformedInput(format!(
            "column '{}' contains a non-finite value ({})",
            column, value
        )))
    }
}

#[derive(Debug, Default)]
pub struct DatasetBuilder {
    columns: BTreeMap<String, Column>,
}

impl DatasetBuilder {
    pub fn labels<I, L>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        self.columns.insert(
            name.into(),
            Column::Labels(values.into_iter().map(Into::into).collect()),
        );
        self
    }

    pub fn metric<I>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        self.columns
            .insert(name.into(), Column::Numeric(values.into_iter().collect()));
        self
    }

    pub fn build(self) -> Result<ExperimentDataset> {
        ExperimentDataset::from_columns(self.columns)
    }
}
