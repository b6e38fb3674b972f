//! Feature transforms.
//!
//! A [`ColumnTransformer`] is the preprocessing stage of a loan pipeline: it
//! maps a [`FeatureRow`] of raw applicant values into the purely numeric
//! columns the classifier was fitted on. Fitted parameters (means, category
//! lists) live in the model artifact.

use crate::error::MlError;
use crate::features::row::{FeatureRow, FeatureValue, NumericRow};
use serde::{Deserialize, Serialize};

/// How one input column is turned into output columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureTransformType {
    /// Copy a numeric value through under its own name.
    Passthrough,
    Numerical { method: NumericalMethod },
    Categorical { method: CategoricalMethod },
    /// Consume the column without producing output.
    Drop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericalMethod {
    Log,
    Standardize { mean: f64, std: f64 },
    MinMaxScale { min: f64, max: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalMethod {
    /// One output column per category, named `{column}_{category}`.
    OneHot {
        categories: Vec<String>,
        #[serde(default)]
        ignore_unknown: bool,
    },
    /// A single column holding the category's index.
    Label { categories: Vec<String> },
}

/// A transform bound to one input column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub transform: FeatureTransformType,
}

/// What happens to input columns no [`ColumnSpec`] mentions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Remainder {
    #[default]
    Drop,
    Passthrough,
}

/// Column-wise preprocessing stage.
///
/// Output columns come first in `columns` order, followed by remainder
/// columns (when passed through) in input-row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTransformer {
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub remainder: Remainder,
}

impl ColumnTransformer {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self {
            columns,
            remainder: Remainder::Drop,
        }
    }

    pub fn with_remainder(mut self, remainder: Remainder) -> Self {
        self.remainder = remainder;
        self
    }

    /// A transformer that forwards every column unchanged.
    pub fn passthrough() -> Self {
        Self::new(Vec::new()).with_remainder(Remainder::Passthrough)
    }

    /// Apply the transform to a single row.
    pub fn transform(&self, row: &FeatureRow) -> Result<NumericRow, MlError> {
        let mut names = Vec::new();
        let mut values = Vec::new();

        for spec in &self.columns {
            let value = row.get(&spec.name).ok_or_else(|| {
                MlError::transform(format!("missing input column '{}'", spec.name))
            })?;
            apply_column(spec, value, &mut names, &mut values)?;
        }

        if self.remainder == Remainder::Passthrough {
            for (name, value) in row.iter() {
                if self.columns.iter().any(|c| c.name == name) {
                    continue;
                }
                let v = numeric(name, value)?;
                names.push(name.to_string());
                values.push(v);
            }
        }

        Ok(NumericRow { names, values })
    }

    /// Output column names for a row with the given input columns.
    pub fn feature_names_out<'a>(&self, input: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut out = Vec::new();
        for spec in &self.columns {
            match &spec.transform {
                FeatureTransformType::Drop => {}
                FeatureTransformType::Categorical {
                    method: CategoricalMethod::OneHot { categories, .. },
                } => out.extend(categories.iter().map(|c| one_hot_name(&spec.name, c))),
                _ => out.push(spec.name.clone()),
            }
        }
        if self.remainder == Remainder::Passthrough {
            out.extend(
                input
                    .into_iter()
                    .filter(|name| !self.columns.iter().any(|c| c.name == *name))
                    .map(str::to_string),
            );
        }
        out
    }
}

fn one_hot_name(column: &str, category: &str) -> String {
    format!("{column}_{category}")
}

fn numeric(name: &str, value: &FeatureValue) -> Result<f64, MlError> {
    value.as_f64().ok_or_else(|| {
        MlError::invalid_input(format!(
            "column '{name}' is categorical but is passed to the classifier unencoded"
        ))
    })
}

fn categorical<'v>(name: &str, value: &'v FeatureValue) -> Result<&'v str, MlError> {
    value
        .as_str()
        .ok_or_else(|| MlError::transform(format!("column '{name}' expects a category")))
}

fn apply_column(
    spec: &ColumnSpec,
    value: &FeatureValue,
    names: &mut Vec<String>,
    values: &mut Vec<f64>,
) -> Result<(), MlError> {
    let name = spec.name.as_str();
    match &spec.transform {
        FeatureTransformType::Drop => {}
        FeatureTransformType::Passthrough => {
            names.push(name.to_string());
            values.push(numeric(name, value)?);
        }
        FeatureTransformType::Numerical { method } => {
            let x = numeric(name, value)?;
            let y = match method {
                NumericalMethod::Log => {
                    if x <= -1.0 {
                        return Err(MlError::transform(format!(
                            "column '{name}': log1p undefined for {x}"
                        )));
                    }
                    x.ln_1p()
                }
                NumericalMethod::Standardize { mean, std } => {
                    if *std == 0.0 {
                        x - mean
                    } else {
                        (x - mean) / std
                    }
                }
                NumericalMethod::MinMaxScale { min, max } => {
                    let range = max - min;
                    if range == 0.0 { 0.0 } else { (x - min) / range }
                }
            };
            names.push(name.to_string());
            values.push(y);
        }
        FeatureTransformType::Categorical { method } => {
            let category = categorical(name, value)?;
            match method {
                CategoricalMethod::OneHot {
                    categories,
                    ignore_unknown,
                } => {
                    if !ignore_unknown && !categories.iter().any(|c| c == category) {
                        return Err(MlError::transform(format!(
                            "column '{name}': unknown category '{category}'"
                        )));
                    }
                    for c in categories {
                        names.push(one_hot_name(name, c));
                        values.push(if c == category { 1.0 } else { 0.0 });
                    }
                }
                CategoricalMethod::Label { categories } => {
                    let index = categories.iter().position(|c| c == category).ok_or_else(|| {
                        MlError::transform(format!(
                            "column '{name}': unknown category '{category}'"
                        ))
                    })?;
                    names.push(name.to_string());
                    values.push(index as f64);
                }
            }
        }
    }
    Ok(())
}
