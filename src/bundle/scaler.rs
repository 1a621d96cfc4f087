//! Standard scaler for numeric columns

use crate::error::LoadError;
use serde::{Deserialize, Serialize};

/// Per-field location/scale statistics fitted on the training split.
///
/// Applies `(x - mean) / scale` to each field it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericScaler {
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl NumericScaler {
    pub fn new(
        feature_names: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    ) -> Result<Self, LoadError> {
        Self {
            feature_names,
            mean,
            scale,
        }
        .validated()
    }

    /// Fit on training columns. Population standard deviation; a constant
    /// column gets scale 1.0 so it maps to zero instead of dividing by zero.
    pub fn fit(columns: &[(&str, &[f64])]) -> Result<Self, LoadError> {
        let mut feature_names = Vec::with_capacity(columns.len());
        let mut mean = Vec::with_capacity(columns.len());
        let mut scale = Vec::with_capacity(columns.len());

        for (name, values) in columns {
            if values.is_empty() {
                return Err(LoadError::invalid(
                    "scaler",
                    format!("no values to fit for {name}"),
                ));
            }
            let n = values.len() as f64;
            let m = values.iter().sum::<f64>() / n;
            let variance = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n;
            let std_dev = variance.sqrt();

            feature_names.push(name.to_string());
            mean.push(m);
            scale.push(if std_dev > 0.0 { std_dev } else { 1.0 });
        }

        Self::new(feature_names, mean, scale)
    }

    pub(crate) fn validated(self) -> Result<Self, LoadError> {
        let n = self.feature_names.len();
        if n == 0 {
            return Err(LoadError::invalid("scaler", "scaler covers no fields"));
        }
        if self.mean.len() != n || self.scale.len() != n {
            return Err(LoadError::invalid(
                "scaler",
                format!(
                    "{} names, {} means, {} scales",
                    n,
                    self.mean.len(),
                    self.scale.len()
                ),
            ));
        }
        for (i, name) in self.feature_names.iter().enumerate() {
            if self.feature_names[..i].contains(name) {
                return Err(LoadError::invalid(
                    "scaler",
                    format!("duplicate field {name}"),
                ));
            }
            if !self.mean[i].is_finite() {
                return Err(LoadError::invalid(
                    "scaler",
                    format!("mean for {name} is not finite"),
                ));
            }
            let s = self.scale[i];
            if !s.is_finite() || s <= 0.0 {
                return Err(LoadError::invalid(
                    "scaler",
                    format!("scale for {name} must be positive, got {s}"),
                ));
            }
        }
        Ok(self)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn len(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_names.is_empty()
    }

    /// Index of a field within the scaler's own statistics
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    /// Mean and scale for the statistic at `index`
    pub fn stats(&self, index: usize) -> (f64, f64) {
        (self.mean[index], self.scale[index])
    }

    #[inline]
    pub fn standardize(&self, index: usize, value: f64) -> f64 {
        (value - self.mean[index]) / self.scale[index]
    }
}
