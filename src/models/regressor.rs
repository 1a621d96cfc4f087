//! Native regression model formats.
//!
//! Models are read from `model.json`, tagged by `"type"`:
//!
//! ```text
//! {"type":"linear","intercept":0.5,"coefficients":[...]}
//! {"type":"tree_ensemble","base_score":0.5,"num_features":7,"trees":[{"nodes":[...]}]}
//! ```
//!
//! Tree nodes follow the boosted-tree dump convention: a split sends `x <
//! threshold` to `yes`, everything else to `no`, and NaN to `missing`
//! (default `yes`).

use crate::error::{LoadError, PredictError};
use serde::{Deserialize, Serialize};

/// A trained regression model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Regressor {
    Linear(LinearModel),
    TreeEnsemble(TreeEnsemble),
}

impl Regressor {
    /// Number of input features the model was trained on
    pub fn n_features(&self) -> usize {
        match self {
            Regressor::Linear(m) => m.coefficients.len(),
            Regressor::TreeEnsemble(m) => m.num_features,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Regressor::Linear(_) => "linear",
            Regressor::TreeEnsemble(_) => "tree_ensemble",
        }
    }

    /// Evaluate on a single row. The row length must equal `n_features`.
    pub fn predict(&self, features: &[f64]) -> Result<f64, PredictError> {
        let expected = self.n_features();
        if features.len() != expected {
            return Err(PredictError::Dimension {
                expected,
                actual: features.len(),
            });
        }

        let score = match self {
            Regressor::Linear(m) => m.predict(features),
            Regressor::TreeEnsemble(m) => m.predict(features),
        };

        if score.is_finite() {
            Ok(score)
        } else {
            Err(PredictError::NonFinite(score))
        }
    }

    pub(crate) fn validated(self) -> Result<Self, LoadError> {
        match self {
            Regressor::Linear(m) => m.validated().map(Regressor::Linear),
            Regressor::TreeEnsemble(m) => m.validated().map(Regressor::TreeEnsemble),
        }
    }
}

/// `intercept + Σ coefficients[i] * x[i]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    #[serde(default)]
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn new(intercept: f64, coefficients: Vec<f64>) -> Self {
        Self {
            intercept,
            coefficients,
        }
    }

    fn predict(&self, features: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }

    fn validated(self) -> Result<Self, LoadError> {
        if self.coefficients.is_empty() {
            return Err(LoadError::invalid("model", "linear model has no coefficients"));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(LoadError::invalid("model", "linear model has non-finite weights"));
        }
        Ok(self)
    }
}

/// Sum of regression trees on top of a base score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    #[serde(default)]
    pub base_score: f64,
    pub num_features: usize,
    pub trees: Vec<Tree>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

/// One node of a regression tree. A node with `leaf` set is terminal;
/// otherwise `feature`, `threshold`, `yes` and `no` describe the split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<usize>,
}

impl Node {
    pub fn leaf(value: f64) -> Self {
        Self {
            leaf: Some(value),
            ..Self::default()
        }
    }

    pub fn split(feature: usize, threshold: f64, yes: usize, no: usize) -> Self {
        Self {
            feature: Some(feature),
            threshold: Some(threshold),
            yes: Some(yes),
            no: Some(no),
            ..Self::default()
        }
    }

    pub fn with_missing(mut self, missing: usize) -> Self {
        self.missing = Some(missing);
        self
    }
}

impl TreeEnsemble {
    fn predict(&self, features: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.evaluate(features)).sum::<f64>()
    }

    fn validated(self) -> Result<Self, LoadError> {
        if self.num_features == 0 {
            return Err(LoadError::invalid("model", "tree ensemble has zero features"));
        }
        if !self.base_score.is_finite() {
            return Err(LoadError::invalid("model", "base_score is not finite"));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            tree.check(self.num_features)
                .map_err(|reason| LoadError::invalid("model", format!("tree {t}: {reason}")))?;
        }
        Ok(self)
    }
}

impl Tree {
    /// Walk from the root to a leaf. `check` guarantees every child index is
    /// greater than its parent's, so the walk terminates.
    fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            let node = &self.nodes[idx];
            if let Some(value) = node.leaf {
                return value;
            }
            // Split fields are present after `check`
            let (Some(feature), Some(threshold), Some(yes), Some(no)) =
                (node.feature, node.threshold, node.yes, node.no)
            else {
                return 0.0;
            };
            let x = features[feature];
            idx = if x.is_nan() {
                node.missing.unwrap_or(yes)
            } else if x < threshold {
                yes
            } else {
                no
            };
        }
    }

    fn check(&self, num_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        let len = self.nodes.len();
        for (i, node) in self.nodes.iter().enumerate() {
            if let Some(value) = node.leaf {
                if !value.is_finite() {
                    return Err(format!("node {i} has a non-finite leaf"));
                }
                continue;
            }
            let (Some(feature), Some(threshold), Some(yes), Some(no)) =
                (node.feature, node.threshold, node.yes, node.no)
            else {
                return Err(format!("node {i} is neither a leaf nor a complete split"));
            };
            if feature >= num_features {
                return Err(format!(
                    "node {i} splits on feature {feature}, model has {num_features}"
                ));
            }
            if threshold.is_nan() {
                return Err(format!("node {i} has a NaN threshold"));
            }
            for child in [Some(yes), Some(no), node.missing].into_iter().flatten() {
                if child <= i || child >= len {
                    return Err(format!("node {i} has invalid child {child}"));
                }
            }
        }
        Ok(())
    }
}
