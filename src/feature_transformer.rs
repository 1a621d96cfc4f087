//! Feature transformation for treatment outcome model inference.
//!
//! This module turns raw records into model input vectors using the same
//! encoders, scaling statistics and column order the model was trained with.

use crate::bundle::{ArtifactBundle, FieldKind};
use crate::error::TransformError;
use crate::types::record::{RawRecord, RawValue};
use std::ops::Deref;

/// Model input row, one value per schema field in schema order.
///
/// Only [`FeatureTransformer`] builds these.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl Deref for FeatureVector {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

/// Encode → validate → scale → order pipeline.
///
/// The vector is assembled by walking the bundle's schema; the record is
/// only ever read by field name, so its own key order never matters.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureTransformer;

impl FeatureTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Transform a record against a bundle.
    ///
    /// Fails on the first offending field.
    pub fn transform(
        &self,
        bundle: &ArtifactBundle,
        record: &RawRecord,
    ) -> Result<FeatureVector, TransformError> {
        let schema = bundle.schema();
        let mut features = Vec::with_capacity(schema.len());

        // Pass 1: label-encode categoricals, pass numerics through
        for field in schema.fields() {
            let value = record
                .get(&field.name)
                .ok_or_else(|| TransformError::MissingField {
                    field: field.name.clone(),
                })?;

            let encoded = match (field.kind, value) {
                (FieldKind::Categorical, RawValue::Text(label)) => {
                    let encoder = bundle.encoder(&field.name).ok_or_else(|| {
                        TransformError::SchemaMismatch {
                            expected: schema.len(),
                            actual: features.len(),
                        }
                    })?;
                    encoder
                        .encode(label)
                        .ok_or_else(|| TransformError::UnknownCategory {
                            field: field.name.clone(),
                            value: label.clone(),
                        })? as f64
                }
                (FieldKind::Numeric, RawValue::Number(x)) => *x,
                (kind, _) => {
                    return Err(TransformError::TypeMismatch {
                        field: field.name.clone(),
                        expected: match kind {
                            FieldKind::Categorical => "a string",
                            FieldKind::Numeric => "a number",
                        },
                    })
                }
            };
            features.push(encoded);
        }

        if features.len() != schema.len() {
            return Err(TransformError::SchemaMismatch {
                expected: schema.len(),
                actual: features.len(),
            });
        }

        // Pass 2: standardize exactly the fields the scaler was fit on
        let scaler = bundle.scaler();
        for &(pos, idx) in bundle.numeric_slots() {
            features[pos] = scaler.standardize(idx, features[pos]);
        }

        Ok(FeatureVector(features))
    }

    /// Transform several records independently.
    pub fn transform_batch(
        &self,
        bundle: &ArtifactBundle,
        records: &[RawRecord],
    ) -> Vec<Result<FeatureVector, TransformError>> {
        records
            .iter()
            .map(|record| self.transform(bundle, record))
            .collect()
    }

    /// Get feature names in vector order.
    pub fn feature_names<'a>(&self, bundle: &'a ArtifactBundle) -> Vec<&'a str> {
        bundle.schema().names().collect()
    }

    /// Get the number of features produced.
    pub fn feature_count(&self, bundle: &ArtifactBundle) -> usize {
        bundle.schema().len()
    }
}
