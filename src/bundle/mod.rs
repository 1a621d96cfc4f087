//! Artifact bundle: schema, encoders, scaler and model as one immutable unit.
//!
//! A bundle is validated as a whole when it is built. Once it exists every
//! categorical schema field has an encoder, the scaler covers exactly the
//! numeric fields, and the model takes one input per schema field. Nothing
//! mutates it afterwards; replacement goes through [`handle::BundleHandle`].

pub mod encoder;
pub mod handle;
pub mod scaler;
pub mod schema;

pub use encoder::CategoricalEncoder;
pub use handle::BundleHandle;
pub use scaler::NumericScaler;
pub use schema::{FeatureSchema, FieldKind, FieldSpec};

use crate::error::LoadError;
use crate::models::regressor::Regressor;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

/// Immutable set of fitted artifacts
#[derive(Debug)]
pub struct ArtifactBundle {
    schema: FeatureSchema,
    encoders: HashMap<String, CategoricalEncoder>,
    scaler: NumericScaler,
    model: Regressor,
    model_version: String,
    loaded_at: DateTime<Utc>,
    /// (schema position, scaler index) for every numeric field
    numeric_slots: Vec<(usize, usize)>,
}

impl ArtifactBundle {
    /// Assemble and cross-validate a bundle.
    pub fn new(
        schema: FeatureSchema,
        encoders: HashMap<String, CategoricalEncoder>,
        scaler: NumericScaler,
        model: Regressor,
        model_version: impl Into<String>,
    ) -> Result<Self, LoadError> {
        let schema = schema.into_validated()?;
        let scaler = scaler.validated()?;
        let model = model.validated()?;

        for name in schema.names_of(FieldKind::Categorical) {
            if !encoders.contains_key(name) {
                return Err(LoadError::mismatch(format!(
                    "categorical field {name} has no encoder"
                )));
            }
        }
        let mut extra: Vec<&str> = encoders
            .keys()
            .map(String::as_str)
            .filter(|name| {
                !schema
                    .fields()
                    .iter()
                    .any(|f| f.name == *name && f.kind == FieldKind::Categorical)
            })
            .collect();
        if !extra.is_empty() {
            extra.sort_unstable();
            return Err(LoadError::mismatch(format!(
                "encoders for fields that are not categorical schema fields: {}",
                extra.join(", ")
            )));
        }

        let schema_numeric: BTreeSet<&str> = schema.names_of(FieldKind::Numeric).collect();
        let scaler_fields: BTreeSet<&str> =
            scaler.feature_names().iter().map(String::as_str).collect();
        if schema_numeric != scaler_fields {
            let missing: Vec<&str> = schema_numeric.difference(&scaler_fields).copied().collect();
            let unexpected: Vec<&str> =
                scaler_fields.difference(&schema_numeric).copied().collect();
            return Err(LoadError::mismatch(format!(
                "scaler fields differ from numeric schema fields (not scaled: [{}], not in schema: [{}])",
                missing.join(", "),
                unexpected.join(", ")
            )));
        }

        if model.n_features() != schema.len() {
            return Err(LoadError::mismatch(format!(
                "model expects {} features, schema has {}",
                model.n_features(),
                schema.len()
            )));
        }

        let numeric_slots = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, f)| f.kind == FieldKind::Numeric)
            .filter_map(|(pos, f)| scaler.index_of(&f.name).map(|idx| (pos, idx)))
            .collect();

        Ok(Self {
            schema,
            encoders,
            scaler,
            model,
            model_version: model_version.into(),
            loaded_at: Utc::now(),
            numeric_slots,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn encoder(&self, field: &str) -> Option<&CategoricalEncoder> {
        self.encoders.get(field)
    }

    pub fn encoders(&self) -> &HashMap<String, CategoricalEncoder> {
        &self.encoders
    }

    pub fn scaler(&self) -> &NumericScaler {
        &self.scaler
    }

    pub fn model(&self) -> &Regressor {
        &self.model
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub(crate) fn numeric_slots(&self) -> &[(usize, usize)] {
        &self.numeric_slots
    }
}
