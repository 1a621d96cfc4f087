//! Feature schema: the ordered, typed column layout the model was trained on.

use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Kind of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Label-encoded string column
    Categorical,
    /// Standardized numeric column
    Numeric,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Categorical => "categorical",
            FieldKind::Numeric => "numeric",
        }
    }
}

/// A single named column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn categorical(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Categorical,
        }
    }

    pub fn numeric(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Numeric,
        }
    }
}

/// Ordered feature layout.
///
/// Position `i` in every feature vector is `fields[i]`. Construct through
/// [`FeatureSchema::new`] so names are checked for uniqueness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureSchema {
    fields: Vec<FieldSpec>,
}

#[derive(Deserialize)]
struct SchemaFile {
    fields: Vec<FieldSpec>,
}

impl FeatureSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, LoadError> {
        if fields.is_empty() {
            return Err(LoadError::invalid("schema", "schema has no fields"));
        }

        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if field.name.is_empty() {
                return Err(LoadError::invalid("schema", "field name is empty"));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(LoadError::invalid(
                    "schema",
                    format!("duplicate field {}", field.name),
                ));
            }
        }

        Ok(Self { fields })
    }

    /// Parse the `{"fields": [...]}` artifact form.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let file: SchemaFile = serde_json::from_slice(bytes)?;
        // Validation errors are raised by the loader through `new`
        Ok(Self {
            fields: file.fields,
        })
    }

    /// The layout the treatment-outcome training job produces.
    pub fn treatment_default() -> Self {
        Self {
            fields: vec![
                FieldSpec::numeric("Age"),
                FieldSpec::categorical("Gender"),
                FieldSpec::categorical("Condition"),
                FieldSpec::categorical("Drug_Name"),
                FieldSpec::numeric("Dosage_mg"),
                FieldSpec::numeric("Treatment_Duration_days"),
                FieldSpec::categorical("Side_Effects"),
            ],
        }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn names_of(&self, kind: FieldKind) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(move |f| f.kind == kind)
            .map(|f| f.name.as_str())
    }

    pub(crate) fn into_validated(self) -> Result<Self, LoadError> {
        Self::new(self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let schema = FeatureSchema::treatment_default();
        assert_eq!(schema.len(), 7);
        assert_eq!(schema.position("Age"), Some(0));
        assert_eq!(schema.position("Side_Effects"), Some(6));
        assert_eq!(
            schema.names_of(FieldKind::Numeric).collect::<Vec<_>>(),
            vec!["Age", "Dosage_mg", "Treatment_Duration_days"]
        );
    }

    #[test]
    fn test_rejects_duplicates() {
        let err = FeatureSchema::new(vec![
            FieldSpec::numeric("Age"),
            FieldSpec::categorical("Age"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate field Age"));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(FeatureSchema::new(Vec::new()).is_err());
    }

    #[test]
    fn test_parse_json() {
        let json = br#"{"fields":[{"name":"Age","kind":"numeric"},{"name":"Gender","kind":"categorical"}]}"#;
        let schema = FeatureSchema::from_json(json).unwrap().into_validated().unwrap();
        assert_eq!(schema.fields()[1], FieldSpec::categorical("Gender"));
    }
}
