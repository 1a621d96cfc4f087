//! Label encoders for categorical columns

use crate::error::LoadError;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Closed label set mapped onto `0..n`.
///
/// `classes[i]` encodes to `i`. The set never grows after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalEncoder {
    classes: Vec<String>,
    index: HashMap<String, u32>,
}

impl CategoricalEncoder {
    /// Build from an ordered class list as written by the training job.
    pub fn from_classes(classes: Vec<String>) -> Result<Self, LoadError> {
        if classes.is_empty() {
            return Err(LoadError::invalid("encoders", "encoder has no classes"));
        }

        let mut index = HashMap::with_capacity(classes.len());
        for (code, class) in classes.iter().enumerate() {
            if index.insert(class.clone(), code as u32).is_some() {
                return Err(LoadError::invalid(
                    "encoders",
                    format!("duplicate class {class:?}"),
                ));
            }
        }

        Ok(Self { classes, index })
    }

    /// Fit on observed values: unique labels in lexicographic order.
    pub fn fit<I, S>(values: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect();
        Self::from_classes(unique.into_iter().collect())
    }

    /// Code for a label, `None` when the label was never seen in training.
    pub fn encode(&self, label: &str) -> Option<u32> {
        self.index.get(label).copied()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Build encoders from the `encoders.json` artifact form: field name to
/// ordered class list.
pub fn encoders_from_classes(
    raw: BTreeMap<String, Vec<String>>,
) -> Result<HashMap<String, CategoricalEncoder>, LoadError> {
    raw.into_iter()
        .map(|(field, classes)| match CategoricalEncoder::from_classes(classes) {
            Ok(enc) => Ok((field, enc)),
            Err(e) => Err(LoadError::invalid("encoders", format!("{field}: {e}"))),
        })
        .collect()
}

/// Serialize encoders back to the artifact form.
pub fn encoders_to_json(
    encoders: &HashMap<String, CategoricalEncoder>,
) -> serde_json::Result<String> {
    let raw: BTreeMap<&str, &[String]> = encoders
        .iter()
        .map(|(field, enc)| (field.as_str(), enc.classes()))
        .collect();
    serde_json::to_string_pretty(&raw)
}
