//! Patient/treatment records as received from callers

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Request body for `/predict`.
///
/// Fields are optional on the wire so that an absent field is reported by
/// the transformer as a missing schema field rather than a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(rename = "Age", default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,

    #[serde(rename = "Gender", default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    #[serde(rename = "Condition", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(rename = "Drug_Name", default, skip_serializing_if = "Option::is_none")]
    pub drug_name: Option<String>,

    #[serde(rename = "Dosage_mg", default, skip_serializing_if = "Option::is_none")]
    pub dosage_mg: Option<f64>,

    #[serde(
        rename = "Treatment_Duration_days",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub treatment_duration_days: Option<i64>,

    #[serde(rename = "Side_Effects", default, skip_serializing_if = "Option::is_none")]
    pub side_effects: Option<String>,
}

impl PatientRecord {
    /// A fully populated record
    pub fn new(
        age: i64,
        gender: &str,
        condition: &str,
        drug_name: &str,
        dosage_mg: f64,
        treatment_duration_days: i64,
        side_effects: &str,
    ) -> Self {
        Self {
            age: Some(age),
            gender: Some(gender.to_string()),
            condition: Some(condition.to_string()),
            drug_name: Some(drug_name.to_string()),
            dosage_mg: Some(dosage_mg),
            treatment_duration_days: Some(treatment_duration_days),
            side_effects: Some(side_effects.to_string()),
        }
    }

    /// Lower into a name-keyed record. Absent fields are left out.
    pub fn to_raw(&self) -> RawRecord {
        let mut raw = RawRecord::default();
        if let Some(v) = self.age {
            raw.insert("Age", RawValue::Number(v as f64));
        }
        if let Some(v) = &self.gender {
            raw.insert("Gender", RawValue::Text(v.clone()));
        }
        if let Some(v) = &self.condition {
            raw.insert("Condition", RawValue::Text(v.clone()));
        }
        if let Some(v) = &self.drug_name {
            raw.insert("Drug_Name", RawValue::Text(v.clone()));
        }
        if let Some(v) = self.dosage_mg {
            raw.insert("Dosage_mg", RawValue::Number(v));
        }
        if let Some(v) = self.treatment_duration_days {
            raw.insert("Treatment_Duration_days", RawValue::Number(v as f64));
        }
        if let Some(v) = &self.side_effects {
            raw.insert("Side_Effects", RawValue::Text(v.clone()));
        }
        raw
    }
}

/// A single raw field value
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
}

/// Field name to raw value. Has no ordering of its own; consumers look
/// fields up by schema name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    values: HashMap<String, RawValue>,
}

impl RawRecord {
    pub fn insert(&mut self, field: &str, value: RawValue) {
        self.values.insert(field.to_string(), value);
    }

    pub fn with(mut self, field: &str, value: RawValue) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&RawValue> {
        self.values.get(field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<&PatientRecord> for RawRecord {
    fn from(record: &PatientRecord) -> Self {
        record.to_raw()
    }
}
