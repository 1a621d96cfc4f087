//! Demo Bundle Generator
//!
//! Synthesizes a treatment table and writes a complete artifact bundle
//! (schema, encoders, scaler, linear model) for local runs of the service.
//!
//! Usage: demo-bundle [OUT_DIR] [RECORDS] [SEED]

use anyhow::{Context, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;
use treatment_outcome_service::bundle::encoder::encoders_to_json;
use treatment_outcome_service::bundle::{
    CategoricalEncoder, FeatureSchema, FieldKind, NumericScaler,
};
use treatment_outcome_service::models::{ArtifactLoader, LinearModel, Regressor};
use treatment_outcome_service::types::PatientRecord;

const GENDERS: &[&str] = &["Female", "Male"];
const CONDITIONS: &[&str] = &["Arthritis", "Asthma", "Diabetes", "Hypertension", "Migraine"];
const DRUGS: &[&str] = &["Atorvastatin", "Ibuprofen", "Lisinopril", "Metformin", "Salbutamol"];
const SIDE_EFFECTS: &[&str] = &["Dizziness", "Fatigue", "Headache", "Nausea", "None"];

/// Random treatment record generator
struct RecordGenerator {
    rng: StdRng,
}

impl RecordGenerator {
    fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    fn generate(&mut self) -> PatientRecord {
        PatientRecord::new(
            self.rng.gen_range(18..90),
            self.random_choice(GENDERS),
            self.random_choice(CONDITIONS),
            self.random_choice(DRUGS),
            (self.rng.gen_range(5.0..500.0_f64) * 10.0).round() / 10.0,
            self.rng.gen_range(3..180),
            self.random_choice(SIDE_EFFECTS),
        )
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

/// Column of a record by wire name. Generated records are fully populated.
fn text_column(records: &[PatientRecord], field: &str) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| match field {
            "Gender" => r.gender.clone(),
            "Condition" => r.condition.clone(),
            "Drug_Name" => r.drug_name.clone(),
            "Side_Effects" => r.side_effects.clone(),
            _ => None,
        })
        .collect()
}

fn numeric_column(records: &[PatientRecord], field: &str) -> Vec<f64> {
    records
        .iter()
        .filter_map(|r| match field {
            "Age" => r.age.map(|v| v as f64),
            "Dosage_mg" => r.dosage_mg,
            "Treatment_Duration_days" => r.treatment_duration_days.map(|v| v as f64),
            _ => None,
        })
        .collect()
}

fn write_json(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("demo_bundle=info".parse()?),
        )
        .init();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let out_dir = args.get(1).map(|s| s.as_str()).unwrap_or("artifacts");
    let count: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(500);
    let seed: Option<u64> = args.get(3).and_then(|s| s.parse().ok());

    info!(out_dir = %out_dir, count = count, seed = ?seed, "Generating demo bundle");

    let mut generator = RecordGenerator::new(seed);
    let records: Vec<PatientRecord> = (0..count.max(1)).map(|_| generator.generate()).collect();

    let schema = FeatureSchema::treatment_default();

    let mut encoders = HashMap::new();
    for name in schema.names_of(FieldKind::Categorical) {
        let encoder = CategoricalEncoder::fit(text_column(&records, name))
            .with_context(|| format!("Failed to fit encoder for {name}"))?;
        info!(field = name, classes = encoder.len(), "Encoder fitted");
        encoders.insert(name.to_string(), encoder);
    }

    let numeric: Vec<(&str, Vec<f64>)> = schema
        .names_of(FieldKind::Numeric)
        .map(|name| (name, numeric_column(&records, name)))
        .collect();
    let columns: Vec<(&str, &[f64])> = numeric.iter().map(|(n, v)| (*n, v.as_slice())).collect();
    let scaler = NumericScaler::fit(&columns).context("Failed to fit scaler")?;

    let coefficients: Vec<f64> = (0..schema.len())
        .map(|_| generator.rng.gen_range(-1.0..1.0))
        .collect();
    let model = Regressor::Linear(LinearModel::new(generator.rng.gen_range(2.0..4.0), coefficients));

    let mut model_json = serde_json::to_value(&model)?;
    if let Some(obj) = model_json.as_object_mut() {
        obj.insert(
            "feature_names".to_string(),
            serde_json::to_value(schema.names().collect::<Vec<_>>())?,
        );
        obj.insert(
            "version".to_string(),
            serde_json::Value::String(format!("demo-{}", Utc::now().format("%Y%m%dT%H%M%SZ"))),
        );
    }

    let dir = Path::new(out_dir);
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {out_dir}"))?;
    write_json(&dir.join("schema.json"), &serde_json::to_string_pretty(&schema)?)?;
    write_json(&dir.join("encoders.json"), &encoders_to_json(&encoders)?)?;
    write_json(&dir.join("scaler.json"), &serde_json::to_string_pretty(&scaler)?)?;
    write_json(&dir.join("model.json"), &serde_json::to_string_pretty(&model_json)?)?;

    // Read the bundle back exactly as the service would
    let bundle = ArtifactLoader::from_dir(dir)
        .load()
        .context("Generated bundle failed validation")?;

    info!(
        out_dir = %out_dir,
        model_version = %bundle.model_version(),
        features = bundle.schema().len(),
        "Demo bundle written"
    );

    Ok(())
}
