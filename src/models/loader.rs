//! Artifact bundle loader

use crate::bundle::encoder::encoders_from_classes;
use crate::bundle::{ArtifactBundle, CategoricalEncoder, FeatureSchema, FieldSpec, NumericScaler};
use crate::config::{ArtifactPaths, ArtifactsConfig};
use crate::error::LoadError;
use crate::models::regressor::Regressor;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::path::Path;
use tracing::{debug, info};

/// Metadata that may accompany the model in `model.json`
#[derive(Debug, Default, Deserialize)]
struct ModelMeta {
    #[serde(default)]
    feature_names: Option<Vec<String>>,
    #[serde(default)]
    version: Option<String>,
}

/// Reads and validates the artifact bundle from disk.
///
/// Either every artifact loads and agrees with the schema, or nothing is
/// returned. The loader touches only the local filesystem.
#[derive(Debug, Clone)]
pub struct ArtifactLoader {
    paths: ArtifactPaths,
    model_version: Option<String>,
}

impl ArtifactLoader {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self {
            paths,
            model_version: None,
        }
    }

    pub fn from_config(config: &ArtifactsConfig) -> Self {
        Self {
            paths: config.paths(),
            model_version: config.model_version.clone(),
        }
    }

    /// Loader for a bundle directory with default file names
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self::new(ArtifactPaths {
            model: dir.join("model.json"),
            encoders: dir.join("encoders.json"),
            scaler: dir.join("scaler.json"),
            schema: dir.join("schema.json"),
            schema_required: false,
        })
    }

    /// Force the version tag instead of reading or deriving it
    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = Some(version.into());
        self
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Load all artifacts and assemble a validated bundle
    pub fn load(&self) -> Result<ArtifactBundle, LoadError> {
        info!(
            model = %self.paths.model.display(),
            encoders = %self.paths.encoders.display(),
            scaler = %self.paths.scaler.display(),
            "Loading artifact bundle"
        );

        let raw_encoders: BTreeMap<String, Vec<String>> =
            read_json("encoders", &self.paths.encoders)?;
        let encoders = encoders_from_classes(raw_encoders)?;

        let scaler: NumericScaler = read_json("scaler", &self.paths.scaler)?;

        let model_bytes = read_bytes("model", &self.paths.model)?;
        let model: Regressor = parse_json("model", &self.paths.model, &model_bytes)?;
        let meta: ModelMeta = parse_json("model", &self.paths.model, &model_bytes)?;

        let schema = if self.paths.schema_required || self.paths.schema.exists() {
            let bytes = read_bytes("schema", &self.paths.schema)?;
            FeatureSchema::from_json(&bytes).map_err(|source| LoadError::Parse {
                artifact: "schema",
                path: self.paths.schema.clone(),
                source,
            })?
        } else {
            debug!("No schema artifact, deriving schema from model feature names");
            derive_schema(meta.feature_names.as_deref(), &encoders, &scaler)?
        };
        check_request_fields(&schema)?;

        if let Some(names) = &meta.feature_names {
            let schema_names: Vec<&str> = schema.names().collect();
            if names.iter().map(String::as_str).ne(schema_names.iter().copied()) {
                return Err(LoadError::mismatch(format!(
                    "model feature order [{}] differs from schema [{}]",
                    names.join(", "),
                    schema_names.join(", ")
                )));
            }
        }

        let version = self
            .model_version
            .clone()
            .or(meta.version)
            .unwrap_or_else(|| content_version(&model_bytes));

        let bundle = ArtifactBundle::new(schema, encoders, scaler, model, version)?;

        info!(
            model = bundle.model().kind(),
            model_version = %bundle.model_version(),
            features = bundle.schema().len(),
            encoders = bundle.encoders().len(),
            "Artifact bundle loaded"
        );

        Ok(bundle)
    }
}

/// Schema from the model's feature order: categorical where an encoder
/// exists, numeric where the scaler has statistics.
fn derive_schema(
    feature_names: Option<&[String]>,
    encoders: &HashMap<String, CategoricalEncoder>,
    scaler: &NumericScaler,
) -> Result<FeatureSchema, LoadError> {
    let names = feature_names.ok_or_else(|| {
        LoadError::invalid(
            "schema",
            "no schema artifact and the model carries no feature_names",
        )
    })?;

    let fields = names
        .iter()
        .map(|name| {
            if encoders.contains_key(name) {
                Ok(FieldSpec::categorical(name))
            } else if scaler.index_of(name).is_some() {
                Ok(FieldSpec::numeric(name))
            } else {
                Err(LoadError::mismatch(format!(
                    "model feature {name} has neither an encoder nor scaler statistics"
                )))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    FeatureSchema::new(fields)
}

/// Every schema field must be one a `/predict` body can carry, with the
/// same kind. Otherwise the bundle would load but reject every request.
fn check_request_fields(schema: &FeatureSchema) -> Result<(), LoadError> {
    let request_fields = FeatureSchema::treatment_default();
    for field in schema.fields() {
        match request_fields.position(&field.name) {
            None => {
                return Err(LoadError::mismatch(format!(
                    "schema field {} is not a request field (expected one of: {})",
                    field.name,
                    request_fields.names().collect::<Vec<_>>().join(", ")
                )))
            }
            Some(pos) if request_fields.fields()[pos].kind != field.kind => {
                return Err(LoadError::mismatch(format!(
                    "schema types {} as {}, requests carry it as {}",
                    field.name,
                    field.kind.as_str(),
                    request_fields.fields()[pos].kind.as_str()
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// `sha256:` plus the first 12 hex digits of the model bytes
fn content_version(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::from("sha256:");
    for byte in digest.iter().take(6) {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn read_bytes(artifact: &'static str, path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|source| LoadError::Io {
        artifact,
        path: path.to_path_buf(),
        source,
    })
}

fn parse_json<T: DeserializeOwned>(
    artifact: &'static str,
    path: &Path,
    bytes: &[u8],
) -> Result<T, LoadError> {
    serde_json::from_slice(bytes).map_err(|source| LoadError::Parse {
        artifact,
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: DeserializeOwned>(artifact: &'static str, path: &Path) -> Result<T, LoadError> {
    let bytes = read_bytes(artifact, path)?;
    parse_json(artifact, path, &bytes)
}
