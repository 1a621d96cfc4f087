//! Inference engine for treatment outcome scoring

use crate::bundle::ArtifactBundle;
use crate::error::PredictError;
use crate::feature_transformer::FeatureVector;
use crate::types::prediction::PredictionResult;
use tracing::debug;

/// Stateless model evaluator.
///
/// Evaluation is pure and deterministic, so failures are never retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct InferenceEngine;

impl InferenceEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run the bundle's model on one feature vector
    pub fn predict(
        &self,
        bundle: &ArtifactBundle,
        features: &FeatureVector,
    ) -> Result<PredictionResult, PredictError> {
        let score = bundle.model().predict(features.as_slice())?;

        debug!(
            model = bundle.model().kind(),
            model_version = %bundle.model_version(),
            score = score,
            "Inference complete"
        );

        Ok(PredictionResult {
            score,
            model_version: bundle.model_version().to_string(),
        })
    }

    /// Run inference on a batch of feature vectors
    pub fn predict_batch(
        &self,
        bundle: &ArtifactBundle,
        batch: &[FeatureVector],
    ) -> Vec<Result<PredictionResult, PredictError>> {
        batch.iter().map(|f| self.predict(bundle, f)).collect()
    }
}
