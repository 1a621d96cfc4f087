//! Prediction results and their wire form

use serde::{Deserialize, Serialize};

/// Output of one model evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    /// Predicted improvement score
    pub score: f64,
    /// Version tag of the bundle that produced the score
    pub model_version: String,
}

impl PredictionResult {
    pub fn to_response(&self) -> PredictResponse {
        PredictResponse {
            improvement_score: self.score,
            model_version: self.model_version.clone(),
        }
    }
}

/// `/predict` success body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(rename = "Improvement_Score")]
    pub improvement_score: f64,
    #[serde(rename = "Model_Version")]
    pub model_version: String,
}

/// Structured error body returned for every failed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Coarse category, stable across releases
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// `/health` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
