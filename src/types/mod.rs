//! Type definitions for the outcome service

pub mod prediction;
pub mod record;

pub use prediction::{ErrorResponse, HealthResponse, PredictResponse, PredictionResult};
pub use record::{PatientRecord, RawRecord, RawValue};
