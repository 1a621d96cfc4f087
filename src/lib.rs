//! Treatment Outcome Service Library
//!
//! Serves improvement-score predictions for patient treatment records over
//! HTTP, using a fitted artifact bundle (feature schema, label encoders,
//! standard scaler and regression model) that can be swapped at runtime.

pub mod bundle;
pub mod config;
pub mod error;
pub mod feature_transformer;
pub mod gateway;
pub mod metrics;
pub mod models;
pub mod reload;
pub mod types;

pub use bundle::{ArtifactBundle, BundleHandle};
pub use config::AppConfig;
pub use error::{LoadError, PredictError, TransformError};
pub use feature_transformer::{FeatureTransformer, FeatureVector};
pub use gateway::{create_router, AppState, GatewayError};
pub use metrics::{MetricsReporter, ServiceMetrics};
pub use models::{ArtifactLoader, InferenceEngine};
pub use types::{PatientRecord, PredictionResult, RawRecord, RawValue};
