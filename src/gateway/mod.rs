//! HTTP gateway: routing, authentication and error mapping.
//!
//! Each `/predict` request moves through authenticate, readiness gate,
//! transform, predict and respond. Any step can fail; every failure is
//! mapped onto one [`GatewayError`] category and recorded in metrics before
//! the response leaves.

pub mod auth;
mod handlers;

use crate::bundle::BundleHandle;
use crate::config::AppConfig;
use crate::error::{PredictError, TransformError};
use crate::feature_transformer::FeatureTransformer;
use crate::metrics::ServiceMetrics;
use crate::models::inference::InferenceEngine;
use crate::types::prediction::ErrorResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Response header carrying the per-request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request header carrying the caller's credential
pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub bundle: Arc<BundleHandle>,
    pub metrics: Arc<ServiceMetrics>,
    api_key: Arc<str>,
    request_timeout: Duration,
    transformer: FeatureTransformer,
    engine: InferenceEngine,
}

impl AppState {
    pub fn new(
        bundle: Arc<BundleHandle>,
        metrics: Arc<ServiceMetrics>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            bundle,
            metrics,
            api_key: Arc::from(api_key.into()),
            request_timeout,
            transformer: FeatureTransformer::new(),
            engine: InferenceEngine::new(),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        bundle: Arc<BundleHandle>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self::new(
            bundle,
            metrics,
            config.auth.api_key.clone(),
            config.gateway.request_timeout(),
        )
    }
}

/// Create the service router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/predict", post(handlers::predict_handler))
        .with_state(state)
}

/// Every way a request can fail
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("missing or invalid API key")]
    Forbidden,

    #[error("model bundle is not loaded")]
    Unavailable,

    #[error("invalid request body: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Predict(#[from] PredictError),

    #[error("request exceeded its {0:?} deadline")]
    Timeout(Duration),

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    /// Stable category used in the response body and as the metrics outcome
    pub fn category(&self) -> &'static str {
        match self {
            GatewayError::Forbidden => "forbidden",
            GatewayError::Unavailable => "unavailable",
            GatewayError::InvalidRequest(_) => "invalid_request",
            GatewayError::Transform(TransformError::UnknownCategory { .. }) => "unknown_category",
            GatewayError::Transform(TransformError::MissingField { .. }) => "missing_field",
            GatewayError::Transform(TransformError::TypeMismatch { .. }) => "type_mismatch",
            GatewayError::Transform(TransformError::SchemaMismatch { .. })
            | GatewayError::Predict(_)
            | GatewayError::Internal(_) => "internal",
            GatewayError::Timeout(_) => "timeout",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Forbidden => StatusCode::FORBIDDEN,
            GatewayError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Transform(e) if e.is_client_fault() => StatusCode::BAD_REQUEST,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Transform(_) | GatewayError::Predict(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Internal faults are logged in full but answered opaquely
    pub fn is_internal(&self) -> bool {
        self.category() == "internal"
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        if self.is_internal() {
            return ErrorResponse {
                error: "internal".to_string(),
                message: "internal error".to_string(),
                field: None,
            };
        }
        ErrorResponse {
            error: self.category().to_string(),
            message: self.to_string(),
            field: match self {
                GatewayError::Transform(e) => e.field().map(str::to_string),
                _ => None,
            },
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_error_response())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_name_the_field() {
        let err = GatewayError::from(TransformError::UnknownCategory {
            field: "Gender".to_string(),
            value: "Unknown".to_string(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let body = err.to_error_response();
        assert_eq!(body.error, "unknown_category");
        assert_eq!(body.field.as_deref(), Some("Gender"));
        assert!(body.message.contains("Unknown"));
    }

    #[test]
    fn test_internal_errors_are_opaque() {
        let errors = [
            GatewayError::from(TransformError::SchemaMismatch {
                expected: 7,
                actual: 6,
            }),
            GatewayError::from(PredictError::NonFinite(f64::NAN)),
            GatewayError::Internal("worker panicked".to_string()),
        ];
        for err in errors {
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let body = err.to_error_response();
            assert_eq!(body.error, "internal");
            assert_eq!(body.message, "internal error");
            assert_eq!(body.field, None);
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(GatewayError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            GatewayError::Unavailable.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GatewayError::Timeout(Duration::from_millis(5)).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            GatewayError::InvalidRequest("eof".into()).category(),
            "invalid_request"
        );
    }
}
