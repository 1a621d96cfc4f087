use super::auth::authorize;
use super::{AppState, GatewayError, REQUEST_ID_HEADER};
use crate::metrics::Stage;
use crate::types::prediction::{HealthResponse, PredictionResult};
use crate::types::record::{PatientRecord, RawRecord};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

const HEALTH: &str = "/health";
const PREDICT: &str = "/predict";

/// Readiness check: healthy only while a bundle is loaded
pub(super) async fn health_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let start = Instant::now();
    let (status, label) = if state.bundle.is_ready() {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };
    let outcome = if status == StatusCode::OK {
        "success"
    } else {
        "unavailable"
    };
    state.metrics.record_request(HEALTH, outcome, start.elapsed());

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
        }),
    )
}

/// Prometheus exposition
pub(super) async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.set_bundle_loaded(state.bundle.is_ready());
    state.metrics.to_prometheus()
}

/// Score one treatment record.
///
/// The body is taken as raw bytes so a malformed payload is classified and
/// counted here instead of being rejected by an extractor.
pub(super) async fn predict_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("predict", request_id = %request_id);

    let result = predict(&state, &headers, body).instrument(span.clone()).await;

    let elapsed = start.elapsed();
    let outcome = match &result {
        Ok(_) => "success",
        Err(e) => e.category(),
    };
    state.metrics.record_request(PREDICT, outcome, elapsed);

    let mut response = span.in_scope(|| match result {
        Ok(prediction) => {
            info!(
                score = prediction.score,
                model_version = %prediction.model_version,
                latency_us = elapsed.as_micros() as u64,
                "Prediction served"
            );
            Json(prediction.to_response()).into_response()
        }
        Err(e) => {
            if e.is_internal() {
                error!(error = %e, latency_us = elapsed.as_micros() as u64, "Prediction failed");
            } else {
                warn!(
                    error = %e,
                    category = e.category(),
                    latency_us = elapsed.as_micros() as u64,
                    "Prediction rejected"
                );
            }
            e.into_response()
        }
    });

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

async fn predict(
    state: &AppState,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<PredictionResult, GatewayError> {
    authorize(headers, &state.api_key)?;

    // One snapshot for the whole request
    let bundle = state.bundle.current().ok_or(GatewayError::Unavailable)?;

    let record: PatientRecord = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
    let raw = RawRecord::from(&record);
    debug!(fields = raw.len(), "Request parsed");

    let metrics = state.metrics.clone();
    let transformer = state.transformer;
    let engine = state.engine;
    let work = tokio::task::spawn_blocking(move || -> Result<PredictionResult, GatewayError> {
        metrics.record_stage(Stage::Transform);
        let features = transformer.transform(&bundle, &raw)?;
        metrics.record_stage(Stage::Predict);
        Ok(engine.predict(&bundle, &features)?)
    });

    match tokio::time::timeout(state.request_timeout, work).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(GatewayError::Internal(format!(
            "inference worker failed: {join_err}"
        ))),
        Err(_) => Err(GatewayError::Timeout(state.request_timeout)),
    }
}
