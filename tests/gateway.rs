use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;
use treatment_outcome_service::bundle::{
    ArtifactBundle, BundleHandle, CategoricalEncoder, FeatureSchema, FieldSpec, NumericScaler,
};
use treatment_outcome_service::gateway::{create_router, AppState, REQUEST_ID_HEADER};
use treatment_outcome_service::metrics::{ServiceMetrics, Stage};
use treatment_outcome_service::models::{LinearModel, Regressor};
use treatment_outcome_service::types::{ErrorResponse, HealthResponse, PredictResponse};

const KEY: &str = "test-key";

/// Age scaled by (40, 10), model = intercept + age_z + gender_code
fn bundle(gender_classes: &[&str], intercept: f64, version: &str) -> ArtifactBundle {
    let schema =
        FeatureSchema::new(vec![FieldSpec::numeric("Age"), FieldSpec::categorical("Gender")])
            .unwrap();
    let mut encoders = HashMap::new();
    encoders.insert(
        "Gender".to_string(),
        CategoricalEncoder::from_classes(gender_classes.iter().map(|s| s.to_string()).collect())
            .unwrap(),
    );
    let scaler = NumericScaler::new(vec!["Age".into()], vec![40.0], vec![10.0]).unwrap();
    let model = Regressor::Linear(LinearModel::new(intercept, vec![1.0, 1.0]));
    ArtifactBundle::new(schema, encoders, scaler, model, version).unwrap()
}

fn sum_bundle() -> ArtifactBundle {
    bundle(&["Male", "Female"], 0.0, "sum-v1")
}

fn test_app(handle: BundleHandle) -> (Router, Arc<BundleHandle>, Arc<ServiceMetrics>) {
    let handle = Arc::new(handle);
    let metrics = Arc::new(ServiceMetrics::new());
    let state = AppState::new(
        handle.clone(),
        metrics.clone(),
        KEY,
        Duration::from_secs(5),
    );
    (create_router(state), handle, metrics)
}

fn predict_request(key: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

const MALE_50: &str = r#"{"Age":50,"Gender":"Male"}"#;

#[tokio::test]
async fn test_health_follows_readiness() {
    let (app, handle, _) = test_app(BundleHandle::empty());

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let health: HealthResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(health.status, "unavailable");

    handle.publish(sum_bundle());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(health.status, "healthy");
}

#[tokio::test]
async fn test_predict_sum_model() {
    let (app, _, metrics) = test_app(BundleHandle::with_bundle(sum_bundle()));

    let response = app.oneshot(predict_request(Some(KEY), MALE_50)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));

    let body = body_bytes(response).await;
    let prediction: PredictResponse = serde_json::from_slice(&body).unwrap();
    // (50 - 40) / 10 + Male(0)
    assert_eq!(prediction.improvement_score, 1.0);
    assert_eq!(prediction.model_version, "sum-v1");

    assert_eq!(metrics.request_count("/predict", "success"), 1);
    assert_eq!(metrics.stage_count(Stage::Predict), 1);
}

#[tokio::test]
async fn test_missing_or_wrong_key_is_forbidden() {
    let (app, _, metrics) = test_app(BundleHandle::with_bundle(sum_bundle()));

    for key in [None, Some("wrong-key"), Some("")] {
        let response = app
            .clone()
            .oneshot(predict_request(key, MALE_50))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let err: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(err.error, "forbidden");
    }

    assert_eq!(metrics.stage_count(Stage::Transform), 0);
    assert_eq!(metrics.request_count("/predict", "forbidden"), 3);
}

#[tokio::test]
async fn test_unloaded_bundle_is_unavailable_regardless_of_body() {
    let (app, _, metrics) = test_app(BundleHandle::empty());

    for body in [MALE_50, "{not json", r#"{"Gender":"Unknown"}"#] {
        let response = app
            .clone()
            .oneshot(predict_request(Some(KEY), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let err: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(err.error, "unavailable");
    }

    assert_eq!(metrics.stage_count(Stage::Transform), 0);
}

#[tokio::test]
async fn test_unknown_category_names_the_field() {
    let (app, _, metrics) = test_app(BundleHandle::with_bundle(sum_bundle()));

    let response = app
        .oneshot(predict_request(Some(KEY), r#"{"Age":50,"Gender":"Unknown"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let err: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(err.error, "unknown_category");
    assert_eq!(err.field.as_deref(), Some("Gender"));

    // Transform ran, the model never did
    assert_eq!(metrics.stage_count(Stage::Transform), 1);
    assert_eq!(metrics.stage_count(Stage::Predict), 0);
}

#[tokio::test]
async fn test_client_errors() {
    let (app, _, metrics) = test_app(BundleHandle::with_bundle(sum_bundle()));

    let cases = [
        (r#"{"Gender":"Male"}"#, "missing_field", Some("Age")),
        ("{not json", "invalid_request", None),
        (r#"{"Age":"fifty","Gender":"Male"}"#, "invalid_request", None),
    ];

    for (body, category, field) in cases {
        let response = app
            .clone()
            .oneshot(predict_request(Some(KEY), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        let err: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(err.error, category, "{body}");
        assert_eq!(err.field.as_deref(), field, "{body}");
    }

    assert_eq!(metrics.request_count("/predict", "invalid_request"), 2);
    assert_eq!(metrics.request_count("/predict", "missing_field"), 1);
}

#[tokio::test]
async fn test_metrics_include_failure_outcomes() {
    let (app, _, _) = test_app(BundleHandle::with_bundle(sum_bundle()));

    app.clone()
        .oneshot(predict_request(Some(KEY), MALE_50))
        .await
        .unwrap();
    app.clone()
        .oneshot(predict_request(None, MALE_50))
        .await
        .unwrap();
    app.clone()
        .oneshot(predict_request(Some(KEY), r#"{"Age":50,"Gender":"Other"}"#))
        .await
        .unwrap();

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(body_bytes(response).await).unwrap();

    for outcome in ["success", "forbidden", "unknown_category"] {
        let labels = format!("endpoint=\"/predict\",outcome=\"{outcome}\"");
        assert!(
            text.contains(&format!("outcome_service_requests_total{{{labels}}} 1")),
            "missing count for {outcome}"
        );
        assert!(
            text.contains(&format!(
                "outcome_service_request_latency_seconds_count{{{labels}}} 1"
            )),
            "missing latency for {outcome}"
        );
    }
    assert!(text.contains("outcome_service_bundle_loaded 1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_swaps_never_mix_bundles() {
    // Bundle A: Male=0, intercept 0   -> 1.0
    // Bundle B: Male=1, intercept 100 -> 102.0
    // Mixing A's encoders with B's model (or the reverse) gives 101.0 or 2.0
    let (app, handle, _) = test_app(BundleHandle::with_bundle(bundle(
        &["Male", "Female"],
        0.0,
        "bundle-a",
    )));

    let swapper = {
        let handle = handle.clone();
        tokio::spawn(async move {
            for i in 0..200 {
                if i % 2 == 0 {
                    handle.publish(bundle(&["Female", "Male"], 100.0, "bundle-b"));
                } else {
                    handle.publish(bundle(&["Male", "Female"], 0.0, "bundle-a"));
                }
                tokio::task::yield_now().await;
            }
        })
    };

    let requests = (0..200).map(|_| {
        let app = app.clone();
        async move {
            let response = app.oneshot(predict_request(Some(KEY), MALE_50)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = body_bytes(response).await;
            serde_json::from_slice::<PredictResponse>(&body).unwrap()
        }
    });
    let responses = futures::future::join_all(requests).await;
    swapper.await.unwrap();

    for prediction in responses {
        let expected = match prediction.model_version.as_str() {
            "bundle-a" => 1.0,
            "bundle-b" => 102.0,
            other => panic!("unexpected version {other}"),
        };
        assert_eq!(prediction.improvement_score, expected);
    }
}

/// The full treatment layout with weights that are distinct powers of two,
/// so a value in the wrong slot or a dropped field changes the score.
fn treatment_bundle() -> ArtifactBundle {
    let classes = |labels: &[&str]| {
        CategoricalEncoder::from_classes(labels.iter().map(|s| s.to_string()).collect()).unwrap()
    };
    let mut encoders = HashMap::new();
    encoders.insert("Gender".to_string(), classes(&["Female", "Male"]));
    encoders.insert("Condition".to_string(), classes(&["Asthma", "Flu"]));
    encoders.insert("Drug_Name".to_string(), classes(&["DrugA", "DrugB"]));
    encoders.insert("Side_Effects".to_string(), classes(&["Nausea", "None"]));
    let scaler = NumericScaler::new(
        vec![
            "Age".into(),
            "Dosage_mg".into(),
            "Treatment_Duration_days".into(),
        ],
        vec![40.0, 10.0, 7.0],
        vec![10.0, 5.0, 7.0],
    )
    .unwrap();
    let model = Regressor::Linear(LinearModel::new(
        0.0,
        vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0],
    ));
    ArtifactBundle::new(
        FeatureSchema::treatment_default(),
        encoders,
        scaler,
        model,
        "treatment-v1",
    )
    .unwrap()
}

#[tokio::test]
async fn test_full_treatment_record() {
    let (app, _, _) = test_app(BundleHandle::with_bundle(treatment_bundle()));

    let forward = r#"{"Age":50,"Gender":"Male","Condition":"Flu","Drug_Name":"DrugA",
        "Dosage_mg":20.0,"Treatment_Duration_days":14,"Side_Effects":"None"}"#;
    let shuffled = r#"{"Side_Effects":"None","Dosage_mg":20.0,"Drug_Name":"DrugA",
        "Treatment_Duration_days":14,"Age":50,"Condition":"Flu","Gender":"Male"}"#;

    let mut scores = Vec::new();
    for body in [forward, shuffled] {
        let response = app
            .clone()
            .oneshot(predict_request(Some(KEY), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let prediction: PredictResponse =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(prediction.model_version, "treatment-v1");
        scores.push(prediction.improvement_score);
    }

    // Age 1.0, Male 1, Flu 1, DrugA 0, Dosage 2.0, Duration 1.0, None 1
    // 1*1 + 2*1 + 4*1 + 8*0 + 16*2 + 32*1 + 64*1
    assert_eq!(scores[0], 135.0);
    assert_eq!(scores[0].to_bits(), scores[1].to_bits());
}

#[test]
fn test_deadline_expiry_is_gateway_timeout() {
    // A single blocking thread, held busy, keeps inference queued past the
    // deadline
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .max_blocking_threads(1)
        .build()
        .unwrap();

    runtime.block_on(async {
        let handle = Arc::new(BundleHandle::with_bundle(sum_bundle()));
        let metrics = Arc::new(ServiceMetrics::new());
        let state = AppState::new(
            handle,
            metrics.clone(),
            KEY,
            Duration::from_millis(50),
        );
        let app = create_router(state);

        let busy = tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_millis(500)));

        let response = app.oneshot(predict_request(Some(KEY), MALE_50)).await.unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let err: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(err.error, "timeout");
        assert_eq!(metrics.request_count("/predict", "timeout"), 1);

        busy.await.unwrap();
    });
}
