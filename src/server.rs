//! HTTP boundary for the prediction service

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::PredictionError;
use crate::metrics::MetricsSnapshot;
use crate::schema::{FieldKind, SchemaVersion};
use crate::service::PredictionService;
use crate::types::assessment::{RiskAssessment, RiskBand};
use crate::types::patient::FieldViolation;

const SERVICE_NAME: &str = "cervical-risk-api";

/// State shared by all handlers
pub struct AppState {
    pub service: PredictionService,
}

impl AppState {
    pub fn new(service: PredictionService) -> Self {
        Self { service }
    }
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    violations: Option<Vec<FieldViolation>>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
    violations: Option<Vec<FieldViolation>>,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
            violations: None,
        }
    }

    fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    fn service_unavailable<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl From<PredictionError> for ApiError {
    fn from(err: PredictionError) -> Self {
        match err {
            PredictionError::Validation(e) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: e.to_string(),
                violations: Some(e.into_violations()),
            },
            PredictionError::Artifact(e) => Self::service_unavailable(e.to_string()),
            PredictionError::Inference(e) => Self::internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            error: self.message,
            violations: self.violations,
        });
        (self.status, payload).into_response()
    }
}

#[derive(Debug, Serialize)]
struct RootResponse {
    message: &'static str,
    version: &'static str,
    docs: &'static str,
    health: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    artifacts_loaded: bool,
    artifacts_dir: String,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct SchemaField {
    name: &'static str,
    feature: &'static str,
    kind: FieldKind,
    min: f64,
    max: f64,
    required: bool,
    aliases: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct SchemaResponse {
    version: SchemaVersion,
    fields: Vec<SchemaField>,
    risk_bands: Vec<RiskBand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    feature_list: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    status: &'static str,
    model: String,
    features: usize,
    loaded_at: DateTime<Utc>,
}

/// Bind `addr` and serve until ctrl-c
pub async fn start_server(state: AppState, addr: &str) -> Result<()> {
    let shared = Arc::new(state);
    let app = build_router(shared);
    let listener = bind_listener(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind listener on {addr}"))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/predict", post(handle_predict))
        .route("/schema", get(handle_schema))
        .route("/metrics", get(handle_metrics))
        .route("/admin/reload", post(handle_reload))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Cervical Cancer Risk Prediction API",
        version: env!("CARGO_PKG_VERSION"),
        docs: "/schema",
        health: "/health",
    })
}

async fn handle_health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        artifacts_loaded: state.service.artifacts().current().is_some(),
        artifacts_dir: state
            .service
            .artifacts()
            .loader()
            .artifacts_dir()
            .display()
            .to_string(),
        timestamp: Utc::now(),
    })
}

async fn handle_predict(
    State(state): State<SharedState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<RiskAssessment>, ApiError> {
    let Json(body) = payload?;

    // inference is CPU-bound and may load artifacts from disk
    let assessment = tokio::task::spawn_blocking(move || state.service.predict(&body))
        .await
        .map_err(|e| ApiError::internal(format!("prediction task failed: {e}")))??;

    Ok(Json(assessment))
}

async fn handle_schema(State(state): State<SharedState>) -> Json<SchemaResponse> {
    let validator = state.service.validator();
    let fields = validator
        .fields()
        .iter()
        .map(|spec| SchemaField {
            name: spec.name,
            feature: spec.feature,
            kind: spec.kind,
            min: spec.min,
            max: spec.max,
            required: spec.required,
            aliases: spec.keys().skip(1).collect(),
        })
        .collect();

    let feature_list = state
        .service
        .artifacts()
        .current()
        .map(|set| set.feature_schema.names().to_vec());

    Json(SchemaResponse {
        version: validator.version(),
        fields,
        risk_bands: state.service.classifier().table().bands().to_vec(),
        feature_list,
    })
}

async fn handle_metrics(State(state): State<SharedState>) -> Json<MetricsSnapshot> {
    Json(state.service.metrics().snapshot())
}

async fn handle_reload(State(state): State<SharedState>) -> Result<Json<ReloadResponse>, ApiError> {
    let reloaded = tokio::task::spawn_blocking(move || state.service.artifacts().reload())
        .await
        .map_err(|e| ApiError::internal(format!("reload task failed: {e}")))?
        .map_err(|e| {
            warn!(error = %e, "Artifact reload failed, keeping current set");
            ApiError::service_unavailable(e.to_string())
        })?;

    Ok(Json(ReloadResponse {
        status: "reloaded",
        model: reloaded.model.name().to_string(),
        features: reloaded.feature_schema.len(),
        loaded_at: reloaded.loaded_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::PredictionMetrics;
    use crate::models::{ArtifactCache, ArtifactLoader, RiskClassifier};
    use crate::schema::SchemaValidator;
    use crate::test_support::{sample_clinical_payload, write_artifacts, ArtifactFixture};
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use std::fs;
    use std::path::Path;
    use tower::ServiceExt;

    fn router_for(dir: &Path) -> Router {
        let loader = ArtifactLoader::new(&ArtifactFixture::clinical_linear().models_config(dir));
        let service = PredictionService::new(
            SchemaValidator::new(SchemaVersion::Clinical),
            RiskClassifier::default(),
            Arc::new(ArtifactCache::new(loader)),
            Arc::new(PredictionMetrics::new()),
        );
        build_router(Arc::new(AppState::new(service)))
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: String) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_predict_success() {
        let dir = write_artifacts(&ArtifactFixture::clinical_linear());
        let router = router_for(dir.path());

        let (status, body) = send(
            &router,
            post_json("/predict", sample_clinical_payload().to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model_used"], "LinearRegression");
        assert!(body["risk_score"].as_f64().is_some());
        assert!(body["recommendation"].is_string());
    }

    #[tokio::test]
    async fn test_predict_validation_error_is_422() {
        let dir = write_artifacts(&ArtifactFixture::clinical_linear());
        let router = router_for(dir.path());

        let mut payload = sample_clinical_payload();
        payload["Age"] = Value::from(7);
        payload["Smokes"] = Value::from("no");

        let (status, body) = send(&router, post_json("/predict", payload.to_string())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let violations = body["violations"].as_array().unwrap();
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0]["field"], "Age");
        assert_eq!(violations[0]["kind"], "out_of_range");
        assert_eq!(violations[1]["kind"], "wrong_type");
    }

    #[tokio::test]
    async fn test_predict_malformed_json_is_400() {
        let dir = write_artifacts(&ArtifactFixture::clinical_linear());
        let router = router_for(dir.path());

        let (status, body) = send(&router, post_json("/predict", "{\"Age\": ".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_predict_without_artifacts_is_503() {
        let dir = tempfile::tempdir().unwrap();
        let router = router_for(dir.path());

        let (status, body) = send(
            &router,
            post_json("/predict", sample_clinical_payload().to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("preprocessor.json"));

        let (_, health) = send(&router, get_request("/health")).await;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["artifacts_loaded"], false);
        assert_eq!(
            health["artifacts_dir"],
            dir.path().display().to_string().as_str()
        );
    }

    #[tokio::test]
    async fn test_predict_inference_error_is_500() {
        let mut fixture = ArtifactFixture::clinical_linear();
        fixture.feature_list.swap(0, 1);
        let dir = write_artifacts(&fixture);
        let router = router_for(dir.path());

        let (status, _) = send(
            &router,
            post_json("/predict", sample_clinical_payload().to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (_, metrics) = send(&router, get_request("/metrics")).await;
        assert_eq!(metrics["requests"], 1);
        assert_eq!(metrics["inference_failures"], 1);
    }

    #[tokio::test]
    async fn test_schema_lists_fields_and_feature_list() {
        let dir = write_artifacts(&ArtifactFixture::clinical_linear());
        let router = router_for(dir.path());

        let (status, body) = send(&router, get_request("/schema")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], "clinical");
        assert_eq!(body["fields"].as_array().unwrap().len(), 25);
        assert_eq!(body["fields"][12]["name"], "STDs_number");
        assert_eq!(body["fields"][12]["aliases"][0], "STDs (number)");
        assert!(body.get("feature_list").is_none());

        let bands = body["risk_bands"].as_array().unwrap();
        assert_eq!(bands.len(), 4);
        assert_eq!(bands[0]["level"], "LOW");
        assert_eq!(bands[0]["upper_bound"], 0.15);
        assert_eq!(bands[3]["level"], "VERY HIGH");
        assert!(bands[3]["upper_bound"].is_null());

        send(&router, post_json("/admin/reload", String::new())).await;
        let (_, body) = send(&router, get_request("/schema")).await;
        assert_eq!(body["feature_list"].as_array().unwrap().len(), 25);
    }

    #[tokio::test]
    async fn test_reload() {
        let fixture = ArtifactFixture::vif_tree();
        let dir = write_artifacts(&fixture);
        let router = router_for(dir.path());

        let (status, body) = send(&router, post_json("/admin/reload", String::new())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model"], "DecisionTreeRegressor");
        assert_eq!(body["features"], 10);

        fs::remove_file(dir.path().join("best_model.json")).unwrap();
        let (status, _) = send(&router, post_json("/admin/reload", String::new())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (_, health) = send(&router, get_request("/health")).await;
        assert_eq!(health["artifacts_loaded"], true);
    }

    #[tokio::test]
    async fn test_root() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = send(&router_for(dir.path()), get_request("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["health"], "/health");
    }
}
