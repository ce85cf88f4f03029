//! HTTP surface of `annopool serve`.
//!
//! Route paths and body field names match the annotation front end. The
//! annotator id comes from the `user_id` cookie.

use std::collections::BTreeSet;

use annopool_core::domain::GraspId;
use annopool_core::{Assignment, PoolError, Submission, UnitId, WorkCoordinator};
use axum::body::Bytes;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    coordinator: WorkCoordinator,
}

pub fn router(coordinator: WorkCoordinator) -> Router {
    Router::new()
        .route("/api/get-object-grasp", post(get_object_grasp))
        .route("/api/submit-annotation", post(submit_annotation))
        .route("/api/submit-malformed", post(submit_malformed))
        .route("/api/submit-invalid-grasp", post(submit_invalid_grasp))
        .route("/api/stats", get(stats))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { coordinator })
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<PoolError> for ApiError {
    fn from(err: PoolError) -> Self {
        let status = match &err {
            PoolError::UnknownUnit(_) | PoolError::UnknownObject { .. } => StatusCode::NOT_FOUND,
            PoolError::LogWrite(_) | PoolError::ShutDown => StatusCode::SERVICE_UNAVAILABLE,
            PoolError::SkeletonUnavailable(_) | PoolError::LogReplay(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        Self::new(status, err.to_string())
    }
}

/// Annotator id from the `user_id` cookie.
pub struct Annotator(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Annotator {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|cookies| cookie_value(cookies, "user_id"))
            .map(Annotator)
            .ok_or_else(|| ApiError::bad_request("missing user_id cookie"))
    }
}

fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        let value = value.trim().trim_matches('"');
        (key.trim() == name && !value.is_empty()).then(|| value.to_string())
    })
}

/// The front end reads grasp ids out of the query string, so accept `"3"` as
/// well as `3`.
fn lenient_grasp_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<GraspId, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Int(GraspId),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Int(id) => Ok(id),
        Repr::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnitBody {
    pub object_category: String,
    pub object_id: String,
    #[serde(deserialize_with = "lenient_grasp_id")]
    pub grasp_id: GraspId,
}

impl From<UnitId> for UnitBody {
    fn from(unit: UnitId) -> Self {
        Self {
            object_category: unit.category,
            object_id: unit.object_id,
            grasp_id: unit.grasp_id,
        }
    }
}

impl From<UnitBody> for UnitId {
    fn from(body: UnitBody) -> Self {
        UnitId::new(body.object_category, body.object_id, body.grasp_id)
    }
}

#[derive(Debug, Default, Deserialize)]
struct AssignRequest {
    #[serde(default)]
    exclude_categories: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
struct AnnotationBody {
    object_category: String,
    object_id: String,
    #[serde(deserialize_with = "lenient_grasp_id")]
    grasp_id: GraspId,
    /// Everything else the form sent.
    #[serde(flatten)]
    payload: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ObjectBody {
    object_category: String,
    object_id: String,
}

async fn get_object_grasp(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    // The front end posts with an empty body.
    let request: AssignRequest = if body.iter().all(u8::is_ascii_whitespace) {
        AssignRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::bad_request(format!("invalid body: {e}")))?
    };

    let response = match state
        .coordinator
        .assign_excluding(&request.exclude_categories)
        .await?
    {
        Assignment::Unit(unit) => Json(UnitBody::from(unit)).into_response(),
        Assignment::Exhausted => Json(json!({ "status": "exhausted" })).into_response(),
    };
    Ok(response)
}

async fn submit_annotation(
    State(state): State<AppState>,
    Annotator(annotator_id): Annotator,
    Json(body): Json<AnnotationBody>,
) -> Result<Json<Value>, ApiError> {
    let unit = UnitId::new(body.object_category, body.object_id, body.grasp_id);
    let submission = Submission::new(unit, annotator_id, Value::Object(body.payload));
    let outcome = state.coordinator.submit(submission).await?;
    Ok(Json(json!({ "status": outcome })))
}

async fn submit_malformed(
    State(state): State<AppState>,
    Annotator(annotator_id): Annotator,
    Json(body): Json<ObjectBody>,
) -> Result<Response, ApiError> {
    let outcome = state
        .coordinator
        .report_malformed(&body.object_category, &body.object_id, &annotator_id)
        .await?;
    Ok(Json(outcome).into_response())
}

async fn submit_invalid_grasp(
    State(state): State<AppState>,
    Annotator(annotator_id): Annotator,
    Json(body): Json<UnitBody>,
) -> Result<Response, ApiError> {
    let unit = UnitId::from(body);
    let outcome = state
        .coordinator
        .report_invalid_grasp(&unit, &annotator_id)
        .await?;
    Ok(Json(outcome).into_response())
}

async fn stats(State(state): State<AppState>) -> Response {
    Json(state.coordinator.stats().await).into_response()
}

async fn healthz() -> &'static str {
    "ok"
}
