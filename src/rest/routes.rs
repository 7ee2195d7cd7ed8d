//! Route handlers for the admission/query surface (spec §4.H, §6).
//!
//! Grounded on the teacher's handler shape in `rest/routes/sessions.rs`:
//! `State(Arc<_>)` + `Json<Value>` + `Result<Json<Value>, (StatusCode, Json<Value>)>`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::store::Bucket;

type ApiError = (StatusCode, Json<Value>);

fn bad_request(msg: impl std::fmt::Display) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg.to_string() })))
}

fn internal_error(e: EngineError) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}

/// `GET /` — `{paused, in_flight}` (spec §4.H `status`).
pub async fn status(State(engine): State<Arc<Engine>>) -> Json<Value> {
    let (paused, in_flight) = engine.status();
    Json(json!({ "paused": paused, "in_flight": in_flight }))
}

#[derive(Deserialize)]
pub struct SubmitRequest {
    pub url: String,
    /// Base64-encoded opaque payload.
    #[serde(default)]
    pub payload: String,
    /// HTTP status that signals success. Zero/absent defaults to 200.
    #[serde(default)]
    pub expected: u16,
    /// Cron expression; empty means one-shot.
    #[serde(default)]
    pub schedule: String,
    /// Initial delay in minutes before the task becomes eligible.
    #[serde(default)]
    pub delay: i64,
}

/// `POST /` — submit a task. Returns 201 with a `Poussetaches-Task-ID` header
/// on success (spec §4.H `submit`, §6).
pub async fn submit(
    State(engine): State<Arc<Engine>>,
    Json(body): Json<SubmitRequest>,
) -> Result<Response, ApiError> {
    let payload = base64::engine::general_purpose::STANDARD
        .decode(body.payload.as_bytes())
        .map_err(|e| bad_request(format!("invalid base64 payload: {e}")))?;

    let id = engine
        .submit(body.url, payload, body.expected, body.schedule, body.delay)
        .await
        .map_err(|e| match e {
            EngineError::Admission(msg) => bad_request(msg),
            other => internal_error(other),
        })?;

    let header_value = HeaderValue::from_str(&id)
        .map_err(|e| internal_error(EngineError::Admission(e.to_string())))?;
    let mut response = StatusCode::CREATED.into_response();
    response
        .headers_mut()
        .insert(HeaderName::from_static("poussetaches-task-id"), header_value);
    Ok(response)
}

async fn list_bucket(engine: &Engine, bucket: Bucket) -> Result<Json<Value>, ApiError> {
    let tasks = engine.list(bucket).await.map_err(internal_error)?;
    Ok(Json(json!({ "tasks": tasks })))
}

/// `GET /waiting`
pub async fn list_waiting(State(engine): State<Arc<Engine>>) -> Result<Json<Value>, ApiError> {
    list_bucket(&engine, Bucket::Waiting).await
}

/// `GET /success`
pub async fn list_success(State(engine): State<Arc<Engine>>) -> Result<Json<Value>, ApiError> {
    list_bucket(&engine, Bucket::Success).await
}

/// `GET /dead`
pub async fn list_dead(State(engine): State<Arc<Engine>>) -> Result<Json<Value>, ApiError> {
    list_bucket(&engine, Bucket::Dead).await
}

/// `GET /cron` — `list("waiting")` filtered to `schedule != ""`.
pub async fn list_cron(State(engine): State<Arc<Engine>>) -> Result<Json<Value>, ApiError> {
    let tasks = engine.list_cron().await.map_err(internal_error)?;
    Ok(Json(json!({ "tasks": tasks })))
}

/// `DELETE /cron` — clears the scheduled-task index and reloads from disk,
/// dropping every existing cron entry in the process (§4.H/§4.I).
pub async fn reload_cron(State(engine): State<Arc<Engine>>) -> Result<Json<Value>, ApiError> {
    engine.reload_cron().await.map_err(internal_error)?;
    Ok(Json(json!({ "ok": true })))
}

/// `POST /pause`
pub async fn pause(State(engine): State<Arc<Engine>>) -> Json<Value> {
    engine.pause();
    Json(json!({ "paused": true }))
}

/// `POST /resume`
pub async fn resume(State(engine): State<Arc<Engine>>) -> Json<Value> {
    engine.resume();
    Json(json!({ "paused": false }))
}
