use axum::{
    extract::State,
    Json,
    http::StatusCode,
};
use serde::Serialize;
use crate::server::AppState;
use crate::sync::{EventOutcome, ReconcileReport, SourceEvent};
use crate::Error;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct EventResponse {
    pub id: String,
    #[serde(flatten)]
    pub outcome: EventOutcome,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: Error) -> ApiError {
    let status = match &err {
        Error::ExternalSource { .. } => StatusCode::BAD_GATEWAY,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::Config(_) | Error::InvalidPath(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: err.to_string() }))
}

fn join_error(err: tokio::task::JoinError) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: err.to_string() }))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn handle_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<SourceEvent>,
) -> Result<Json<EventResponse>, ApiError> {
    let engine = state.engine.clone();
    let id = event.id.clone();
    let outcome = tokio::task::spawn_blocking(move || engine.handle(&event))
        .await
        .map_err(join_error)?
        .map_err(api_error)?;
    Ok(Json(EventResponse { id, outcome }))
}

pub async fn synchronize(State(state): State<Arc<AppState>>) -> Result<Json<ReconcileReport>, ApiError> {
    let engine = state.engine.clone();
    let report = tokio::task::spawn_blocking(move || engine.synchronize_inventory())
        .await
        .map_err(join_error)?
        .map_err(api_error)?;
    Ok(Json(report))
}
