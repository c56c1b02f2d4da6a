//! Ingress handlers

use crate::coordination::types::CompletionEvent;
use crate::ingress::error::{ApiError, ApiResult};
use crate::ingress::AppState;
use crate::observability::MetricsSnapshot;
use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

pub const AGENT_NAME: &str = "weather-coordinator";

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub run_id: String,
}

/// `date` may arrive as a string or as a bare day offset
fn date_hint(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Accept a trigger and start a run without waiting for it
pub async fn generate(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<GenerateResponse>> {
    let body: Value = serde_json::from_slice(&body).map_err(|_| ApiError::InvalidJson)?;

    let city = body
        .get("city")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(ApiError::MissingCity)?;
    let date = date_hint(body.get("date"));

    info!(city, date = ?date, "Received trigger");
    let run_id = state.sequencer.start_run(city, date)?;

    Ok(Json(GenerateResponse {
        status: "ok",
        message: "Request accepted, processing...",
        run_id: run_id.to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct EventAccepted {
    pub status: &'static str,
    pub receivers: usize,
}

/// Completion events reported back by remote workers
pub async fn publish_event(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<EventAccepted>)> {
    let event: CompletionEvent = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Rejected malformed completion event");
        ApiError::InvalidEvent(e.to_string())
    })?;

    info!(task_id = %event.task_id(), event_name = %event.event_name, "Completion event received");
    let receivers = state.events.publish(event).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(EventAccepted {
            status: "accepted",
            receivers,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub agent: &'static str,
    pub active_runs: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        agent: AGENT_NAME,
        active_runs: state.sequencer.active_runs(),
    })
}

pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.sequencer.metrics().snapshot())
}
