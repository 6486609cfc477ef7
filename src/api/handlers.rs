//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde_json::Value;
use tracing::{error, info, warn};

use super::responses::{
    ApiResponse, CommandRequest, CreateTimerRequest, HealthResponse, MoveTimerRequest,
    StatusResponse, TimerResponse,
};
use crate::{
    state::{AppState, IndexPath, StateError, TimerId},
    sync::{Command, SyncMessage},
};

fn status_for(e: &StateError) -> StatusCode {
    match e {
        StateError::InvalidRequest(_) | StateError::Command(_) => StatusCode::BAD_REQUEST,
        StateError::NoSelection => StatusCode::CONFLICT,
        StateError::LockPoisoned(_) | StateError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(action: &str, e: StateError) -> StatusCode {
    let status = status_for(&e);
    if status.is_server_error() {
        error!("Failed to {}: {}", action, e);
    } else {
        warn!("Rejected {}: {}", action, e);
    }
    status
}

fn timer_response(state: &AppState, timer_id: TimerId) -> Result<Json<TimerResponse>, StatusCode> {
    let (groups, timers) = state
        .model_counts()
        .map_err(|e| reject("count timers", e))?;
    Ok(Json(TimerResponse {
        status: "ok".to_string(),
        timer_id,
        groups,
        timers,
    }))
}

/// Handle POST /timers - Create a timer at an index path
pub async fn create_timer_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateTimerRequest>,
) -> Result<Json<TimerResponse>, StatusCode> {
    let id = state
        .create_timer(request.index_path(), request.config)
        .map_err(|e| reject("create timer", e))?;
    info!("Timer {} created via API", id);
    timer_response(&state, id)
}

/// Handle DELETE /timers/:section/:item
pub async fn remove_timer_handler(
    State(state): State<Arc<AppState>>,
    Path((section, item)): Path<(usize, usize)>,
) -> Result<Json<TimerResponse>, StatusCode> {
    let id = state
        .remove_timer(IndexPath::new(section, item))
        .map_err(|e| reject("remove timer", e))?;
    timer_response(&state, id)
}

/// Handle POST /timers/move
pub async fn move_timer_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MoveTimerRequest>,
) -> Result<Json<Value>, StatusCode> {
    state
        .move_timer(request.from, request.to)
        .map_err(|e| reject("move timer", e))?;
    state
        .model_snapshot()
        .map(Json)
        .map_err(|e| reject("read model", e))
}

/// Handle POST /timers/:section/:item/select
pub async fn select_timer_handler(
    State(state): State<Arc<AppState>>,
    Path((section, item)): Path<(usize, usize)>,
) -> Result<Json<TimerResponse>, StatusCode> {
    let id = state
        .select_timer(IndexPath::new(section, item))
        .map_err(|e| reject("select timer", e))?;
    timer_response(&state, id)
}

/// Handle POST /command/:command - Drive the selected timer
pub async fn command_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Option<Json<CommandRequest>>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let Some(command) = Command::from_name(&name) else {
        warn!("Unknown command {}", name);
        return Err(StatusCode::NOT_FOUND);
    };
    let value = body.and_then(|Json(request)| request.value);

    let (applied, timer) = state
        .apply_command(command, value)
        .map_err(|e| reject(command.as_str(), e))?;
    if applied {
        let message = format!("{} applied, timer is {}", command, timer.mode);
        Ok(Json(ApiResponse::ok(message, timer)))
    } else {
        let message = format!("{} does not apply while {}", command, timer.mode);
        Ok(Json(ApiResponse::unchanged(message, timer)))
    }
}

/// Handle GET /model - Persisted form of the whole model
pub async fn model_handler(State(state): State<Arc<AppState>>) -> Result<Json<Value>, StatusCode> {
    state
        .model_snapshot()
        .map(Json)
        .map_err(|e| reject("read model", e))
}

/// Handle POST /peer - A peer message delivered over HTTP
pub async fn peer_handler(
    State(state): State<Arc<AppState>>,
    Json(message): Json<SyncMessage>,
) -> Result<Json<Option<SyncMessage>>, StatusCode> {
    info!("Peer message {} received over HTTP", message.kind());
    state
        .handle_peer_message(message, Utc::now())
        .map(Json)
        .map_err(|e| reject("handle peer message", e))
}

/// Handle GET /status - Return current status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, StatusCode> {
    let timer = state
        .get_timer_state()
        .map_err(|e| reject("get timer state", e))?;
    let (groups, timers) = state
        .model_counts()
        .map_err(|e| reject("count timers", e))?;
    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        timer,
        role: state.role,
        groups,
        timers,
        peer_reachable: state.peer_reachable(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
