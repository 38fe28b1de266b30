//! REST API Server for the music store agent
//!
//! Exposes sessions over HTTP: send a message, answer an account
//! confirmation, inspect or reset a session.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::agent::Agent;
use crate::error::AgentError;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConfirmRequest {
    pub decision: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<Agent>,
}

/// =============================
/// Helpers
/// =============================

fn stable_uuid_from_string(input: &str) -> uuid::Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    uuid::Uuid::from_bytes(bytes)
}

/// Session ids may be any string; non-UUIDs map to a stable UUID
fn session_uuid(raw: &str) -> uuid::Uuid {
    let raw = raw.trim();
    uuid::Uuid::parse_str(raw).unwrap_or_else(|_| stable_uuid_from_string(raw))
}

fn status_for(err: &AgentError) -> StatusCode {
    match err {
        AgentError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AgentError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        AgentError::ConfirmationPending(_) | AgentError::NoPendingConfirmation(_) => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: AgentError) -> ApiResult {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }
    (status, Json(ApiResponse::error(err.to_string())))
}

fn respond<T: Serialize>(result: crate::Result<T>) -> ApiResult {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::success(data))),
        Err(e) => error_response(e),
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Session Endpoints
/// =============================

async fn post_message(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> ApiResult {
    let session_id = session_uuid(&session_id);
    info!(session_id = %session_id, "Received message");

    respond(state.agent.handle_message(session_id, &req.content).await)
}

async fn post_confirm(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    Json(req): Json<ConfirmRequest>,
) -> ApiResult {
    let session_id = session_uuid(&session_id);
    info!(session_id = %session_id, "Received confirmation decision");

    respond(state.agent.confirm(session_id, &req.decision).await)
}

async fn get_session(State(state): State<ApiState>, Path(session_id): Path<String>) -> ApiResult {
    let session_id = session_uuid(&session_id);

    respond(state.agent.session(session_id).await.map(|checkpoint| {
        serde_json::json!({
            "session_id": checkpoint.session_id,
            "state": checkpoint.state,
            "confirmation": checkpoint.pending.as_ref().map(|p| p.request()),
            "created_at": checkpoint.created_at,
            "updated_at": checkpoint.updated_at,
        })
    }))
}

async fn delete_session(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> ApiResult {
    let session_id = session_uuid(&session_id);

    respond(
        state
            .agent
            .reset(session_id)
            .await
            .map(|_| serde_json::json!({ "session_id": session_id, "reset": true })),
    )
}

/// =============================
/// Router
/// =============================

pub fn create_router(agent: Arc<Agent>) -> Router {
    let state = ApiState { agent };

    Router::new()
        .route("/health", get(health))
        .route("/api/sessions/:session_id/messages", post(post_message))
        .route("/api/sessions/:session_id/confirm", post(post_confirm))
        .route(
            "/api/sessions/:session_id",
            get(get_session).delete(delete_session),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    agent: Arc<Agent>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(agent);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
