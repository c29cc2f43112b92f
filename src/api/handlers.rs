//! HTTP request handlers

use super::types::{ChatQueryRequest, ErrorResponse, HealthResponse, SessionResponse};
use super::AppState;
use crate::runtime::{RuntimeError, TurnReply};
use crate::state_machine::TransitionError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/", get(health))
        // Chat turns
        .route("/chat/query", post(chat_query))
        // Session inspection and cancellation
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/cancel", post(cancel_session))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Health
// ============================================================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "Historical Monument Agent is running".to_string(),
        database: state.db.ping(),
    })
}

// ============================================================
// Chat
// ============================================================

async fn chat_query(
    State(state): State<AppState>,
    Json(req): Json<ChatQueryRequest>,
) -> Result<Json<TurnReply>, AppError> {
    let reply = state
        .runtime
        .handle_turn(req.session_id.as_deref(), &req.user_query)
        .await?;

    tracing::info!(
        session_id = %reply.session_id,
        stage = %reply.stage,
        "Turn completed"
    );
    Ok(Json(reply))
}

// ============================================================
// Sessions
// ============================================================

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state
        .db
        .session_record(&id)
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))?;

    Ok(Json(SessionResponse { session }))
}

async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TurnReply>, AppError> {
    state
        .runtime
        .cancel(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))
}

async fn get_version() -> &'static str {
    concat!("monument-concierge ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
pub(crate) enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<RuntimeError> for AppError {
    fn from(e: RuntimeError) -> Self {
        match e {
            RuntimeError::Transition(e @ TransitionError::EmptyInput) => {
                AppError::BadRequest(e.user_message().to_string())
            }
            RuntimeError::Transition(e) => {
                tracing::error!(error = %e, "Turn rejected");
                AppError::Internal(e.user_message().to_string())
            }
            RuntimeError::Storage(e) => {
                tracing::error!(error = %e, "Session storage failed");
                AppError::Internal("Session storage unavailable".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
