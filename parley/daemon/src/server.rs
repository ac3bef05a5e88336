//! HTTP Server
//!
//! The daemon's HTTP surface: one streaming exchange endpoint plus
//! session query endpoints. Handlers are thin - they translate HTTP
//! into orchestrator and store calls and map the error taxonomy onto
//! status codes.
//!
//! # Identity
//!
//! Authentication is an external collaborator: an upstream auth layer
//! terminates the user's session and installs the caller's subject in
//! the `x-parley-identity` header. The daemon trusts that header and
//! scopes every store operation to it.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use parley_core::{
    ChatStore, ExchangeError, ExchangeOrchestrator, Identity, Session, SessionId, SessionSummary,
    StoreError,
};

/// Header installed by the upstream auth layer
pub const IDENTITY_HEADER: &str = "x-parley-identity";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// Exchange orchestrator
    pub orchestrator: Arc<ExchangeOrchestrator>,
    /// Session store, for the query endpoints
    pub store: Arc<dyn ChatStore>,
}

/// API error with HTTP status mapping
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad or missing request content (422)
    #[error("{0}")]
    Validation(String),

    /// Session absent or not owned by the caller (404)
    #[error("session not found")]
    NotFound,

    /// Backend failed before streaming began (502)
    #[error("backend unavailable: {0}")]
    Upstream(String),

    /// Unexpected failure (500)
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ExchangeError> for ApiError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::Validation(msg) => Self::Validation(msg),
            ExchangeError::NotFound => Self::NotFound,
            ExchangeError::Upstream(msg) => Self::Upstream(msg),
            ExchangeError::Persistence(msg) => Self::Internal(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::InvalidContent(msg) => Self::Validation(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            Self::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            // Detail stays in the logs; the client gets a generic failure
            Self::Upstream(_) => (StatusCode::BAD_GATEWAY, "backend unavailable".to_string()),
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "an error occurred".to_string(),
            ),
        };
        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}

/// Exchange request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRequest {
    /// Target session; absent means "create one"
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// The user message
    pub message: String,
}

/// Build the daemon router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/exchange", post(exchange))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/{id}", get(get_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// The streaming exchange endpoint
async fn exchange(
    State(st): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ExchangeRequest>,
) -> Result<Response, ApiError> {
    let identity = identity_from_headers(&headers)?;

    let stream = st
        .orchestrator
        .handle_exchange(&identity, req.session_id, &req.message)
        .await?;

    if let Some(ref minted) = stream.minted_session {
        tracing::info!(session = %minted, "minted session for exchange");
    }

    let body = Body::from_stream(stream.into_frames());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(body)
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn list_sessions(
    State(st): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    let identity = identity_from_headers(&headers)?;
    let sessions = st.store.list_sessions(&identity).await?;
    Ok(Json(sessions))
}

async fn get_session(
    State(st): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let identity = identity_from_headers(&headers)?;
    let session = st.store.get_session(&SessionId(id), &identity).await?;
    Ok(Json(session))
}

/// Extract the caller identity installed by the auth layer
fn identity_from_headers(headers: &HeaderMap) -> Result<Identity, ApiError> {
    let value = headers
        .get(IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Validation("identity header missing".to_string()))?;
    Ok(Identity(value.to_string()))
}
