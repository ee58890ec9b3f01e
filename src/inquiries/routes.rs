//! HTTP surface: intake endpoints plus the admin API.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::channels::form::FormSubmission;
use crate::error::{AdminError, IngestError, ValidationError};
use crate::inquiries::query::{AdminService, ConversationQuery, ListQuery};
use crate::pipeline::processor::IntakeProcessor;
use crate::store::MessageStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<IntakeProcessor>,
    pub admin: Arc<AdminService>,
}

impl AppState {
    /// Wire both services onto one store.
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            processor: Arc::new(IntakeProcessor::new(store.clone())),
            admin: Arc::new(AdminService::new(store)),
        }
    }
}

/// Build the Axum router with intake and admin routes.
pub fn intake_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/contact", post(submit_form))
        .route("/api/webhooks/inbound-email", post(inbound_email))
        .route("/api/messages", get(list_messages).delete(delete_messages))
        .route("/api/messages/{id}", get(get_message).delete(delete_message))
        .route("/api/messages/{id}/read", post(mark_read))
        .route("/api/conversations", get(list_conversations))
        .route("/api/conversations/{id}", get(conversation_detail))
        .with_state(state)
}

/// CORS policy from configured origins. Empty or `*` allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

fn payload_error(rejection: JsonRejection) -> IngestError {
    IngestError::Parse(rejection.body_text())
}

// ── Health ──────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "inquiry-intake",
        "store": state.admin.store().backend(),
    }))
}

// ── Intake ──────────────────────────────────────────────────────────

async fn submit_form(
    State(state): State<AppState>,
    body: Result<Json<FormSubmission>, JsonRejection>,
) -> Result<impl IntoResponse, IngestError> {
    let Json(form) = body.map_err(payload_error)?;
    let accepted = state.processor.ingest_form(form).await?;
    Ok((StatusCode::CREATED, Json(accepted)))
}

async fn inbound_email(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, IngestError> {
    let Json(payload) = body.map_err(payload_error)?;
    let report = state.processor.ingest_webhook(&payload).await?;
    Ok(Json(report))
}

// ── Messages ────────────────────────────────────────────────────────

async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AdminError> {
    Ok(Json(state.admin.list_messages(&query).await?))
}

async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AdminError> {
    Ok(Json(state.admin.get_message(&id).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadRequest {
    is_read: Option<bool>,
}

/// Body is optional; an empty body marks the message read.
async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AdminError> {
    let read = if body.iter().all(u8::is_ascii_whitespace) {
        true
    } else {
        serde_json::from_slice::<ReadRequest>(&body)
            .map_err(|e| ValidationError::single("body", e.to_string()))?
            .is_read
            .unwrap_or(true)
    };
    Ok(Json(state.admin.mark_read(&id, read).await?))
}

async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AdminError> {
    state.admin.delete_one(&id).await?;
    Ok(Json(json!({ "deleted": 1, "id": id })))
}

#[derive(Deserialize)]
struct DeleteRequest {
    id: Option<String>,
    ids: Option<Vec<String>>,
}

async fn delete_messages(
    State(state): State<AppState>,
    body: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AdminError> {
    let Json(request) =
        body.map_err(|e| ValidationError::single("body", e.body_text()))?;
    let ids: Vec<String> = request
        .ids
        .unwrap_or_default()
        .into_iter()
        .chain(request.id)
        .collect();
    let deleted = state.admin.delete_many(&ids).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

// ── Conversations ───────────────────────────────────────────────────

async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ConversationQuery>,
) -> Result<impl IntoResponse, AdminError> {
    Ok(Json(state.admin.list_conversations(&query).await?))
}

async fn conversation_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AdminError> {
    Ok(Json(state.admin.conversation_detail(&id).await?))
}
