//! Error types for the intake pipeline.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// One failing field in a validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Structured validation failure. Lists every failing field, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", describe_fields(.fields))]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    /// A validation error for a single field.
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        Self {
            fields: vec![FieldError::new(field, message)],
        }
    }

    /// Collects field errors; returns `Ok(())` when none were pushed.
    pub fn check(fields: Vec<FieldError>) -> Result<(), Self> {
        if fields.is_empty() {
            Ok(())
        } else {
            Err(Self { fields })
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }
}

fn describe_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while turning an inbound event into a stored message.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Invalid submission: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Unparseable payload item: {0}")]
    Parse(String),

    #[error("Failed to persist message: {0}")]
    Store(#[from] DatabaseError),
}

/// Errors surfaced by the admin query surface.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid request: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Store unavailable: {0}")]
    Store(#[from] DatabaseError),
}

impl AdminError {
    pub fn message_not_found(id: &str) -> Self {
        Self::NotFound {
            entity: "message",
            id: id.to_string(),
        }
    }

    pub fn conversation_not_found(id: &str) -> Self {
        Self::NotFound {
            entity: "conversation",
            id: id.to_string(),
        }
    }
}

// ── HTTP mapping ────────────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a [FieldError]>,
}

fn error_response(status: StatusCode, kind: &str, message: String, fields: Option<&[FieldError]>) -> Response {
    let body = ErrorBody {
        error: kind,
        message,
        fields,
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        error_response(
            StatusCode::BAD_REQUEST,
            "validation_failed",
            self.to_string(),
            Some(&self.fields),
        )
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound { .. } => {
                error_response(StatusCode::NOT_FOUND, "not_found", self.to_string(), None)
            }
            Self::Invalid(e) => e.into_response(),
            Self::Store(e) => {
                tracing::error!(error = %e, "Store unavailable");
                error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "store_unavailable",
                    e.to_string(),
                    None,
                )
            }
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        match self {
            Self::Invalid(e) => e.into_response(),
            Self::Parse(reason) => error_response(
                StatusCode::BAD_REQUEST,
                "invalid_payload",
                reason,
                None,
            ),
            Self::Store(e) => AdminError::Store(e).into_response(),
        }
    }
}
