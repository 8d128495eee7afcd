use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{error::DbErr, SqlErr};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Conflict",
    "message": "Invalid state transition: fee period 550e8400-e29b-41d4-a716-446655440000 is OPEN, expected DRAFT",
    "details": null,
    "request_id": "req-abc123xyz",
    "timestamp": "2025-12-01T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    #[schema(example = "Conflict")]
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "req-abc123xyz")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[serde(skip)] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A lifecycle guard rejected the operation (generate on non-DRAFT, pay on PAID, ...)
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(Uuid),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Hash error: {0}")]
    HashError(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<DbErr> for ServiceError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                ServiceError::Conflict(format!("Duplicate record: {}", detail))
            }
            _ => ServiceError::DatabaseError(err),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Wraps a database error, keeping unique violations distinguishable.
    pub fn db_error(error: DbErr) -> Self {
        error.into()
    }

    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} {} not found", entity, id))
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidInput(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidTransition(_)
            | Self::Conflict(_)
            | Self::ConcurrentModification(_) => StatusCode::CONFLICT,
            Self::AuthError(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::HashError(_)
            | Self::EventError(_)
            | Self::InternalError(_)
            | Self::MigrationError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::HashError(_)
            | Self::EventError(_)
            | Self::InternalError(_)
            | Self::MigrationError(_)
            | Self::Other(_) => "Internal server error".to_string(),
            Self::ConcurrentModification(id) => format!(
                "Concurrent modification for ID {}; reload and retry",
                id
            ),
            _ => self.to_string(),
        }
    }

    /// Machine-readable error kind, used in the `details` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationError(_) | Self::InvalidInput(_) | Self::BadRequest(_) => "validation",
            Self::InvalidTransition(_) => "invalid_state_transition",
            Self::Conflict(_) => "conflict",
            Self::ConcurrentModification(_) => "concurrent_modification",
            Self::NotFound(_) => "not_found",
            Self::AuthError(_) | Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            _ => "internal",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: Some(self.kind().to_string()),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use rstest::rstest;

    #[tokio::test]
    async fn service_error_response_includes_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::NotFound("missing".into()).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
        assert_eq!(payload.details.as_deref(), Some("not_found"));
    }

    #[rstest]
    #[case(ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND)]
    #[case(ServiceError::ValidationError("x".into()), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::InvalidTransition("x".into()), StatusCode::CONFLICT)]
    #[case(ServiceError::Conflict("x".into()), StatusCode::CONFLICT)]
    #[case(ServiceError::ConcurrentModification(Uuid::nil()), StatusCode::CONFLICT)]
    #[case(ServiceError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED)]
    #[case(ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN)]
    #[case(ServiceError::HashError("x".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn status_code_mapping(#[case] err: ServiceError, #[case] expected: StatusCode) {
        assert_eq!(err.status_code(), expected);
    }

    #[test]
    fn state_guard_errors_are_distinct_from_validation() {
        let guard = ServiceError::InvalidTransition("period is CLOSED".into());
        let validation = ServiceError::ValidationError("name is required".into());
        assert_ne!(guard.kind(), validation.kind());
        assert_ne!(guard.status_code(), validation.status_code());
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::HashError("argon2 params".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("secret".into())).response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::NotFound("Household not found".into()).response_message(),
            "Not found: Household not found"
        );
    }

    #[test]
    fn custom_db_errors_stay_database_errors() {
        let err: ServiceError = DbErr::Custom("boom".into()).into();
        assert!(matches!(err, ServiceError::DatabaseError(_)));
    }
}
