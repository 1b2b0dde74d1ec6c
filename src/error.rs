use actix_web::{error, http::StatusCode, HttpResponse};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::services::StoreError;

/// Failures surfaced by the match, discovery, messaging and profile operations
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    SelfAction(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    DuplicateAction(String),

    #[error("{0}")]
    AccessDenied(String),

    #[error("{0}")]
    InactiveMatch(String),

    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl AppError {
    /// Stable machine-readable kind reported to clients
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::SelfAction(_) => "self_action",
            AppError::NotFound(_) => "not_found",
            AppError::DuplicateAction(_) => "duplicate_action",
            AppError::AccessDenied(_) => "access_denied",
            AppError::InactiveMatch(_) => "inactive_match",
            AppError::Validation(_) => "validation_error",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Persistence(_) => "persistence_error",
        }
    }

    pub fn user_not_found(id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("User {} not found", id))
    }

    pub fn match_not_found(id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("Match {} not found", id))
    }

    pub fn match_access_denied() -> Self {
        AppError::AccessDenied("Access denied to this match".to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl error::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::SelfAction(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateAction(_) | AppError::InactiveMatch(_) => StatusCode::CONFLICT,
            AppError::AccessDenied(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if let AppError::Persistence(e) = self {
            tracing::error!("Request failed on persistence: {}", e);
        }
        HttpResponse::build(status).json(ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
        })
    }
}

/// JSON error response for rejected payloads and query strings
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle malformed path segments such as a non-uuid id
pub fn handle_path_error(err: error::PathError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "validation_error".to_string(),
        message: format!("Invalid path: {}", err),
        status_code: 400,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;

    #[test]
    fn test_error_kinds_and_statuses() {
        let cases = [
            (AppError::SelfAction("x".into()), "self_action", 400),
            (AppError::NotFound("x".into()), "not_found", 404),
            (AppError::DuplicateAction("x".into()), "duplicate_action", 409),
            (AppError::AccessDenied("x".into()), "access_denied", 403),
            (AppError::InactiveMatch("x".into()), "inactive_match", 409),
            (AppError::Validation("x".into()), "validation_error", 400),
            (AppError::Unauthorized("x".into()), "unauthorized", 401),
        ];

        for (err, kind, status) in cases {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.status_code().as_u16(), status);
        }
    }

    #[test]
    fn test_persistence_error_is_internal() {
        let err = AppError::from(StoreError::Conflict("pair already matched".into()));
        assert_eq!(err.kind(), "persistence_error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
