//! Application error types.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use murmur_core::auth::AuthError;
use murmur_core::auth::guard::Rejection;
use murmur_core::content::ContentError;
use thiserror::Error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m.as_str()),
            AppError::Unprocessable(m) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable", m.as_str())
            }
            AppError::Internal(m) => {
                tracing::error!(error = %m, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("row not found".into()),
            _ => AppError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidToken(_) => AppError::Unauthorized("Invalid or expired token".into()),
            AuthError::Blacklisted => {
                AppError::Unauthorized("Session has been revoked (logged out)".into())
            }
            e @ AuthError::NoEmail => AppError::Unprocessable(e.to_string()),
            AuthError::NotFound(msg) => AppError::NotFound(msg),
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::IdentityConflict(msg) => AppError::Conflict(msg),
            AuthError::ProviderError(msg) | AuthError::StorageError(msg) => AppError::Internal(msg),
            AuthError::Db(e) => AppError::from(e),
        }
    }
}

impl From<Rejection> for AppError {
    fn from(r: Rejection) -> Self {
        match r {
            Rejection::NoEmail => AppError::Unprocessable(r.message()),
            Rejection::IdentityConflict => AppError::Conflict(r.message()),
            Rejection::Internal => AppError::Internal("session reconciliation failed".into()),
            _ => AppError::Unauthorized(r.message()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<ContentError> for AppError {
    fn from(e: ContentError) -> Self {
        match e {
            ContentError::NotFound => AppError::NotFound(e.to_string()),
            ContentError::Forbidden => AppError::Forbidden(e.to_string()),
            ContentError::Db(e) => AppError::from(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_statuses() {
        let status = |r: Rejection| AppError::from(r).into_response().status();
        assert_eq!(status(Rejection::MissingToken), StatusCode::UNAUTHORIZED);
        assert_eq!(status(Rejection::Blacklisted), StatusCode::UNAUTHORIZED);
        assert_eq!(status(Rejection::ProviderUnavailable), StatusCode::UNAUTHORIZED);
        assert_eq!(status(Rejection::NoEmail), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status(Rejection::Internal), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status(Rejection::IdentityConflict), StatusCode::CONFLICT);
    }

    #[test]
    fn content_errors_map_to_statuses() {
        assert_eq!(
            AppError::from(ContentError::NotFound).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(ContentError::Forbidden).into_response().status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn auth_errors_map_to_statuses() {
        assert_eq!(
            AppError::from(AuthError::NoEmail).into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::from(AuthError::Validation("dup".into())).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(AuthError::StorageError("down".into())).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(AuthError::IdentityConflict("s1".into())).into_response().status(),
            StatusCode::CONFLICT
        );
    }
}
