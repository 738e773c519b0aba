//! Session and account request handlers.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::WithRejection;
use axum_extra::extract::cookie::CookieJar;
use chrono::DateTime;
use murmur_core::auth::guard::Rejection;
use murmur_core::auth::registration::{self, Registration};
use tracing::{debug, info, warn};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::bearer_token;
use crate::models::{
    AccountResponse, AuthCheckResponse, AuthCheckUser, ErrorResponse, FailureResponse,
    FirebaseLoginResponse, LoginRequest, LogoutResponse, MessageResponse, RegisterRequest,
    SessionUser, TokenCheckResponse, VerifyTokenRequest, VerifyTokenResponse,
};
use crate::services::cookies::{
    LOGIN_SESSION_MAX_AGE_SECS, SYNC_SESSION_MAX_AGE_SECS, read_session_token,
};

/// Longest accepted display name at registration, in characters.
const MAX_NAME_CHARS: usize = 20;

fn status_of(rejection: &Rejection) -> StatusCode {
    StatusCode::from_u16(rejection.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// `POST /api/auth/verify-token`: verify `idToken` and store it as the
/// 7-day session cookie.
pub async fn verify_token_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<VerifyTokenRequest>, JsonRejection>,
) -> Response {
    let token = body
        .ok()
        .and_then(|Json(b)| b.id_token)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    let Some(token) = token else {
        return (
            StatusCode::BAD_REQUEST,
            Json(FailureResponse::new("idToken is required")),
        )
            .into_response();
    };

    match state.auth.guard.verify(Some(&token)).await {
        Ok(identity) => {
            info!(subject = %identity.subject, "session established");
            let cookie = state
                .config
                .cookies
                .session_cookie(&token, LOGIN_SESSION_MAX_AGE_SECS);
            let body = VerifyTokenResponse {
                success: true,
                message: "Authenticated".into(),
                user: SessionUser {
                    uid: identity.subject,
                    email: identity.email,
                },
            };
            (jar.add(cookie), Json(body)).into_response()
        }
        Err(rejection) => {
            debug!(reason = rejection.reason(), "verify-token rejected");
            (
                status_of(&rejection),
                Json(FailureResponse::new(rejection.message())),
            )
                .into_response()
        }
    }
}

/// `GET /api/auth/check`: report whether the session cookie is usable.
pub async fn check_handler(State(state): State<AppState>, jar: CookieJar) -> Response {
    let Some(token) = read_session_token(&jar) else {
        return Json(AuthCheckResponse {
            authenticated: false,
            message: Some("No session cookie".into()),
            ..Default::default()
        })
        .into_response();
    };

    match state.auth.guard.verify(Some(&token)).await {
        Ok(identity) => Json(AuthCheckResponse {
            authenticated: true,
            user: Some(AuthCheckUser {
                uid: identity.subject,
                email: identity.email,
                expires_at: identity
                    .expires_at
                    .and_then(|exp| DateTime::from_timestamp(exp, 0))
                    .map(|t| t.to_rfc3339()),
            }),
            ..Default::default()
        })
        .into_response(),
        Err(rejection) => (
            status_of(&rejection),
            Json(AuthCheckResponse {
                authenticated: false,
                message: Some(rejection.message()),
                error: Some(rejection.reason().into()),
                ..Default::default()
            }),
        )
            .into_response(),
    }
}

/// `POST /api/auth/logout`: revoke the session token and clear the cookie.
///
/// Always succeeds for the caller.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    match read_session_token(&jar) {
        Some(token) => {
            state.auth.logout(&token).await;
        }
        None => debug!("logout without session cookie"),
    }

    let jar = jar.add(state.config.cookies.clear_session_cookie());
    (
        jar,
        Json(LogoutResponse {
            success: true,
            message: "Logged out".into(),
        }),
    )
}

/// `POST /api/auth/check-token`: stateless Bearer check for non-cookie clients.
pub async fn check_token_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "No token provided".into(),
                message: "Authorization: Bearer <token> header is required".into(),
            }),
        )
            .into_response();
    };

    match state.auth.guard.verify(Some(&token)).await {
        Ok(identity) => Json(TokenCheckResponse {
            uid: identity.subject,
            message: "Token is valid".into(),
        })
        .into_response(),
        Err(rejection) => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Invalid token".into(),
                message: rejection.message(),
            }),
        )
            .into_response(),
    }
}

/// `POST /api/auth/firebase-login`: sync the Bearer identity to a local
/// user and set the 24-hour session cookie.
pub async fn firebase_login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse {
                message: "Missing token".into(),
                error: None,
            }),
        )
            .into_response();
    };

    match state.auth.login_sync(&token).await {
        Ok(reconciled) => {
            let cookie = state
                .config
                .cookies
                .session_cookie(&token, SYNC_SESSION_MAX_AGE_SECS);
            let body = FirebaseLoginResponse {
                success: true,
                new_user: reconciled.created,
                user: reconciled.user.into(),
            };
            (jar.add(cookie), Json(body)).into_response()
        }
        Err(Rejection::NoEmail) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(MessageResponse {
                message: Rejection::NoEmail.message(),
                error: None,
            }),
        )
            .into_response(),
        Err(rejection) => {
            let status = match rejection {
                Rejection::Internal | Rejection::IdentityConflict => status_of(&rejection),
                _ => StatusCode::UNAUTHORIZED,
            };
            (
                status,
                Json(MessageResponse {
                    message: "Invalid token".into(),
                    error: Some(rejection.message()),
                }),
            )
                .into_response()
        }
    }
}

fn validate_registration(body: &RegisterRequest) -> Result<Registration, AppError> {
    let subject = body.firebase_uid.trim();
    if subject.is_empty() {
        return Err(AppError::Validation("firebase_uid is required".into()));
    }

    let name = body.name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "name must be between 1 and {MAX_NAME_CHARS} characters"
        )));
    }

    let email = body.email.trim();
    let valid_email = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
                && !domain.ends_with('.') && !domain.contains('@')
        }
        None => false,
    };
    if !valid_email {
        return Err(AppError::Validation("email is not a valid address".into()));
    }

    Ok(Registration {
        subject: subject.to_string(),
        display_name: name.to_string(),
        email: email.to_string(),
    })
}

/// `POST /api/auth/register`: create the local user for a provider account.
pub async fn register_handler(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<RegisterRequest>, AppError>,
) -> AppResult<(StatusCode, Json<AccountResponse>)> {
    let registration = validate_registration(&body)?;
    let user = registration::register(
        state.auth.provider.as_ref(),
        state.auth.users.as_ref(),
        registration,
    )
    .await
    .map_err(|e| {
        warn!(error = %e, "registration rejected");
        AppError::from(e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(AccountResponse {
            success: true,
            message: "Registered".into(),
            user: user.into(),
        }),
    ))
}

/// `POST /api/auth/login`: look up the local user for a provider account.
pub async fn login_handler(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<LoginRequest>, AppError>,
) -> AppResult<Json<AccountResponse>> {
    let user = state
        .auth
        .users
        .find_by_subject(body.firebase_uid.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("No user registered for this account".into()))?;

    Ok(Json(AccountResponse {
        success: true,
        message: "Logged in".into(),
        user: user.into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            firebase_uid: "uid-1".into(),
            name: name.into(),
            email: email.into(),
        }
    }

    #[test]
    fn registration_validation() {
        assert!(validate_registration(&request("Alice", "alice@example.com")).is_ok());
        assert!(validate_registration(&request("", "alice@example.com")).is_err());
        assert!(validate_registration(&request(&"x".repeat(21), "alice@example.com")).is_err());
        assert!(validate_registration(&request(&"é".repeat(20), "alice@example.com")).is_ok());
        assert!(validate_registration(&request("Alice", "alice")).is_err());
        assert!(validate_registration(&request("Alice", "@example.com")).is_err());
        assert!(validate_registration(&request("Alice", "alice@localhost")).is_err());
        assert!(validate_registration(&request("Alice", "a@b@c.com")).is_err());
    }

    #[test]
    fn blank_subject_is_rejected() {
        let mut req = request("Alice", "alice@example.com");
        req.firebase_uid = "  ".into();
        assert!(matches!(
            validate_registration(&req),
            Err(AppError::Validation(_))
        ));
    }
}
