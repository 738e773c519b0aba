//! Session guards: read the `auth_jwt` cookie (or a Bearer header), run the
//! session guard and attach the outcome to request extensions.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use murmur_core::auth::guard::{AuthOutcome, Session};
use tracing::debug;

use crate::AppState;
use crate::error::AppError;
use crate::services::cookies::read_session_token;

/// Session attached by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Session);

/// Session attached by [`optional_auth`]; `None` for anonymous viewers.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<Session>);

/// Token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Session cookie first, Bearer header as a fallback.
fn request_token(headers: &HeaderMap) -> Option<String> {
    read_session_token(&CookieJar::from_headers(headers)).or_else(|| bearer_token(headers))
}

/// Rejects the request unless the session guard authenticates it.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request_token(request.headers());

    match state.auth.guard.authenticate(token.as_deref()).await {
        AuthOutcome::Authenticated(session) => {
            request.extensions_mut().insert(AuthenticatedUser(*session));
            Ok(next.run(request).await)
        }
        AuthOutcome::Unauthenticated(rejection) => {
            debug!(reason = rejection.reason(), path = %request.uri().path(), "request rejected");
            Err(AppError::from(rejection))
        }
    }
}

/// Never rejects; failures proceed as anonymous.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request_token(request.headers());

    let session = match token {
        Some(token) => match state.auth.guard.authenticate(Some(&token)).await {
            AuthOutcome::Authenticated(session) => Some(*session),
            AuthOutcome::Unauthenticated(rejection) => {
                debug!(reason = rejection.reason(), "continuing as anonymous");
                None
            }
        },
        None => None,
    };

    request.extensions_mut().insert(Viewer(session));
    next.run(request).await
}
