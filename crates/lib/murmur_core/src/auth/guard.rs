//! Per-request session guard.
//!
//! ```text
//! no token            -> Unauthenticated(MissingToken)
//! token -> revoked?   -> Unauthenticated(Blacklisted)
//!       -> verify     -> Unauthenticated(InvalidToken | ProviderUnavailable)
//!       -> reconcile  -> Unauthenticated(NoEmail | IdentityConflict | Internal)
//!                     -> Authenticated(session)
//! ```
//!
//! The revocation check always runs first and never goes through the
//! verification cache.

use std::sync::Arc;

use tracing::{debug, warn};

use super::AuthError;
use super::cache::TokenVerificationCache;
use super::reconcile::UserReconciler;
use super::revocation::RevocationRegistry;
use crate::models::auth::{ExternalIdentity, LocalUser};

/// Why a request ended up unauthenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    MissingToken,
    Blacklisted,
    InvalidToken(String),
    NoEmail,
    /// The identity maps onto a local user already linked elsewhere.
    IdentityConflict,
    /// Identity provider unreachable or misbehaving.
    ProviderUnavailable,
    /// Local storage failure while reconciling.
    Internal,
}

impl Rejection {
    /// HTTP status for this rejection.
    pub fn status_code(&self) -> u16 {
        match self {
            Rejection::NoEmail => 422,
            Rejection::IdentityConflict => 409,
            Rejection::Internal => 500,
            _ => 401,
        }
    }

    /// Stable machine-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::MissingToken => "missing_token",
            Rejection::Blacklisted => "blacklisted",
            Rejection::InvalidToken(_) => "invalid_token",
            Rejection::NoEmail => "no_email",
            Rejection::IdentityConflict => "identity_conflict",
            Rejection::ProviderUnavailable => "provider_unavailable",
            Rejection::Internal => "internal_error",
        }
    }

    /// Client-safe message. Provider internals are not exposed.
    pub fn message(&self) -> String {
        match self {
            Rejection::MissingToken => "Authentication required".into(),
            Rejection::Blacklisted => "Session has been revoked (logged out)".into(),
            Rejection::InvalidToken(_) => "Invalid or expired token".into(),
            Rejection::NoEmail => AuthError::NoEmail.to_string(),
            Rejection::IdentityConflict => {
                "This account is linked to a different local user".into()
            }
            Rejection::ProviderUnavailable => "Token verification failed".into(),
            Rejection::Internal => "Internal server error".into(),
        }
    }
}

impl From<AuthError> for Rejection {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidToken(reason) => Rejection::InvalidToken(reason),
            AuthError::Blacklisted => Rejection::Blacklisted,
            AuthError::NoEmail => Rejection::NoEmail,
            AuthError::IdentityConflict(_) => Rejection::IdentityConflict,
            AuthError::ProviderError(_) | AuthError::NotFound(_) => Rejection::ProviderUnavailable,
            AuthError::Validation(_) | AuthError::StorageError(_) | AuthError::Db(_) => {
                Rejection::Internal
            }
        }
    }
}

/// Authenticated request context.
#[derive(Debug, Clone)]
pub struct Session {
    /// Raw session token, as presented.
    pub token: String,
    pub identity: ExternalIdentity,
    pub user: LocalUser,
}

/// Terminal state of the guard.
#[derive(Debug)]
pub enum AuthOutcome {
    Authenticated(Box<Session>),
    Unauthenticated(Rejection),
}

impl AuthOutcome {
    /// Anonymous-on-failure view used by optional guards.
    pub fn into_session(self) -> Option<Session> {
        match self {
            AuthOutcome::Authenticated(session) => Some(*session),
            AuthOutcome::Unauthenticated(_) => None,
        }
    }
}

/// Composes revocation, verification and reconciliation.
pub struct SessionGuard {
    revocations: Arc<RevocationRegistry>,
    verifier: Arc<TokenVerificationCache>,
    reconciler: Arc<UserReconciler>,
}

impl SessionGuard {
    pub fn new(
        revocations: Arc<RevocationRegistry>,
        verifier: Arc<TokenVerificationCache>,
        reconciler: Arc<UserReconciler>,
    ) -> Self {
        Self {
            revocations,
            verifier,
            reconciler,
        }
    }

    /// Revocation check plus verification, without touching local users.
    pub async fn verify(&self, token: Option<&str>) -> Result<ExternalIdentity, Rejection> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(Rejection::MissingToken)?;

        if self.revocations.is_revoked(token).await {
            debug!("rejecting revoked token");
            return Err(Rejection::Blacklisted);
        }

        self.verifier.resolve(token).await.map_err(|e| {
            match &e {
                AuthError::InvalidToken(reason) => debug!(reason = %reason, "token rejected"),
                other => warn!(error = %other, "token verification failed"),
            }
            Rejection::from(e)
        })
    }

    /// Full guard: verification followed by reconciliation.
    pub async fn authenticate(&self, token: Option<&str>) -> AuthOutcome {
        let identity = match self.verify(token).await {
            Ok(identity) => identity,
            Err(rejection) => return AuthOutcome::Unauthenticated(rejection),
        };

        match self.reconciler.reconcile(&identity).await {
            Ok(reconciled) => AuthOutcome::Authenticated(Box::new(Session {
                token: token.map(str::trim).unwrap_or_default().to_string(),
                identity,
                user: reconciled.user,
            })),
            Err(e) => {
                warn!(subject = %identity.subject, error = %e, "reconciliation failed");
                AuthOutcome::Unauthenticated(Rejection::from(e))
            }
        }
    }
}
