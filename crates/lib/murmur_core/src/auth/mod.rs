//! Authentication and session logic.
//!
//! Identity provider access, verification caching, token revocation, user
//! reconciliation and the session guard that composes them. Shared by
//! `murmur_api` and the server binary.

pub mod cache;
pub mod firebase;
pub mod guard;
pub mod provider;
pub mod reconcile;
pub mod registration;
pub mod revocation;
pub mod service_account;
pub mod test_provider;
pub mod users;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed, expired or badly signed token. Never retried.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token was explicitly revoked (logout).
    #[error("Token has been revoked")]
    Blacklisted,

    /// External identity has no email; the local schema requires one.
    #[error("Identity provider user has no email; cannot sync with the local user schema")]
    NoEmail,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// The external subject or email already belongs to a different local user.
    #[error("Identity conflict: {0}")]
    IdentityConflict(String),

    /// Infrastructure failure talking to the identity provider.
    #[error("Identity provider error: {0}")]
    ProviderError(String),

    /// Revocation or user storage backend unavailable.
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// SHA-256 hex fingerprint of a raw token.
///
/// Used wherever a token must be keyed or logged without keeping the bearer
/// secret itself.
pub fn token_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Short fingerprint prefix for log lines.
pub fn fingerprint_prefix(token: &str) -> String {
    token_fingerprint(token)[..8].to_string()
}

/// Read the `exp` claim of a JWT without verifying its signature.
///
/// Only used to size revocation TTLs; never for trust decisions.
pub fn token_expiry(token: &str) -> Option<i64> {
    let mut parts = token.split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp").and_then(serde_json::Value::as_i64)
}
