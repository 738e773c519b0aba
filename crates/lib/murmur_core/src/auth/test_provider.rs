//! Deterministic identity provider for tests and local development.
//!
//! Tokens are base64-encoded JSON claims (`{"sub": ..., "email": ...}`), so a
//! test can mint any identity without signing keys.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};

use super::AuthError;
use super::provider::IdentityProvider;
use crate::models::auth::ExternalIdentity;

/// Lifetime given to tokens minted without an explicit `exp`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Claims carried by a self-describing test token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl TestClaims {
    pub fn new(sub: &str) -> Self {
        Self {
            sub: sub.to_string(),
            ..Self::default()
        }
    }

    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn verified(mut self) -> Self {
        self.email_verified = true;
        self
    }

    pub fn expires_at(mut self, exp: i64) -> Self {
        self.exp = Some(exp);
        self
    }

    /// Encode as a cookie-safe token string.
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    fn into_identity(self) -> ExternalIdentity {
        ExternalIdentity {
            subject: self.sub,
            email: self.email,
            display_name: self.name,
            email_verified: self.email_verified,
            expires_at: self.exp,
        }
    }
}

/// Identity provider double. Counts verifications and records deletions.
#[derive(Debug, Default)]
pub struct TestIdentityProvider {
    verify_calls: AtomicUsize,
    users: DashMap<String, ExternalIdentity>,
    deleted: DashSet<String>,
}

impl TestIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider-side user record for `fetch_identity`.
    pub fn register_user(&self, identity: ExternalIdentity) {
        self.users.insert(identity.subject.clone(), identity);
    }

    /// Number of `verify` calls so far.
    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn was_deleted(&self, subject: &str) -> bool {
        self.deleted.contains(subject)
    }

    fn decode(token: &str) -> Option<TestClaims> {
        let token = token.trim();
        let bytes = [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD]
            .iter()
            .find_map(|engine| engine.decode(token).ok())?;
        serde_json::from_slice::<TestClaims>(&bytes).ok()
    }
}

#[async_trait]
impl IdentityProvider for TestIdentityProvider {
    async fn verify(&self, token: &str) -> Result<ExternalIdentity, AuthError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);

        let mut claims = Self::decode(token)
            .filter(|c| !c.sub.is_empty())
            .ok_or_else(|| AuthError::InvalidToken("malformed test token".into()))?;

        let now = Utc::now().timestamp();
        let exp = *claims.exp.get_or_insert(now + DEFAULT_TOKEN_LIFETIME_SECS);
        if exp <= now {
            return Err(AuthError::InvalidToken("token expired".into()));
        }

        let identity = claims.into_identity();
        self.users
            .entry(identity.subject.clone())
            .or_insert_with(|| ExternalIdentity {
                expires_at: None,
                ..identity.clone()
            });
        Ok(identity)
    }

    async fn fetch_identity(&self, subject: &str) -> Result<ExternalIdentity, AuthError> {
        self.users
            .get(subject)
            .map(|u| u.clone())
            .ok_or_else(|| AuthError::NotFound(format!("provider user {subject}")))
    }

    async fn delete_identity(&self, subject: &str) -> Result<(), AuthError> {
        self.users.remove(subject);
        self.deleted.insert(subject.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn verify_decodes_claims() {
        let provider = TestIdentityProvider::new();
        let token = TestClaims::new("uid-1").email("a@example.com").name("Alice").verified().encode();

        let identity = provider.verify(&token).await.expect("verify");
        assert_eq!(identity.subject, "uid-1");
        assert_eq!(identity.email.as_deref(), Some("a@example.com"));
        assert_eq!(identity.display_name.as_deref(), Some("Alice"));
        assert!(identity.email_verified);
        assert!(identity.expires_at.is_some());
        assert_eq!(provider.verify_calls(), 1);
    }

    #[tokio::test]
    async fn verify_accepts_standard_padded_tokens() {
        let provider = TestIdentityProvider::new();
        let json = serde_json::to_vec(&TestClaims::new("uid-2")).unwrap();
        let token = STANDARD.encode(json);
        assert_eq!(provider.verify(&token).await.unwrap().subject, "uid-2");
    }

    #[tokio::test]
    async fn verify_rejects_garbage_and_expired_tokens() {
        let provider = TestIdentityProvider::new();
        assert!(matches!(
            provider.verify("%%%").await,
            Err(AuthError::InvalidToken(_))
        ));
        let expired = TestClaims::new("uid-3").expires_at(Utc::now().timestamp() - 10).encode();
        assert!(matches!(
            provider.verify(&expired).await,
            Err(AuthError::InvalidToken(_))
        ));
        assert_eq!(provider.verify_calls(), 2);
    }

    #[tokio::test]
    async fn fetch_after_verify_and_delete() {
        let provider = TestIdentityProvider::new();
        assert!(matches!(
            provider.fetch_identity("uid-4").await,
            Err(AuthError::NotFound(_))
        ));

        let token = TestClaims::new("uid-4").email("d@example.com").encode();
        provider.verify(&token).await.unwrap();
        let fetched = provider.fetch_identity("uid-4").await.unwrap();
        assert_eq!(fetched.email.as_deref(), Some("d@example.com"));
        assert_eq!(fetched.expires_at, None);

        provider.delete_identity("uid-4").await.unwrap();
        assert!(provider.was_deleted("uid-4"));
        assert!(provider.fetch_identity("uid-4").await.is_err());
    }
}
