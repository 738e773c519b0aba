//! Identity provider boundary.
//!
//! Every outbound call to the external identity provider goes through
//! [`IdentityProvider`], so the rest of the system can run against
//! [`TestIdentityProvider`](super::test_provider::TestIdentityProvider).

use std::str::FromStr;

use async_trait::async_trait;
use tracing::{error, info};

use super::AuthError;
use crate::models::auth::ExternalIdentity;

/// External identity provider operations.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a bearer token. Fails with `InvalidToken` for malformed, expired
    /// or badly signed tokens and `ProviderError` for infrastructure faults.
    async fn verify(&self, token: &str) -> Result<ExternalIdentity, AuthError>;

    /// Fetch the provider's user record. Fails with `NotFound`.
    async fn fetch_identity(&self, subject: &str) -> Result<ExternalIdentity, AuthError>;

    /// Delete the provider's user record.
    async fn delete_identity(&self, subject: &str) -> Result<(), AuthError>;
}

/// Which provider implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Firebase,
    /// Deterministic double decoding self-describing tokens.
    Test,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firebase" => Ok(Self::Firebase),
            "test" => Ok(Self::Test),
            other => Err(format!("unknown identity provider '{other}'")),
        }
    }
}

/// Delete an orphaned external identity, logging instead of failing.
pub async fn delete_identity_best_effort(provider: &dyn IdentityProvider, subject: &str) {
    match provider.delete_identity(subject).await {
        Ok(()) => info!(subject, "deleted orphaned external identity"),
        Err(e) => error!(subject, error = %e, "failed to delete external identity"),
    }
}
