//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API wire models
//! (which carry `#[serde(rename)]` for the client's field names).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity record issued by the external identity provider.
///
/// Read-only from this system's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    /// Stable provider-side user id (JWT `sub`).
    pub subject: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub email_verified: bool,
    /// Token expiry (unix seconds). `None` for records fetched by subject
    /// rather than decoded from a token.
    pub expires_at: Option<i64>,
}

impl ExternalIdentity {
    /// Overlay profile fields from a provider user record onto a verified
    /// token identity. The token's subject and expiry are kept.
    pub fn with_profile(mut self, profile: ExternalIdentity) -> Self {
        if profile.email.is_some() {
            self.email = profile.email;
        }
        if profile.display_name.is_some() {
            self.display_name = profile.display_name;
        }
        self.email_verified = self.email_verified || profile.email_verified;
        self
    }
}

/// Local user row, one per external subject and one per email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    pub id: i64,
    pub external_subject: String,
    pub display_name: String,
    pub email: String,
    pub email_verified_at: Option<DateTime<Utc>>,
}

/// Fields for inserting a new local user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub external_subject: String,
    pub display_name: String,
    pub email: String,
    pub email_verified_at: Option<DateTime<Utc>>,
}

/// Revoked-token entry. Never holds the raw token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationRecord {
    /// SHA-256 hex digest of the raw token.
    pub fingerprint: String,
    pub revoked_at: DateTime<Utc>,
    /// Mirrors the token's own expiry; the record is void afterwards.
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(email: Option<&str>, name: Option<&str>) -> ExternalIdentity {
        ExternalIdentity {
            subject: "uid-1".into(),
            email: email.map(str::to_string),
            display_name: name.map(str::to_string),
            email_verified: false,
            expires_at: Some(1_900_000_000),
        }
    }

    #[test]
    fn with_profile_prefers_profile_fields() {
        let token = identity(None, None);
        let profile = ExternalIdentity {
            subject: "uid-1".into(),
            email: Some("a@example.com".into()),
            display_name: Some("Alice".into()),
            email_verified: true,
            expires_at: None,
        };
        let merged = token.with_profile(profile);
        assert_eq!(merged.email.as_deref(), Some("a@example.com"));
        assert_eq!(merged.display_name.as_deref(), Some("Alice"));
        assert!(merged.email_verified);
        assert_eq!(merged.expires_at, Some(1_900_000_000));
    }

    #[test]
    fn with_profile_keeps_token_fields_when_profile_is_sparse() {
        let token = identity(Some("t@example.com"), Some("Token Name"));
        let merged = token.with_profile(identity(None, None));
        assert_eq!(merged.email.as_deref(), Some("t@example.com"));
        assert_eq!(merged.display_name.as_deref(), Some("Token Name"));
    }
}
