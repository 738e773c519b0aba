//! Firebase identity provider adapter.
//!
//! Verifies Firebase ID tokens (RS256) against Google's published signing
//! keys and talks to the Identity Toolkit REST API for user lookup/deletion.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use reqwest::Client;
use reqwest::header::{CACHE_CONTROL, HeaderMap};
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::AuthError;
use super::provider::IdentityProvider;
use super::service_account::{AccessTokenSource, AdminCredentials};
use crate::models::auth::ExternalIdentity;

/// Google's JWK set for Firebase ID token signing keys.
const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Identity Toolkit REST base.
const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Key set lifetime when the response carries no usable `Cache-Control`.
const DEFAULT_JWKS_MAX_AGE: Duration = Duration::from_secs(3600);

/// Outbound request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Firebase project settings.
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    /// Project id; the expected `aud` and the suffix of the expected `iss`.
    pub project_id: String,
    /// Credentials for Identity Toolkit admin calls.
    pub admin: AdminCredentials,
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
    max_age: Duration,
}

impl CachedKeys {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < self.max_age
    }
}

/// ID token claims we read.
#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    exp: i64,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email_verified: bool,
}

/// Real identity provider backed by Firebase Authentication.
pub struct FirebaseIdentityProvider {
    client: Client,
    project_id: String,
    admin: AccessTokenSource,
    keys: RwLock<Option<CachedKeys>>,
}

impl FirebaseIdentityProvider {
    pub fn new(config: FirebaseConfig) -> Result<Self, AuthError> {
        if config.project_id.trim().is_empty() {
            return Err(AuthError::ProviderError(
                "FIREBASE_PROJECT_ID is not configured".into(),
            ));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AuthError::ProviderError(format!("http client: {e}")))?;
        let admin = AccessTokenSource::new(config.admin)?;
        if !admin.is_configured() {
            warn!("no Firebase admin credentials; firebase-login and register will fail");
        }
        info!(project_id = %config.project_id, "firebase identity provider configured");
        Ok(Self {
            client,
            project_id: config.project_id,
            admin,
            keys: RwLock::new(None),
        })
    }

    fn issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.project_id)
    }

    /// Find the signing key for `kid`, refreshing the key set when stale or
    /// when the key is unknown (Google rotates keys).
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let cached = self.keys.read().await;
            if let Some(cached) = cached.as_ref()
                && cached.is_fresh()
                && let Some(jwk) = cached.keys.find(kid)
            {
                return DecodingKey::from_jwk(jwk)
                    .map_err(|e| AuthError::ProviderError(format!("bad signing key: {e}")));
            }
        }

        let fresh = self.fetch_keys().await?;
        let key = match fresh.keys.find(kid) {
            Some(jwk) => DecodingKey::from_jwk(jwk)
                .map_err(|e| AuthError::ProviderError(format!("bad signing key: {e}")))?,
            None => return Err(AuthError::InvalidToken(format!("unknown key id '{kid}'"))),
        };
        *self.keys.write().await = Some(fresh);
        Ok(key)
    }

    async fn fetch_keys(&self) -> Result<CachedKeys, AuthError> {
        let resp = self
            .client
            .get(JWKS_URL)
            .send()
            .await
            .map_err(|e| AuthError::ProviderError(format!("fetch signing keys: {e}")))?;
        if !resp.status().is_success() {
            return Err(AuthError::ProviderError(format!(
                "fetch signing keys: HTTP {}",
                resp.status()
            )));
        }
        let max_age = cache_max_age(resp.headers()).unwrap_or(DEFAULT_JWKS_MAX_AGE);
        let keys = resp
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::ProviderError(format!("parse signing keys: {e}")))?;
        debug!(count = keys.keys.len(), ?max_age, "refreshed firebase signing keys");
        Ok(CachedKeys {
            keys,
            fetched_at: Instant::now(),
            max_age,
        })
    }

    async fn admin_post(
        &self,
        action: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, AuthError> {
        let url = format!(
            "{IDENTITY_TOOLKIT_URL}/projects/{}/accounts:{action}",
            self.project_id
        );
        let resp = self
            .client
            .post(url)
            .bearer_auth(self.admin.token(&self.client).await?)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::ProviderError(format!("accounts:{action}: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            if text.contains("USER_NOT_FOUND") {
                return Err(AuthError::NotFound("provider user".into()));
            }
            warn!(%status, action, "identity toolkit call failed");
            return Err(AuthError::ProviderError(format!(
                "accounts:{action}: HTTP {status}"
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    async fn verify(&self, token: &str) -> Result<ExternalIdentity, AuthError> {
        let header =
            decode_header(token).map_err(|e| AuthError::InvalidToken(format!("header: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidToken(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("missing key id".into()))?;
        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[self.issuer()]);
        validation.set_required_spec_claims(&["exp", "sub", "aud", "iss"]);

        let claims = decode::<FirebaseClaims>(token, &key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?
            .claims;
        if claims.sub.is_empty() {
            return Err(AuthError::InvalidToken("empty subject".into()));
        }

        Ok(ExternalIdentity {
            subject: claims.sub,
            email: claims.email,
            display_name: claims.name,
            email_verified: claims.email_verified.unwrap_or(false),
            expires_at: Some(claims.exp),
        })
    }

    async fn fetch_identity(&self, subject: &str) -> Result<ExternalIdentity, AuthError> {
        let resp = self
            .admin_post("lookup", serde_json::json!({ "localId": [subject] }))
            .await?;
        let body = resp
            .json::<LookupResponse>()
            .await
            .map_err(|e| AuthError::ProviderError(format!("accounts:lookup parse: {e}")))?;
        let user = body
            .users
            .into_iter()
            .find(|u| u.local_id == subject)
            .ok_or_else(|| AuthError::NotFound(format!("provider user {subject}")))?;
        Ok(ExternalIdentity {
            subject: user.local_id,
            email: user.email,
            display_name: user.display_name,
            email_verified: user.email_verified,
            expires_at: None,
        })
    }

    async fn delete_identity(&self, subject: &str) -> Result<(), AuthError> {
        self.admin_post("delete", serde_json::json!({ "localId": subject }))
            .await?;
        Ok(())
    }
}

/// Parse `max-age` out of a `Cache-Control` header.
fn cache_max_age(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(CACHE_CONTROL)?.to_str().ok()?;
    value
        .split(',')
        .filter_map(|d| d.trim().strip_prefix("max-age="))
        .find_map(|secs| secs.parse::<u64>().ok())
        .map(Duration::from_secs)
}
