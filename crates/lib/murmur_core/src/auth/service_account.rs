//! OAuth access tokens for Identity Toolkit admin calls.
//!
//! A service-account key signs a short-lived RS256 assertion which is
//! exchanged at the key's `token_uri` for an access token (JWT bearer grant).
//! Minted tokens are cached until shortly before they expire.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::AuthError;

/// Scopes requested for admin calls.
pub const ADMIN_SCOPES: &str =
    "https://www.googleapis.com/auth/cloud-platform https://www.googleapis.com/auth/identitytoolkit";

const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime of the signed assertion; Google caps it at one hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Minted tokens are replaced this long before their stated expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// The fields of a Google service-account JSON key that token minting needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        serde_json::from_str(json)
            .map_err(|e| AuthError::ProviderError(format!("service account key: {e}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            AuthError::ProviderError(format!("read service account key {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }
}

/// How admin calls authenticate.
#[derive(Debug, Clone, Default)]
pub enum AdminCredentials {
    /// No admin access; lookups and deletions fail.
    #[default]
    None,
    /// A pre-minted OAuth access token, used as is.
    Static(String),
    /// A service-account key; tokens are minted and refreshed on demand.
    ServiceAccount(ServiceAccountKey),
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

enum Source {
    Missing,
    Static(String),
    ServiceAccount {
        key: ServiceAccountKey,
        signing_key: EncodingKey,
    },
}

/// Supplies bearer tokens for admin calls.
pub struct AccessTokenSource {
    source: Source,
    cached: Mutex<Option<CachedToken>>,
}

impl AccessTokenSource {
    /// Parses the signing key up front so a broken key fails at startup.
    pub fn new(credentials: AdminCredentials) -> Result<Self, AuthError> {
        let source = match credentials {
            AdminCredentials::None => Source::Missing,
            AdminCredentials::Static(token) if token.trim().is_empty() => Source::Missing,
            AdminCredentials::Static(token) => Source::Static(token),
            AdminCredentials::ServiceAccount(key) => {
                let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
                    .map_err(|e| AuthError::ProviderError(format!("service account key: {e}")))?;
                Source::ServiceAccount { key, signing_key }
            }
        };
        Ok(Self {
            source,
            cached: Mutex::new(None),
        })
    }

    pub fn is_configured(&self) -> bool {
        !matches!(self.source, Source::Missing)
    }

    /// A bearer token valid for at least [`REFRESH_MARGIN`].
    pub async fn token(&self, client: &Client) -> Result<String, AuthError> {
        let (key, signing_key) = match &self.source {
            Source::Missing => {
                return Err(AuthError::ProviderError(
                    "Firebase admin credentials are not configured".into(),
                ));
            }
            Source::Static(token) => return Ok(token.clone()),
            Source::ServiceAccount { key, signing_key } => (key, signing_key),
        };

        let mut cached = self.cached.lock().await;
        if let Some(current) = cached.as_ref()
            && Instant::now() < current.refresh_at
        {
            return Ok(current.token.clone());
        }

        let assertion = sign_assertion(key, signing_key, Utc::now().timestamp())?;
        let fresh = exchange(client, key, &assertion).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

fn sign_assertion(
    key: &ServiceAccountKey,
    signing_key: &EncodingKey,
    now: i64,
) -> Result<String, AuthError> {
    let header = Header {
        kid: key.private_key_id.clone(),
        ..Header::new(Algorithm::RS256)
    };
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: ADMIN_SCOPES,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };
    encode(&header, &claims, signing_key)
        .map_err(|e| AuthError::ProviderError(format!("sign token assertion: {e}")))
}

async fn exchange(
    client: &Client,
    key: &ServiceAccountKey,
    assertion: &str,
) -> Result<CachedToken, AuthError> {
    let resp = client
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion)])
        .send()
        .await
        .map_err(|e| AuthError::ProviderError(format!("token exchange: {e}")))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        warn!(%status, client_email = %key.client_email, body = %text, "token exchange refused");
        return Err(AuthError::ProviderError(format!(
            "token exchange: HTTP {status}"
        )));
    }
    let body = resp
        .json::<TokenResponse>()
        .await
        .map_err(|e| AuthError::ProviderError(format!("token exchange parse: {e}")))?;

    info!(client_email = %key.client_email, expires_in = body.expires_in, "minted admin access token");
    let lifetime = Duration::from_secs(body.expires_in).saturating_sub(REFRESH_MARGIN);
    debug!(?lifetime, "admin access token cached");
    Ok(CachedToken {
        token: body.access_token,
        refresh_at: Instant::now() + lifetime,
    })
}
