//! API server configuration.

use std::str::FromStr;
use std::time::Duration;

use murmur_core::auth::cache::{
    CacheSettings, DEFAULT_CAPACITY, DEFAULT_NEGATIVE_TTL, DEFAULT_POSITIVE_TTL,
};
use murmur_core::auth::provider::ProviderKind;
use tracing::warn;

use crate::services::cookies::CookiePolicy;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8000").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Public URL of the deployment.
    pub app_url: String,
    /// Session cookie attributes derived from `app_url`.
    pub cookies: CookiePolicy,
    /// Which identity provider to construct.
    pub identity_provider: ProviderKind,
    /// Firebase project id (audience / issuer).
    pub firebase_project_id: String,
    /// Path to a service-account JSON key for Identity Toolkit admin calls.
    pub firebase_credentials_file: Option<String>,
    /// Pre-minted bearer token for admin calls, used when no key file is set.
    pub firebase_admin_token: Option<String>,
    /// Verification cache tuning.
    pub token_cache: CacheSettings,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                        | Default                            |
    /// |---------------------------------|------------------------------------|
    /// | `BIND_ADDR`                     | `127.0.0.1:8000`                   |
    /// | `DATABASE_URL`                  | `postgres://localhost:5432/murmur` |
    /// | `APP_URL`                       | `http://localhost`                 |
    /// | `COOKIE_DOMAIN_FROM_APP_URL`    | `false`                            |
    /// | `IDENTITY_PROVIDER`             | `firebase`                         |
    /// | `FIREBASE_PROJECT_ID`           | empty                              |
    /// | `FIREBASE_CREDENTIALS`          | `GOOGLE_APPLICATION_CREDENTIALS`   |
    /// | `FIREBASE_ADMIN_TOKEN`          | unset                              |
    /// | `TOKEN_CACHE_TTL_SECS`          | `300`                              |
    /// | `TOKEN_CACHE_NEGATIVE_TTL_SECS` | `60`                               |
    /// | `TOKEN_CACHE_CAPACITY`          | `10000`                            |
    pub fn from_env() -> Self {
        let app_url = std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost".into());
        let cookie_domain = env_parse("COOKIE_DOMAIN_FROM_APP_URL", false);

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".into()),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/murmur".into()),
            cookies: CookiePolicy::from_app_url(&app_url, cookie_domain),
            app_url,
            identity_provider: env_parse("IDENTITY_PROVIDER", ProviderKind::default()),
            firebase_project_id: std::env::var("FIREBASE_PROJECT_ID").unwrap_or_default(),
            firebase_credentials_file: non_empty_env("FIREBASE_CREDENTIALS")
                .or_else(|| non_empty_env("GOOGLE_APPLICATION_CREDENTIALS")),
            firebase_admin_token: std::env::var("FIREBASE_ADMIN_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            token_cache: CacheSettings {
                positive_ttl: Duration::from_secs(env_parse(
                    "TOKEN_CACHE_TTL_SECS",
                    DEFAULT_POSITIVE_TTL.as_secs(),
                )),
                negative_ttl: Duration::from_secs(env_parse(
                    "TOKEN_CACHE_NEGATIVE_TTL_SECS",
                    DEFAULT_NEGATIVE_TTL.as_secs(),
                )),
                capacity: env_parse("TOKEN_CACHE_CAPACITY", DEFAULT_CAPACITY),
            },
        }
    }

    /// Config for in-process use (tests, `test` provider mode).
    pub fn local(identity_provider: ProviderKind) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".into(),
            pg_connection_url: String::new(),
            app_url: "http://localhost".into(),
            cookies: CookiePolicy::default(),
            identity_provider,
            firebase_project_id: String::new(),
            firebase_credentials_file: None,
            firebase_admin_token: None,
            token_cache: CacheSettings::default(),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an env var, falling back to `default` when unset or malformed.
fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(e) => {
                warn!(key, value = %raw, error = %e, "ignoring malformed config value");
                default
            }
        },
        Err(_) => default,
    }
}
