//! Session cookie service: issue, read and clear the `auth_jwt` cookie.
//!
//! The cookie value is the identity provider's token, verbatim. Issue and
//! clear share one attribute builder so the browser accepts the deletion.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cookie::CookieBuilder;
use time::Duration;
use url::Url;

/// Cookie name for the session token.
pub const SESSION_COOKIE: &str = "auth_jwt";

/// Lifetime of the cookie set by `verify-token` (7 days).
pub const LOGIN_SESSION_MAX_AGE_SECS: i64 = 7 * 24 * 60 * 60;

/// Lifetime of the cookie set by `firebase-login` (24 hours).
pub const SYNC_SESSION_MAX_AGE_SECS: i64 = 24 * 60 * 60;

/// Deployment-dependent cookie attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
    pub domain: Option<String>,
}

impl CookiePolicy {
    /// `Secure` when the public URL is https; `Domain` from its host when
    /// `with_domain` is set.
    pub fn from_app_url(app_url: &str, with_domain: bool) -> Self {
        match Url::parse(app_url) {
            Ok(url) => Self {
                secure: url.scheme() == "https",
                domain: with_domain
                    .then(|| url.host_str().map(str::to_string))
                    .flatten(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Build the session cookie.
    pub fn session_cookie(&self, token: &str, max_age_secs: i64) -> Cookie<'static> {
        self.builder(token.to_string())
            .max_age(Duration::seconds(max_age_secs))
            .build()
    }

    /// Build an expired session cookie with identical attributes.
    pub fn clear_session_cookie(&self) -> Cookie<'static> {
        self.builder(String::new()).max_age(Duration::ZERO).build()
    }

    fn builder(&self, value: String) -> CookieBuilder<'static> {
        let builder = Cookie::build((SESSION_COOKIE.to_string(), value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/".to_string());
        match &self.domain {
            Some(domain) => builder.domain(domain.clone()),
            None => builder,
        }
    }
}

/// Session token from the request cookies, if present and non-empty.
pub fn read_session_token(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
