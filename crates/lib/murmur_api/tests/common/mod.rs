//! Shared harness: router over in-memory stores and the test identity provider.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use murmur_api::config::ApiConfig;
use murmur_api::services::auth::AuthServices;
use murmur_api::AppState;
use murmur_core::auth::cache::CacheSettings;
use murmur_core::auth::provider::ProviderKind;
use murmur_core::auth::revocation::{MemoryRevocationStore, RevocationStore};
use murmur_core::auth::test_provider::TestIdentityProvider;
use murmur_core::auth::users::{MemoryUserStore, UserStore};
use murmur_core::content::MemoryContentStore;
use tower::ServiceExt;

pub struct Harness {
    pub app: Router,
    pub provider: Arc<TestIdentityProvider>,
    pub users: Arc<MemoryUserStore>,
    pub content: Arc<MemoryContentStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: serde_json::Value,
}

impl TestResponse {
    /// The `Set-Cookie` header, if any.
    pub fn set_cookie(&self) -> Option<String> {
        self.headers
            .get(axum::http::header::SET_COOKIE)
            .map(|v| v.to_str().expect("ascii set-cookie").to_string())
    }
}

pub fn harness() -> Harness {
    harness_with_revocations(Arc::new(MemoryRevocationStore::new()))
}

pub fn harness_with_revocations(revocations: Arc<dyn RevocationStore>) -> Harness {
    let provider = Arc::new(TestIdentityProvider::new());
    let users = Arc::new(MemoryUserStore::new());
    let content = Arc::new(MemoryContentStore::new());

    let auth = AuthServices::new(
        provider.clone(),
        revocations,
        users.clone(),
        CacheSettings::default(),
    );
    let state = AppState::new(ApiConfig::local(ProviderKind::Test), auth, content.clone());

    Harness {
        app: murmur_api::router(state),
        provider,
        users,
        content,
    }
}

impl Harness {
    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let resp = self.app.clone().oneshot(req).await.expect("request");
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).expect("parse JSON")
        };
        TestResponse {
            status,
            headers,
            json,
        }
    }

    /// Local id of the user reconciled for `email`.
    pub async fn user_id(&self, email: &str) -> i64 {
        self.users
            .find_by_email(email)
            .await
            .expect("lookup")
            .expect("user exists")
            .id
    }
}

pub fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri)
}

pub fn post(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("POST").uri(uri)
}

pub fn with_cookie(builder: axum::http::request::Builder, token: &str) -> axum::http::request::Builder {
    builder.header("cookie", format!("auth_jwt={token}"))
}

pub fn json_body(builder: axum::http::request::Builder, body: serde_json::Value) -> Request<Body> {
    builder
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

pub fn empty(builder: axum::http::request::Builder) -> Request<Body> {
    builder.body(Body::empty()).expect("build request")
}
