//! Session endpoints driven through the router.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use axum::body::Body;
use common::{empty, get, harness, harness_with_revocations, json_body, post, with_cookie};
use murmur_core::auth::AuthError;
use murmur_core::auth::revocation::RevocationStore;
use murmur_core::auth::test_provider::TestClaims;
use murmur_core::models::auth::{ExternalIdentity, RevocationRecord};
use serde_json::json;

struct BrokenStore;

#[async_trait]
impl RevocationStore for BrokenStore {
    async fn put(&self, _record: RevocationRecord) -> Result<(), AuthError> {
        Err(AuthError::StorageError("store offline".into()))
    }

    async fn exists(&self, _fingerprint: &str, _now: DateTime<Utc>) -> Result<bool, AuthError> {
        Err(AuthError::StorageError("store offline".into()))
    }

    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<u64, AuthError> {
        Err(AuthError::StorageError("store offline".into()))
    }
}

fn valid_token(sub: &str, email: &str) -> String {
    TestClaims::new(sub).email(email).encode()
}

#[tokio::test]
async fn verify_token_sets_session_cookie() {
    let h = harness();
    let token = valid_token("uid-1", "alice@example.com");

    let resp = h
        .send(json_body(post("/api/auth/verify-token"), json!({ "idToken": token })))
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["success"], true);
    assert_eq!(resp.json["user"]["uid"], "uid-1");
    assert_eq!(resp.json["user"]["email"], "alice@example.com");

    let cookie = resp.set_cookie().expect("session cookie");
    assert!(cookie.starts_with("auth_jwt="), "{cookie}");
    assert!(cookie.contains("HttpOnly"), "{cookie}");
    assert!(cookie.contains("SameSite=Lax"), "{cookie}");
    assert!(cookie.contains("Path=/"), "{cookie}");
    assert!(cookie.contains("Max-Age=604800"), "{cookie}");
    assert!(!cookie.contains("Secure"), "{cookie}");
}

#[tokio::test]
async fn verify_token_without_token_is_400() {
    let h = harness();

    let resp = h.send(json_body(post("/api/auth/verify-token"), json!({}))).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json["success"], false);
    assert!(resp.json["error"].is_string());
    assert!(resp.set_cookie().is_none());

    let resp = h.send(empty(post("/api/auth/verify-token"))).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expired_token_is_401_without_cookie() {
    let h = harness();
    let expired = TestClaims::new("uid-1")
        .email("alice@example.com")
        .expires_at(Utc::now().timestamp() - 60)
        .encode();

    let resp = h
        .send(json_body(post("/api/auth/verify-token"), json!({ "idToken": expired })))
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.json["success"], false);
    assert!(resp.set_cookie().is_none());
}

#[tokio::test]
async fn check_without_cookie_is_anonymous_200() {
    let h = harness();

    let resp = h.send(empty(get("/api/auth/check"))).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["authenticated"], false);
    assert!(resp.json.get("user").is_none());
}

#[tokio::test]
async fn check_with_valid_cookie_reports_user() {
    let h = harness();
    let exp = Utc::now().timestamp() + 1800;
    let token = TestClaims::new("uid-1")
        .email("alice@example.com")
        .expires_at(exp)
        .encode();

    let resp = h.send(empty(with_cookie(get("/api/auth/check"), &token))).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["authenticated"], true);
    assert_eq!(resp.json["user"]["uid"], "uid-1");
    let expires_at = resp.json["user"]["expires_at"].as_str().expect("expires_at");
    let parsed = DateTime::parse_from_rfc3339(expires_at).expect("rfc3339");
    assert_eq!(parsed.timestamp(), exp);
}

#[tokio::test]
async fn logged_out_token_fails_check_with_401() {
    let h = harness();
    let token = valid_token("uid-1", "alice@example.com");

    let before = h.send(empty(with_cookie(get("/api/auth/check"), &token))).await;
    assert_eq!(before.json["authenticated"], true);

    let logout = h.send(empty(with_cookie(post("/api/auth/logout"), &token))).await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(logout.json["success"], true);
    let cleared = logout.set_cookie().expect("clearing cookie");
    assert!(cleared.starts_with("auth_jwt=;"), "{cleared}");
    assert!(cleared.contains("Max-Age=0"), "{cleared}");
    assert!(cleared.contains("Path=/"), "{cleared}");

    let after = h.send(empty(with_cookie(get("/api/auth/check"), &token))).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
    assert_eq!(after.json["authenticated"], false);
}

#[tokio::test]
async fn logout_succeeds_when_revocation_storage_fails() {
    let h = harness_with_revocations(Arc::new(BrokenStore));
    let token = valid_token("uid-1", "alice@example.com");

    let resp = h.send(empty(with_cookie(post("/api/auth/logout"), &token))).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["success"], true);
    assert!(resp.set_cookie().expect("cookie").contains("Max-Age=0"));
}

#[tokio::test]
async fn logout_without_cookie_still_succeeds() {
    let h = harness();
    let resp = h.send(empty(post("/api/auth/logout"))).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["success"], true);
}

#[tokio::test]
async fn revocation_storage_failure_fails_closed() {
    let h = harness_with_revocations(Arc::new(BrokenStore));
    let token = valid_token("uid-1", "alice@example.com");

    let resp = h.send(empty(with_cookie(get("/api/auth/check"), &token))).await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.json["authenticated"], false);
    assert_eq!(h.provider.verify_calls(), 0);
}

#[tokio::test]
async fn check_token_uses_bearer_header() {
    let h = harness();

    let missing = h.send(empty(post("/api/auth/check-token"))).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.json["error"], "No token provided");

    let token = valid_token("uid-1", "alice@example.com");
    let ok = h
        .send(empty(
            post("/api/auth/check-token").header("authorization", format!("Bearer {token}")),
        ))
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.json["uid"], "uid-1");

    let bad = h
        .send(empty(
            post("/api/auth/check-token").header("authorization", "Bearer garbage"),
        ))
        .await;
    assert_eq!(bad.status, StatusCode::UNAUTHORIZED);
    assert!(bad.json["message"].is_string());
}

#[tokio::test]
async fn firebase_login_without_email_is_422() {
    let h = harness();
    let token = TestClaims::new("uid-no-email").encode();

    let resp = h
        .send(empty(
            post("/api/auth/firebase-login").header("authorization", format!("Bearer {token}")),
        ))
        .await;

    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    let message = resp.json["message"].as_str().expect("message");
    assert!(message.contains("no email"), "{message}");
    assert!(resp.set_cookie().is_none());
    assert!(h.users.is_empty());
}

#[tokio::test]
async fn firebase_login_syncs_user_and_sets_day_cookie() {
    let h = harness();
    let token = TestClaims::new("uid-1")
        .email("alice@example.com")
        .name("Alice")
        .encode();
    let req = || empty(post("/api/auth/firebase-login").header("authorization", format!("Bearer {token}")));

    let first = h.send(req()).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json["success"], true);
    assert_eq!(first.json["new_user"], true);
    assert_eq!(first.json["user"]["firebase_uid"], "uid-1");
    assert_eq!(first.json["user"]["name"], "Alice");
    assert!(first.set_cookie().expect("cookie").contains("Max-Age=86400"));

    let second = h.send(req()).await;
    assert_eq!(second.json["new_user"], false);
    assert_eq!(second.json["user"]["id"], first.json["user"]["id"]);
    assert_eq!(h.users.len(), 1);
}

#[tokio::test]
async fn firebase_login_with_bad_token_is_401() {
    let h = harness();
    let resp = h
        .send(empty(
            post("/api/auth/firebase-login").header("authorization", "Bearer garbage"),
        ))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.json["message"], "Invalid token");
}

#[tokio::test]
async fn firebase_login_onto_user_linked_elsewhere_is_409() {
    let h = harness();
    let login = |token: String| {
        empty(post("/api/auth/firebase-login").header("authorization", format!("Bearer {token}")))
    };

    assert_eq!(h.send(login(valid_token("s1", "a@example.com"))).await.status, StatusCode::OK);
    assert_eq!(h.send(login(valid_token("s2", "b@example.com"))).await.status, StatusCode::OK);
    h.provider.register_user(ExternalIdentity {
        subject: "s2".into(),
        email: Some("a@example.com".into()),
        display_name: None,
        email_verified: true,
        expires_at: None,
    });

    let resp = h.send(login(valid_token("s2", "a@example.com"))).await;

    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.json["message"], "Invalid token");
    assert!(resp.set_cookie().is_none());
    assert_eq!(h.users.len(), 2);
}

#[tokio::test]
async fn malformed_account_bodies_are_json_400() {
    let h = harness();
    for uri in ["/api/auth/register", "/api/auth/login"] {
        let req = post(uri)
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .expect("build request");

        let resp = h.send(req).await;

        assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(resp.json["error"], "validation_error", "{uri}");
        assert!(resp.json["message"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn register_then_login() {
    let h = harness();
    h.provider.register_user(ExternalIdentity {
        subject: "uid-1".into(),
        email: Some("alice@example.com".into()),
        display_name: None,
        email_verified: true,
        expires_at: None,
    });
    let body = json!({ "firebase_uid": "uid-1", "name": "Alice", "email": "alice@example.com" });

    let created = h.send(json_body(post("/api/auth/register"), body.clone())).await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.json["user"]["name"], "Alice");

    let duplicate = h.send(json_body(post("/api/auth/register"), body)).await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert!(!h.provider.was_deleted("uid-1"));

    let login = h
        .send(json_body(post("/api/auth/login"), json!({ "firebase_uid": "uid-1" })))
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.json["user"]["email"], "alice@example.com");

    let unknown = h
        .send(json_body(post("/api/auth/login"), json!({ "firebase_uid": "nobody" })))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn register_for_unknown_provider_account_cleans_up() {
    let h = harness();
    let body = json!({ "firebase_uid": "ghost", "name": "Ghost", "email": "ghost@example.com" });

    let resp = h.send(json_body(post("/api/auth/register"), body)).await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert!(h.provider.was_deleted("ghost"));
    assert!(h.users.is_empty());
}

#[tokio::test]
async fn register_validation_errors_are_400() {
    let h = harness();
    let body = json!({ "firebase_uid": "uid-1", "name": "", "email": "alice@example.com" });

    let resp = h.send(json_body(post("/api/auth/register"), body)).await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json["error"], "validation_error");
    assert!(!h.provider.was_deleted("uid-1"));
}
