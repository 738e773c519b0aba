//! HTTP access to the Murmur API.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::ClientError;

/// Server-authoritative like state returned by a like update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LikeOutcome {
    pub success: bool,
    pub is_liked: bool,
    pub likes_count: i64,
}

/// Like endpoint used by the like coordinator.
#[async_trait]
pub trait LikeApi: Send + Sync {
    /// Send the final intended like state of a post.
    async fn set_like(&self, post_id: i64, is_liked: bool) -> Result<LikeOutcome, ClientError>;
}

/// Delete/restore endpoints used by the post list coordinator.
#[async_trait]
pub trait PostApi: Send + Sync {
    async fn delete_post(&self, post_id: i64) -> Result<(), ClientError>;

    async fn restore_post(&self, post_id: i64) -> Result<(), ClientError>;
}

#[derive(Debug, Serialize)]
struct LikeBody {
    #[serde(rename = "isLiked")]
    is_liked: bool,
}

#[derive(Debug, Serialize)]
struct VerifyTokenBody<'a> {
    #[serde(rename = "idToken")]
    id_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct ActionBody {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Signed-in user returned by `verify-token`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionUser {
    pub uid: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyTokenReply {
    user: SessionUser,
}

/// Result of `GET /api/auth/check`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    #[serde(default)]
    pub user: Option<SessionStatusUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionStatusUser {
    pub uid: String,
    pub email: Option<String>,
    pub expires_at: Option<String>,
}

/// API client. The session cookie is kept in the client's cookie store.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(ClientError::from)?;
        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        Ok(self.http.request(method, self.url(path)?))
    }

    /// Exchange an identity provider token for a session cookie.
    pub async fn sign_in(&self, id_token: &str) -> Result<SessionUser, ClientError> {
        let resp = self
            .request(Method::POST, "/api/auth/verify-token")?
            .json(&VerifyTokenBody { id_token })
            .send()
            .await?;
        let reply: VerifyTokenReply = handle_response(resp).await?;
        Ok(reply.user)
    }

    /// Whether the current session cookie is usable.
    ///
    /// A revoked or invalid session answers 401 with a body; it is reported
    /// as unauthenticated rather than as an error.
    pub async fn session(&self) -> Result<SessionStatus, ClientError> {
        let resp = self.request(Method::GET, "/api/auth/check")?.send().await?;
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Ok(SessionStatus {
                authenticated: false,
                user: None,
            });
        }
        handle_response(resp).await
    }

    /// End the session. The server always clears the cookie.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        let resp = self.request(Method::POST, "/api/auth/logout")?.send().await?;
        let body: ActionBody = handle_response(resp).await?;
        ensure_success(body)
    }
}

#[async_trait]
impl LikeApi for ApiClient {
    async fn set_like(&self, post_id: i64, is_liked: bool) -> Result<LikeOutcome, ClientError> {
        debug!(post_id, is_liked, "sending like");
        let resp = self
            .request(Method::POST, &format!("/api/posts/{post_id}/like"))?
            .json(&LikeBody { is_liked })
            .send()
            .await?;
        handle_response(resp).await
    }
}

#[async_trait]
impl PostApi for ApiClient {
    async fn delete_post(&self, post_id: i64) -> Result<(), ClientError> {
        let resp = self
            .request(Method::DELETE, &format!("/api/posts/{post_id}"))?
            .send()
            .await?;
        ensure_success(handle_response(resp).await?)
    }

    async fn restore_post(&self, post_id: i64) -> Result<(), ClientError> {
        let resp = self
            .request(Method::POST, &format!("/api/posts/{post_id}/restore"))?
            .send()
            .await?;
        ensure_success(handle_response(resp).await?)
    }
}

async fn handle_response<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        debug!(status = status.as_u16(), url = %resp.url(), "request failed");
        return Err(ClientError::Status(status.as_u16()));
    }
    resp.json::<T>().await.map_err(ClientError::from)
}

fn ensure_success(body: ActionBody) -> Result<(), ClientError> {
    if body.success {
        Ok(())
    } else {
        Err(ClientError::Rejected(
            body.error.or(body.message).unwrap_or_else(|| "request failed".into()),
        ))
    }
}
