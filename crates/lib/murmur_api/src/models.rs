//! API wire models.
//!
//! Field names follow what the web client sends and reads, hence the mix of
//! `idToken`/`isLiked` and snake_case.

use murmur_core::models::auth::LocalUser;
use murmur_core::models::content::LikeState;
use serde::{Deserialize, Serialize};

/// Generic error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// `{success:false, error}` body of the session endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureResponse {
    pub success: bool,
    pub error: String,
}

impl FailureResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

// -- verify-token / check / logout ------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyTokenRequest {
    #[serde(rename = "idToken", default)]
    pub id_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub uid: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyTokenResponse {
    pub success: bool,
    pub message: String,
    pub user: SessionUser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCheckUser {
    pub uid: String,
    pub email: Option<String>,
    /// RFC 3339.
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthCheckResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthCheckUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}

// -- bearer endpoints --------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCheckResponse {
    pub uid: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncedUser {
    pub id: i64,
    pub firebase_uid: String,
    pub email: String,
    pub name: String,
}

impl From<LocalUser> for SyncedUser {
    fn from(u: LocalUser) -> Self {
        Self {
            id: u.id,
            firebase_uid: u.external_subject,
            email: u.email,
            name: u.display_name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseLoginResponse {
    pub success: bool,
    pub new_user: bool,
    pub user: SyncedUser,
}

/// `{message, error?}` body of the firebase-login failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// -- registration ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub firebase_uid: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub firebase_uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub success: bool,
    pub message: String,
    pub user: SyncedUser,
}

// -- posts -------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeRequest {
    #[serde(rename = "isLiked")]
    pub is_liked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeResponse {
    pub success: bool,
    pub is_liked: bool,
    pub likes_count: i64,
}

impl From<LikeState> for LikeResponse {
    fn from(s: LikeState) -> Self {
        Self {
            success: true,
            is_liked: s.is_liked,
            likes_count: s.likes_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeStateResponse {
    pub post_id: i64,
    pub is_liked: bool,
    pub likes_count: i64,
}

impl From<LikeState> for LikeStateResponse {
    fn from(s: LikeState) -> Self {
        Self {
            post_id: s.post_id,
            is_liked: s.is_liked,
            likes_count: s.likes_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
