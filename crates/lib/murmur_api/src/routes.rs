//! Route paths.

pub const GET_API_HEALTH: &str = "/api/health";

pub const POST_AUTH_VERIFY_TOKEN: &str = "/api/auth/verify-token";
pub const GET_AUTH_CHECK: &str = "/api/auth/check";
pub const POST_AUTH_LOGOUT: &str = "/api/auth/logout";
pub const POST_AUTH_CHECK_TOKEN: &str = "/api/auth/check-token";
pub const POST_AUTH_FIREBASE_LOGIN: &str = "/api/auth/firebase-login";
pub const POST_AUTH_REGISTER: &str = "/api/auth/register";
pub const POST_AUTH_LOGIN: &str = "/api/auth/login";

pub const GET_POST_LIKE: &str = "/api/posts/{id}/like";
pub const POST_POST_LIKE: &str = "/api/posts/{id}/like";
pub const DELETE_POST: &str = "/api/posts/{id}";
pub const POST_POST_RESTORE: &str = "/api/posts/{id}/restore";
