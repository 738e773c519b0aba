//! Like state handlers.

use axum::Json;
use axum::extract::{Extension, Path, State};
use tracing::debug;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::{AuthenticatedUser, Viewer};
use crate::models::{LikeRequest, LikeResponse, LikeStateResponse};

/// `GET /api/posts/{id}/like`: like count plus whether the viewer likes it.
pub async fn get_like_handler(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(Viewer(viewer)): Extension<Viewer>,
) -> AppResult<Json<LikeStateResponse>> {
    let viewer_id = viewer.map(|s| s.user.id);
    let like = state.content.like_state(post_id, viewer_id).await?;
    Ok(Json(like.into()))
}

/// `POST /api/posts/{id}/like`: set (not toggle) the caller's like.
pub async fn set_like_handler(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(AuthenticatedUser(session)): Extension<AuthenticatedUser>,
    Json(body): Json<LikeRequest>,
) -> AppResult<Json<LikeResponse>> {
    let like = state
        .content
        .set_like(post_id, session.user.id, body.is_liked)
        .await?;
    debug!(
        post_id,
        user_id = session.user.id,
        is_liked = like.is_liked,
        likes_count = like.likes_count,
        "like updated"
    );
    Ok(Json(like.into()))
}
