//! Post delete / restore handlers.

use axum::Json;
use axum::extract::{Extension, Path, State};
use tracing::info;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::ActionResponse;

/// `DELETE /api/posts/{id}`: soft-delete one of the caller's posts.
pub async fn delete_post_handler(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(AuthenticatedUser(session)): Extension<AuthenticatedUser>,
) -> AppResult<Json<ActionResponse>> {
    state.content.delete_post(post_id, session.user.id).await?;
    info!(post_id, user_id = session.user.id, "post deleted");
    Ok(Json(ActionResponse {
        success: true,
        message: "Post deleted".into(),
    }))
}

/// `POST /api/posts/{id}/restore`: undo a soft delete.
pub async fn restore_post_handler(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(AuthenticatedUser(session)): Extension<AuthenticatedUser>,
) -> AppResult<Json<ActionResponse>> {
    state.content.restore_post(post_id, session.user.id).await?;
    info!(post_id, user_id = session.user.id, "post restored");
    Ok(Json(ActionResponse {
        success: true,
        message: "Post restored".into(),
    }))
}
