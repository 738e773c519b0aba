//! Content models touched by session-bearing endpoints.

use serde::{Deserialize, Serialize};

/// Like state of a post as seen by one viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeState {
    pub post_id: i64,
    pub is_liked: bool,
    pub likes_count: i64,
}
