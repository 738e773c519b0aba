//! Thin content operations behind session-bearing endpoints: like state with
//! set semantics, and soft delete/restore of posts.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use sqlx::PgPool;
use thiserror::Error;

use crate::models::content::LikeState;

/// Content errors.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Post not found")]
    NotFound,

    #[error("Not the owner of this post")]
    Forbidden,

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Content store consumed by the API.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Like state of a visible post; `viewer` personalises `is_liked`.
    async fn like_state(&self, post_id: i64, viewer: Option<i64>)
    -> Result<LikeState, ContentError>;

    /// Make the like state of `user_id` on `post_id` equal to `liked`.
    async fn set_like(&self, post_id: i64, user_id: i64, liked: bool)
    -> Result<LikeState, ContentError>;

    /// Soft-delete a post owned by `user_id`.
    async fn delete_post(&self, post_id: i64, user_id: i64) -> Result<(), ContentError>;

    /// Undo a soft delete of a post owned by `user_id`.
    async fn restore_post(&self, post_id: i64, user_id: i64) -> Result<(), ContentError>;
}

// =============================================================================
// PostgreSQL store
// =============================================================================

/// Content store on the `posts` and `likes` tables.
#[derive(Debug, Clone)]
pub struct PgContentStore {
    pool: PgPool,
}

impl PgContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Owner of a post, including soft-deleted ones: `(user_id, deleted)`.
    async fn owner(&self, post_id: i64) -> Result<(i64, bool), ContentError> {
        sqlx::query_as::<_, (i64, bool)>(
            "SELECT user_id, deleted_at IS NOT NULL FROM posts WHERE id = $1",
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ContentError::NotFound)
    }

    async fn ensure_visible(&self, post_id: i64) -> Result<(), ContentError> {
        match self.owner(post_id).await? {
            (_, false) => Ok(()),
            (_, true) => Err(ContentError::NotFound),
        }
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn like_state(
        &self,
        post_id: i64,
        viewer: Option<i64>,
    ) -> Result<LikeState, ContentError> {
        self.ensure_visible(post_id).await?;
        let (likes_count, is_liked) = sqlx::query_as::<_, (i64, bool)>(
            "SELECT COUNT(*), COALESCE(BOOL_OR(user_id = $2), false) \
             FROM likes WHERE post_id = $1",
        )
        .bind(post_id)
        .bind(viewer)
        .fetch_one(&self.pool)
        .await?;
        Ok(LikeState {
            post_id,
            is_liked,
            likes_count,
        })
    }

    async fn set_like(
        &self,
        post_id: i64,
        user_id: i64,
        liked: bool,
    ) -> Result<LikeState, ContentError> {
        self.ensure_visible(post_id).await?;
        if liked {
            sqlx::query(
                "INSERT INTO likes (user_id, post_id) VALUES ($1, $2) \
                 ON CONFLICT (user_id, post_id) DO NOTHING",
            )
            .bind(user_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
                .bind(user_id)
                .bind(post_id)
                .execute(&self.pool)
                .await?;
        }
        self.like_state(post_id, Some(user_id)).await
    }

    async fn delete_post(&self, post_id: i64, user_id: i64) -> Result<(), ContentError> {
        match self.owner(post_id).await? {
            (_, true) => Err(ContentError::NotFound),
            (owner, _) if owner != user_id => Err(ContentError::Forbidden),
            _ => {
                sqlx::query("UPDATE posts SET deleted_at = now() WHERE id = $1")
                    .bind(post_id)
                    .execute(&self.pool)
                    .await?;
                Ok(())
            }
        }
    }

    async fn restore_post(&self, post_id: i64, user_id: i64) -> Result<(), ContentError> {
        let (owner, _) = self.owner(post_id).await?;
        if owner != user_id {
            return Err(ContentError::Forbidden);
        }
        sqlx::query("UPDATE posts SET deleted_at = NULL WHERE id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct MemoryPost {
    owner: i64,
    deleted: bool,
}

/// Process-local content store for tests and the `test` provider mode.
#[derive(Debug)]
pub struct MemoryContentStore {
    posts: DashMap<i64, MemoryPost>,
    likes: DashSet<(i64, i64)>,
    next_id: AtomicI64,
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self {
            posts: DashMap::new(),
            likes: DashSet::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a post owned by `owner`, returning its id.
    pub fn create_post(&self, owner: i64) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.insert_post(id, owner);
        id
    }

    /// Create a post with a fixed id.
    pub fn insert_post(&self, id: i64, owner: i64) {
        self.posts.insert(
            id,
            MemoryPost {
                owner,
                deleted: false,
            },
        );
        self.next_id.fetch_max(id + 1, Ordering::SeqCst);
    }

    /// Record a like directly, bypassing ownership and visibility.
    pub fn seed_like(&self, post_id: i64, user_id: i64) {
        self.likes.insert((user_id, post_id));
    }

    fn visible(&self, post_id: i64) -> Result<MemoryPost, ContentError> {
        self.posts
            .get(&post_id)
            .map(|p| *p)
            .filter(|p| !p.deleted)
            .ok_or(ContentError::NotFound)
    }

    fn state(&self, post_id: i64, viewer: Option<i64>) -> LikeState {
        let likes_count = self.likes.iter().filter(|l| l.1 == post_id).count() as i64;
        let is_liked = viewer.is_some_and(|v| self.likes.contains(&(v, post_id)));
        LikeState {
            post_id,
            is_liked,
            likes_count,
        }
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn like_state(
        &self,
        post_id: i64,
        viewer: Option<i64>,
    ) -> Result<LikeState, ContentError> {
        self.visible(post_id)?;
        Ok(self.state(post_id, viewer))
    }

    async fn set_like(
        &self,
        post_id: i64,
        user_id: i64,
        liked: bool,
    ) -> Result<LikeState, ContentError> {
        self.visible(post_id)?;
        if liked {
            self.likes.insert((user_id, post_id));
        } else {
            self.likes.remove(&(user_id, post_id));
        }
        Ok(self.state(post_id, Some(user_id)))
    }

    async fn delete_post(&self, post_id: i64, user_id: i64) -> Result<(), ContentError> {
        let mut post = self.posts.get_mut(&post_id).ok_or(ContentError::NotFound)?;
        if post.deleted {
            return Err(ContentError::NotFound);
        }
        if post.owner != user_id {
            return Err(ContentError::Forbidden);
        }
        post.deleted = true;
        Ok(())
    }

    async fn restore_post(&self, post_id: i64, user_id: i64) -> Result<(), ContentError> {
        let mut post = self.posts.get_mut(&post_id).ok_or(ContentError::NotFound)?;
        if post.owner != user_id {
            return Err(ContentError::Forbidden);
        }
        post.deleted = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_like_is_idempotent_set_semantics() {
        let store = MemoryContentStore::new();
        let post = store.create_post(1);

        let a = store.set_like(post, 2, true).await.unwrap();
        let b = store.set_like(post, 2, true).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(b.likes_count, 1);
        assert!(b.is_liked);

        let c = store.set_like(post, 2, false).await.unwrap();
        let d = store.set_like(post, 2, false).await.unwrap();
        assert_eq!(c, d);
        assert_eq!(d.likes_count, 0);
        assert!(!d.is_liked);
    }

    #[tokio::test]
    async fn like_state_personalises_for_viewer() {
        let store = MemoryContentStore::new();
        store.insert_post(42, 1);
        store.seed_like(42, 7);

        assert!(store.like_state(42, Some(7)).await.unwrap().is_liked);
        let anon = store.like_state(42, None).await.unwrap();
        assert!(!anon.is_liked);
        assert_eq!(anon.likes_count, 1);
    }

    #[tokio::test]
    async fn delete_checks_owner_and_existence() {
        let store = MemoryContentStore::new();
        let post = store.create_post(1);

        assert!(matches!(
            store.delete_post(post, 2).await,
            Err(ContentError::Forbidden)
        ));
        store.delete_post(post, 1).await.unwrap();
        assert!(matches!(
            store.delete_post(post, 1).await,
            Err(ContentError::NotFound)
        ));
        assert!(matches!(
            store.like_state(post, None).await,
            Err(ContentError::NotFound)
        ));

        store.restore_post(post, 1).await.unwrap();
        assert!(store.like_state(post, None).await.is_ok());
    }

    #[tokio::test]
    async fn create_post_skips_fixed_ids() {
        let store = MemoryContentStore::new();
        store.insert_post(10, 1);
        assert_eq!(store.create_post(1), 11);
    }
}
