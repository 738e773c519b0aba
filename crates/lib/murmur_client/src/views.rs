//! In-memory copies of posts held by the detail and list views.
//!
//! The same post can appear in both; every like update goes through
//! [`FeedViews::apply_like`] so the copies never drift apart.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A post as displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSummary {
    pub id: i64,
    pub content: String,
    pub is_liked: bool,
    pub likes_count: i64,
}

impl PostSummary {
    pub fn new(id: i64, content: impl Into<String>, is_liked: bool, likes_count: i64) -> Self {
        Self {
            id,
            content: content.into(),
            is_liked,
            likes_count,
        }
    }
}

/// Detail view plus list view.
#[derive(Debug, Clone, Default)]
pub struct FeedViews {
    pub detail: Option<PostSummary>,
    pub list: Vec<PostSummary>,
}

/// Views shared between the UI and the coordinators.
pub type SharedViews = Arc<Mutex<FeedViews>>;

/// Lock shared views, recovering from a poisoned lock.
pub fn lock(views: &SharedViews) -> MutexGuard<'_, FeedViews> {
    views.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FeedViews {
    pub fn new(detail: Option<PostSummary>, list: Vec<PostSummary>) -> Self {
        Self { detail, list }
    }

    pub fn shared(self) -> SharedViews {
        Arc::new(Mutex::new(self))
    }

    /// Current `(is_liked, likes_count)` of a post, preferring the detail view.
    pub fn like_of(&self, post_id: i64) -> Option<(bool, i64)> {
        self.detail
            .iter()
            .chain(self.list.iter())
            .find(|p| p.id == post_id)
            .map(|p| (p.is_liked, p.likes_count))
    }

    /// Copy a like state onto every copy of the post. Returns how many
    /// copies were updated.
    pub fn apply_like(&mut self, post_id: i64, is_liked: bool, likes_count: i64) -> usize {
        let mut updated = 0;
        for post in self.detail.iter_mut().chain(self.list.iter_mut()) {
            if post.id == post_id {
                post.is_liked = is_liked;
                post.likes_count = likes_count;
                updated += 1;
            }
        }
        updated
    }

    /// Remove a post from the list, returning it with its index.
    pub fn remove_from_list(&mut self, post_id: i64) -> Option<(usize, PostSummary)> {
        let index = self.list.iter().position(|p| p.id == post_id)?;
        Some((index, self.list.remove(index)))
    }

    /// Re-insert a post at `index`, clamped to the list length.
    pub fn insert_into_list(&mut self, index: usize, post: PostSummary) -> usize {
        let index = index.min(self.list.len());
        self.list.insert(index, post);
        index
    }

    /// Clear the detail view if it shows `post_id`, returning the post.
    pub fn take_detail(&mut self, post_id: i64) -> Option<PostSummary> {
        self.detail.take_if(|p| p.id == post_id)
    }

    pub fn list_ids(&self) -> Vec<i64> {
        self.list.iter().map(|p| p.id).collect()
    }
}
