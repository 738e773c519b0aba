//! Optimistic post deletion with rollback and a time-boxed undo.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::PostApi;
use crate::error::ClientError;
use crate::toast::{Toast, ToastAction, ToastKind, Toaster};
use crate::views::{self, PostSummary, SharedViews};

/// How long a deleted post can be restored from the toast.
pub const DEFAULT_UNDO_WINDOW: Duration = Duration::from_secs(8);

pub const DELETED_MESSAGE: &str = "Post deleted";
pub const RESTORED_MESSAGE: &str = "Post restored";
pub const UNDO_LABEL: &str = "Undo";
pub const UNDO_EXPIRED_MESSAGE: &str = "This post can no longer be restored";
pub const RESTORE_FAILED_MESSAGE: &str = "Could not restore the post";

/// Failure message for a delete, by cause.
pub fn delete_failure_message(error: &ClientError) -> &'static str {
    match error {
        ClientError::Status(401) => "Please log in to delete posts",
        ClientError::Status(403) => "You cannot delete another user's post",
        ClientError::Status(404) => "This post no longer exists",
        ClientError::Rejected(_) => "Could not delete the post",
        _ => "A network error occurred",
    }
}

/// Where a deleted post was shown, so undo can put it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placement {
    list_index: Option<usize>,
    in_detail: bool,
}

#[derive(Debug, Clone)]
struct Removed {
    post: PostSummary,
    placement: Placement,
    deleted_at: Instant,
}

/// Delete/restore coordinator for the list and detail views.
pub struct PostListCoordinator {
    api: Arc<dyn PostApi>,
    views: SharedViews,
    toaster: Toaster,
    undo_window: Duration,
    removed: Mutex<HashMap<i64, Removed>>,
}

impl PostListCoordinator {
    pub fn new(api: Arc<dyn PostApi>, views: SharedViews, toaster: Toaster) -> Self {
        Self::with_undo_window(api, views, toaster, DEFAULT_UNDO_WINDOW)
    }

    pub fn with_undo_window(
        api: Arc<dyn PostApi>,
        views: SharedViews,
        toaster: Toaster,
        undo_window: Duration,
    ) -> Self {
        Self {
            api,
            views,
            toaster,
            undo_window,
            removed: Mutex::new(HashMap::new()),
        }
    }

    fn removed(&self) -> MutexGuard<'_, HashMap<i64, Removed>> {
        self.removed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove the post from the list, then delete it on the server. On
    /// failure the post goes back to its original index.
    pub async fn delete(&self, post_id: i64) -> Result<(), ClientError> {
        let Some((index, post)) = views::lock(&self.views).remove_from_list(post_id) else {
            debug!(post_id, "delete for a post not in the list");
            return Ok(());
        };
        let placement = Placement {
            list_index: Some(index),
            in_detail: false,
        };
        self.delete_removed(post_id, post, placement).await
    }

    /// Clear the detail view showing `post_id` (and any list copy), then
    /// delete it on the server. Undo puts it back in both places.
    pub async fn delete_in_detail(&self, post_id: i64) -> Result<(), ClientError> {
        let taken = {
            let mut views = views::lock(&self.views);
            views.take_detail(post_id).map(|post| {
                let list_index = views.remove_from_list(post_id).map(|(index, _)| index);
                (post, list_index)
            })
        };
        let Some((post, list_index)) = taken else {
            debug!(post_id, "delete for a post not in the detail view");
            return Ok(());
        };
        let placement = Placement {
            list_index,
            in_detail: true,
        };
        self.delete_removed(post_id, post, placement).await
    }

    async fn delete_removed(
        &self,
        post_id: i64,
        post: PostSummary,
        placement: Placement,
    ) -> Result<(), ClientError> {
        match self.api.delete_post(post_id).await {
            Ok(()) => {
                info!(post_id, ?placement, "post deleted");
                let now = Instant::now();
                let mut removed = self.removed();
                removed.retain(|_, r| now.duration_since(r.deleted_at) <= self.undo_window);
                removed.insert(
                    post_id,
                    Removed {
                        post,
                        placement,
                        deleted_at: now,
                    },
                );
                drop(removed);

                self.toaster.show(Toast::new(ToastKind::Success, DELETED_MESSAGE).with_action(
                    ToastAction::UndoDelete {
                        post_id,
                        label: UNDO_LABEL.into(),
                    },
                    self.undo_window,
                ));
                Ok(())
            }
            Err(e) => {
                warn!(post_id, error = %e, "delete failed; restoring post");
                self.put_back(post, placement);
                self.toaster.error(delete_failure_message(&e));
                Err(e)
            }
        }
    }

    fn put_back(&self, post: PostSummary, placement: Placement) {
        let mut views = views::lock(&self.views);
        if let Some(index) = placement.list_index {
            views.insert_into_list(index, post.clone());
        }
        if placement.in_detail {
            views.detail = Some(post);
        }
    }

    /// Undo a delete within the undo window. Returns `Ok(false)` when there
    /// is nothing to undo.
    pub async fn undo(&self, post_id: i64) -> Result<bool, ClientError> {
        let entry = self.removed().remove(&post_id);
        let Some(entry) = entry else {
            return Ok(false);
        };
        if entry.deleted_at.elapsed() > self.undo_window {
            debug!(post_id, "undo window elapsed");
            self.toaster.show(Toast::new(ToastKind::Info, UNDO_EXPIRED_MESSAGE));
            return Ok(false);
        }

        match self.api.restore_post(post_id).await {
            Ok(()) => {
                info!(post_id, placement = ?entry.placement, "post restored");
                self.put_back(entry.post, entry.placement);
                self.toaster.success(RESTORED_MESSAGE);
                Ok(true)
            }
            Err(e) => {
                warn!(post_id, error = %e, "restore failed");
                self.removed().insert(post_id, entry);
                self.toaster.error(RESTORE_FAILED_MESSAGE);
                Err(e)
            }
        }
    }

    /// Whether `post_id` can still be restored.
    pub fn can_undo(&self, post_id: i64) -> bool {
        self.removed()
            .get(&post_id)
            .is_some_and(|r| r.deleted_at.elapsed() <= self.undo_window)
    }
}
