//! # murmur_client
//!
//! Client-side session and mutation handling for Murmur: an HTTP client for
//! the API, a debounced optimistic like coordinator, and an optimistic
//! delete/undo coordinator for post lists.

pub mod api;
pub mod error;
pub mod likes;
pub mod posts;
pub mod toast;
pub mod views;

pub use api::{ApiClient, LikeApi, LikeOutcome, PostApi};
pub use error::ClientError;
pub use likes::LikeCoordinator;
pub use posts::PostListCoordinator;
pub use toast::{Toast, ToastAction, ToastKind, Toaster};
pub use views::{FeedViews, PostSummary, SharedViews};
