//! Debounced optimistic like toggling.
//!
//! Per post:
//!
//! ```text
//! Idle --toggle--> Pending --toggle--> Pending (flip, timer restarted)
//!                  Pending --timer---> InFlight --response--> Idle
//!                  InFlight --toggle--> ignored
//! ```
//!
//! The local state flips on every accepted toggle. Only the last intended
//! value is sent, so the server sees one request per burst of clicks. On
//! success the server's values overwrite the local ones; on failure the
//! optimistic value stays.
//!
//! The coordinator locks its own state before the shared views. Callers must
//! not hold a [`views::lock`] guard while calling into it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::{LikeApi, LikeOutcome};
use crate::error::ClientError;
use crate::toast::Toaster;
use crate::views::{self, SharedViews};

/// Quiet period after the last toggle before the request is sent.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Shown when a like update is refused by the server.
pub const LIKE_FAILED_MESSAGE: &str = "Could not update the like";

#[derive(Debug)]
enum Phase {
    Pending {
        intended: bool,
        generation: u64,
        timer: JoinHandle<()>,
    },
    InFlight,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<i64, Phase>,
    next_generation: u64,
    closed: bool,
}

/// Coordinates like toggles for every post in a set of views.
pub struct LikeCoordinator {
    api: Arc<dyn LikeApi>,
    views: SharedViews,
    toaster: Toaster,
    debounce: Duration,
    state: Mutex<State>,
}

impl LikeCoordinator {
    pub fn new(api: Arc<dyn LikeApi>, views: SharedViews, toaster: Toaster) -> Arc<Self> {
        Self::with_debounce(api, views, toaster, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(
        api: Arc<dyn LikeApi>,
        views: SharedViews,
        toaster: Toaster,
        debounce: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            api,
            views,
            toaster,
            debounce,
            state: Mutex::new(State::default()),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Toggle the like on `post_id`. Returns `false` when the toggle was
    /// ignored: request in flight, unknown post, coordinator shut down, or
    /// no tokio runtime on the calling thread.
    ///
    /// The debounce timer runs on the caller's tokio runtime. Must not be
    /// called while holding a [`views::lock`] guard on the same views.
    pub fn toggle(self: &Arc<Self>, post_id: i64) -> bool {
        let Ok(runtime) = Handle::try_current() else {
            warn!(post_id, "like toggle outside a tokio runtime; ignored");
            return false;
        };
        let mut state = self.state();
        if state.closed {
            return false;
        }
        if matches!(state.entries.get(&post_id), Some(Phase::InFlight)) {
            debug!(post_id, "like request in flight; toggle ignored");
            return false;
        }

        let intended = {
            let mut views = views::lock(&self.views);
            let Some((liked, count)) = views.like_of(post_id) else {
                debug!(post_id, "toggle for a post not in view");
                return false;
            };
            let intended = !liked;
            let count = if intended { count + 1 } else { (count - 1).max(0) };
            views.apply_like(post_id, intended, count);
            intended
        };

        if let Some(Phase::Pending { timer, .. }) = state.entries.remove(&post_id) {
            timer.abort();
        }
        let generation = state.next_generation;
        state.next_generation += 1;

        let this = Arc::clone(self);
        let timer = runtime.spawn(async move {
            tokio::time::sleep(this.debounce).await;
            this.send(post_id, generation).await;
        });
        state.entries.insert(
            post_id,
            Phase::Pending {
                intended,
                generation,
                timer,
            },
        );
        true
    }

    async fn send(&self, post_id: i64, generation: u64) {
        let intended = {
            let mut state = self.state();
            if state.closed {
                return;
            }
            let intended = match state.entries.get(&post_id) {
                Some(Phase::Pending {
                    intended,
                    generation: current,
                    ..
                }) if *current == generation => *intended,
                // Superseded by a later toggle.
                _ => return,
            };
            state.entries.insert(post_id, Phase::InFlight);
            intended
        };

        let result = self.api.set_like(post_id, intended).await;
        self.complete(post_id, result);
    }

    fn complete(&self, post_id: i64, result: Result<LikeOutcome, ClientError>) {
        let mut state = self.state();
        if state.closed {
            debug!(post_id, "like response after shutdown; ignored");
            return;
        }
        state.entries.remove(&post_id);

        match result {
            Ok(outcome) if outcome.success => {
                views::lock(&self.views).apply_like(post_id, outcome.is_liked, outcome.likes_count);
            }
            Ok(_) => {
                warn!(post_id, "like update refused");
                self.toaster.error(LIKE_FAILED_MESSAGE);
            }
            Err(ClientError::Network(e)) => {
                debug!(post_id, error = %e, "like request failed; keeping local state");
            }
            Err(e) => {
                warn!(post_id, error = %e, "like request failed");
                self.toaster.error(LIKE_FAILED_MESSAGE);
            }
        }
    }

    /// Whether a toggle on `post_id` is waiting for its timer.
    pub fn is_pending(&self, post_id: i64) -> bool {
        matches!(self.state().entries.get(&post_id), Some(Phase::Pending { .. }))
    }

    /// Whether a request for `post_id` is outstanding.
    pub fn is_in_flight(&self, post_id: i64) -> bool {
        matches!(self.state().entries.get(&post_id), Some(Phase::InFlight))
    }

    /// Cancel pending timers. Outstanding requests are not cancelled; their
    /// responses are ignored.
    pub fn shutdown(&self) {
        let mut state = self.state();
        state.closed = true;
        for (_, phase) in state.entries.drain() {
            if let Phase::Pending { timer, .. } = phase {
                timer.abort();
            }
        }
    }
}
