//! User-facing notifications, delivered over a channel to the UI.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

/// Display time of a plain toast.
pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

/// Button attached to a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToastAction {
    /// Restore a just-deleted post.
    UndoDelete { post_id: i64, label: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
    pub duration: Duration,
    pub action: Option<ToastAction>,
}

impl Toast {
    pub fn new(kind: ToastKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            duration: DEFAULT_TOAST_DURATION,
            action: None,
        }
    }

    pub fn with_action(mut self, action: ToastAction, duration: Duration) -> Self {
        self.action = Some(action);
        self.duration = duration;
        self
    }
}

/// Sending half of the toast channel.
#[derive(Debug, Clone)]
pub struct Toaster {
    tx: mpsc::UnboundedSender<Toast>,
}

impl Toaster {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Toast>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn show(&self, toast: Toast) {
        if self.tx.send(toast).is_err() {
            debug!("toast dropped; no receiver");
        }
    }

    pub fn success(&self, message: impl Into<String>) {
        self.show(Toast::new(ToastKind::Success, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.show(Toast::new(ToastKind::Error, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn toasts_arrive_in_order() {
        let (toaster, mut rx) = Toaster::channel();
        toaster.success("saved");
        toaster.error("failed");

        assert_eq!(rx.recv().await.unwrap().kind, ToastKind::Success);
        let err = rx.recv().await.unwrap();
        assert_eq!(err.kind, ToastKind::Error);
        assert_eq!(err.message, "failed");
        assert!(err.action.is_none());
    }

    #[test]
    fn show_without_receiver_is_harmless() {
        let (toaster, rx) = Toaster::channel();
        drop(rx);
        toaster.error("nobody listening");
    }
}
