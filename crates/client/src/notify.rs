//! User-facing notifications ("toasts").
//!
//! Client operations report outcomes through a [`Notifier`] instead of
//! printing or rendering anything themselves. Front ends plug in their own
//! sink; [`TracingNotifier`] is the default and [`ChannelNotifier`] hands
//! toasts to whoever holds the receiver.

use tokio::sync::mpsc;

/// Severity of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

/// A short message meant for the end user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

impl Toast {
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Info,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            message: message.into(),
        }
    }
}

/// Sink for toasts.
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Logs toasts through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, toast: Toast) {
        match toast.level {
            ToastLevel::Info => tracing::info!(toast = %toast.message),
            ToastLevel::Success => tracing::info!(toast = %toast.message, "success"),
            ToastLevel::Error => tracing::warn!(toast = %toast.message),
        }
    }
}

/// Forwards toasts over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Toast>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Toast>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, toast: Toast) {
        // Receiver gone means nobody is displaying toasts anymore.
        let _ = self.tx.send(toast);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_notifier_delivers_in_order() {
        let (notifier, mut rx) = ChannelNotifier::channel();
        notifier.notify(Toast::info("please log in"));
        notifier.notify(Toast::error("could not add to cart"));

        assert_eq!(rx.try_recv().unwrap(), Toast::info("please log in"));
        assert_eq!(rx.try_recv().unwrap().level, ToastLevel::Error);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_notifier_survives_dropped_receiver() {
        let (notifier, rx) = ChannelNotifier::channel();
        drop(rx);
        notifier.notify(Toast::success("added"));
    }
}
