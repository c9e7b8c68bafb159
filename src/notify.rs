//! Messages meant for the person operating the host system.

/// Fire-and-forget channel for user-visible messages.
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
}

/// Sends notifications to the log. Used when the host supplies nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn error(&self, message: &str) {
        tracing::error!(target: "shorthand_sync::notify", "{}", message);
    }
}
