//! Operational notifications
//!
//! Every cycle start/success/failure emits a fire-and-forget message on a
//! named channel. The consumer (chat bot, alerting, plain logs) is an
//! external collaborator; the engine never waits on it.

/// Sink for operational notifications
pub trait Notifier: Send + Sync {
    /// Routine message on a named channel
    fn notify(&self, channel: &str, message: &str);

    /// Operator-visible alert; defaults to a plain notification
    fn alert(&self, channel: &str, message: &str) {
        self.notify(channel, message);
    }
}

/// Default notifier writing through the log facade
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, channel: &str, message: &str) {
        log::info!("[{}] {}", channel, message);
    }

    fn alert(&self, channel: &str, message: &str) {
        log::warn!("[{}] {}", channel, message);
    }
}
