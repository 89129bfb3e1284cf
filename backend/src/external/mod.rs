//! External collaborators: history forwarding and notifications

pub mod history_sink;
pub mod notifier;

pub use history_sink::{HistorySink, MemoryHistorySink, TracingHistorySink};
pub use notifier::{MemoryNotifier, NoopNotifier, Notification, Notifier, WebhookNotifier};
