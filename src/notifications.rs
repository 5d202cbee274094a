use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub const MISSING_CREDENTIAL_MESSAGE: &str =
    "Gemini API key is not configured. Add it in Settings to use the assistant.";
pub const REQUEST_FAILED_MESSAGE: &str =
    "The assistant could not generate a response. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Error,
    Warning,
    Success,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    MissingCredential,
    RequestFailed,
    Validation,
    Generated,
}

/// A transient toast shown by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn missing_credential() -> Self {
        Self {
            level: NotificationLevel::Error,
            kind: NotificationKind::MissingCredential,
            message: MISSING_CREDENTIAL_MESSAGE.to_string(),
        }
    }

    pub fn request_failed() -> Self {
        Self {
            level: NotificationLevel::Error,
            kind: NotificationKind::RequestFailed,
            message: REQUEST_FAILED_MESSAGE.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Warning,
            kind: NotificationKind::Validation,
            message: message.into(),
        }
    }

    pub fn generated(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            kind: NotificationKind::Generated,
            message: message.into(),
        }
    }
}

/// Fan-out point for toasts. Cloning shares the same channel; a notifier
/// without a channel only logs.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    sender: Option<mpsc::UnboundedSender<Notification>>,
}

impl Notifier {
    pub fn new(sender: mpsc::UnboundedSender<Notification>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn notify(&self, notification: Notification) {
        tracing::debug!(
            kind = ?notification.kind,
            level = ?notification.level,
            "notification: {}",
            notification.message
        );

        if let Some(sender) = &self.sender {
            // Receiver is dropped once the UI unmounts.
            let _ = sender.send(notification);
        }
    }
}

#[cfg(test)]
pub(crate) fn drain(receiver: &mut mpsc::UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut collected = Vec::new();
    while let Ok(notification) = receiver.try_recv() {
        collected.push(notification);
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn notifications_reach_the_channel_in_order() {
        let (notifier, mut receiver) = Notifier::channel();
        notifier.notify(Notification::validation("Add at least one activity."));
        notifier.notify(Notification::request_failed());

        let received = drain(&mut receiver);
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].kind, NotificationKind::Validation);
        assert_eq!(received[1].message, REQUEST_FAILED_MESSAGE);
    }

    #[test]
    fn notify_without_listener_does_not_panic() {
        let (notifier, receiver) = Notifier::channel();
        drop(receiver);
        notifier.notify(Notification::missing_credential());
        Notifier::silent().notify(Notification::missing_credential());
    }

    #[test]
    fn notification_serializes_with_snake_case_tags() {
        let value = serde_json::to_value(Notification::missing_credential())
            .expect("notification should serialize");
        assert_eq!(value.get("kind").and_then(Value::as_str), Some("missing_credential"));
        assert_eq!(value.get("level").and_then(Value::as_str), Some("error"));
    }
}
