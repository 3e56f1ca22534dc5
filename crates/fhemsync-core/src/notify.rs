// ── Notifications ──
//
// Everything the client tells the outside world goes through here: debug
// traces, errors, connection transitions, device changes and replies.
// Backed by a `Router`, so any number of subscribers can listen per kind;
// the single-slot callbacks on `Client` are one reserved subscriber.

use fhemsync_api::{CommandReply, GetReply};

use crate::error::CoreError;
use crate::model::DeviceChange;
use crate::router::{HandlerResult, Router};

/// Which notification a handler listens for.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum NotificationKind {
    Debug,
    Error,
    Connected,
    Disconnected,
    Event,
    ListComplete,
    GetReply,
    CommandReply,
}

/// A single notification, as delivered to handlers.
#[derive(Debug, Clone)]
pub enum Notification {
    /// Human-readable trace of what the connection is doing.
    Debug(String),
    Error(CoreError),
    Connected,
    Disconnected,
    /// One changed key of an applied event.
    Event(DeviceChange),
    /// The last entry of an enumeration batch was applied.
    ListComplete,
    GetReply(GetReply),
    CommandReply(CommandReply),
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::Debug(_) => NotificationKind::Debug,
            Self::Error(_) => NotificationKind::Error,
            Self::Connected => NotificationKind::Connected,
            Self::Disconnected => NotificationKind::Disconnected,
            Self::Event(_) => NotificationKind::Event,
            Self::ListComplete => NotificationKind::ListComplete,
            Self::GetReply(_) => NotificationKind::GetReply,
            Self::CommandReply(_) => NotificationKind::CommandReply,
        }
    }
}

// ── Notifier ─────────────────────────────────────────────────────────

/// Fan-out of [`Notification`]s to subscribed handlers.
#[derive(Default)]
pub struct Notifier {
    router: Router<NotificationKind, Notification>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: NotificationKind, subscriber: impl Into<String>, handler: F)
    where
        F: Fn(&Notification) -> HandlerResult + Send + Sync + 'static,
    {
        self.router.subscribe(kind, subscriber, handler);
    }

    pub fn unsubscribe(&self, kind: NotificationKind, subscriber: &str) {
        self.router.unsubscribe(&kind, subscriber);
    }

    pub fn is_subscribed(&self, kind: NotificationKind, subscriber: &str) -> bool {
        self.router.is_subscribed(&kind, subscriber)
    }

    /// Deliver `notification` to every handler of its kind.
    ///
    /// Faulty handlers are reported as `Error` notifications. Faults raised
    /// while delivering an `Error` are only logged, so a broken error
    /// handler cannot loop.
    pub fn notify(&self, notification: &Notification) {
        let kind = notification.kind();
        let faults = self.router.dispatch(&kind, notification);
        if kind == NotificationKind::Error {
            return;
        }
        for fault in faults {
            self.notify(&Notification::Error(fault.into()));
        }
    }

    pub fn debug(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("{message}");
        self.notify(&Notification::Debug(message));
    }

    pub fn error(&self, error: CoreError) {
        tracing::warn!(error = %error, "client error");
        self.notify(&Notification::Error(error));
    }
}
