// fhemsync-core: device-state mirror and client facade on top of fhemsync-api.

pub mod client;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod model;
pub mod notify;
pub mod router;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{BUILTIN_SUBSCRIBER, Client, SLOT_SUBSCRIBER};
pub use command::Command;
pub use config::ClientConfig;
pub use connection::ConnectionState;
pub use error::CoreError;
pub use model::{Device, DeviceChange};
pub use notify::{Notification, NotificationKind, Notifier};
pub use router::{Handler, HandlerFault, HandlerResult, Router};
pub use store::DeviceRegistry;

// Wire types consumers see in callbacks.
pub use fhemsync_api::{
    CommandReply, DeviceEvent, GetReply, InboundMessage, ListEntry, MessageKind, Reading,
};
