// ── Client facade ──
//
// Composes the registry, the inbound message router, the notifier and the
// connection manager into the one type consumers hold. Built-in handlers
// under the `fhem` subscriber id keep the registry in sync; callback slots
// are a reserved `slot` subscriber on the notifier.

use std::sync::Arc;

use tokio::sync::watch;

use fhemsync_api::{CommandReply, GetReply, InboundMessage, MessageKind};

use crate::command::Command;
use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::CoreError;
use crate::model::{Device, DeviceChange};
use crate::notify::{Notification, NotificationKind, Notifier};
use crate::router::Router;
use crate::store::DeviceRegistry;

/// Subscriber id of the handlers that maintain the registry.
pub const BUILTIN_SUBSCRIBER: &str = "fhem";

/// Subscriber id behind the single-slot `on_*` callbacks.
pub const SLOT_SUBSCRIBER: &str = "slot";

/// Command text FHEM uses for replies to commands it does not support.
const UNIMPLEMENTED_REPLY: &str = "not implemented yet";

// ── Client ───────────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ClientInner>`. Construct with [`Client::new`],
/// install callbacks, then [`connect`](Self::connect). The registry starts
/// empty and survives disconnects; only [`shutdown`](Self::shutdown)
/// clears it.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    registry: Arc<DeviceRegistry>,
    messages: Arc<Router<MessageKind, InboundMessage>>,
    notifier: Arc<Notifier>,
    connection: ConnectionManager,
}

impl Client {
    /// Create a disconnected client with the built-in handlers installed.
    pub fn new(config: ClientConfig) -> Self {
        let registry = Arc::new(DeviceRegistry::new());
        let messages = Arc::new(Router::new());
        let notifier = Arc::new(Notifier::new());

        register_builtins(&messages, &registry, &notifier);

        let connection =
            ConnectionManager::new(config, Arc::clone(&messages), Arc::clone(&notifier));

        Self {
            inner: Arc::new(ClientInner {
                registry,
                messages,
                notifier,
                connection,
            }),
        }
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Connect to `ws://address:port`, replacing any open connection.
    pub async fn connect(&self, address: &str, port: u16) -> Result<(), CoreError> {
        self.inner.connection.connect(address, port).await
    }

    /// Close the connection. Safe to call when not connected.
    pub async fn disconnect(&self) {
        self.inner.connection.disconnect().await;
    }

    /// Disconnect and forget every mirrored device.
    pub async fn shutdown(&self) {
        self.inner.connection.disconnect().await;
        self.inner.registry.clear();
    }

    /// Wait for the pending connection attempt to resolve.
    pub async fn wait_connected(&self) -> Result<(), CoreError> {
        self.inner.connection.wait_connected().await
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.subscribe_state()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Send one command. Fails with [`CoreError::NotConnected`] when the
    /// connection is not open; nothing is queued in that case.
    pub fn execute(&self, command: Command) -> Result<(), CoreError> {
        self.inner.connection.send(&command.into_payload())
    }

    pub fn subscribe_event(
        &self,
        id: &str,
        device_type: &str,
        name: &str,
        changed: &str,
    ) -> Result<(), CoreError> {
        self.execute(Command::SubscribeEvents {
            id: id.to_owned(),
            device_type: device_type.to_owned(),
            name: name.to_owned(),
            changed: changed.to_owned(),
        })
    }

    pub fn unsubscribe_event(&self, id: &str) -> Result<(), CoreError> {
        self.execute(Command::UnsubscribeEvents { id: id.to_owned() })
    }

    pub fn list(&self, devspec: &str) -> Result<(), CoreError> {
        self.execute(Command::List {
            devspec: devspec.to_owned(),
        })
    }

    pub fn set(&self, device: &str, property: &str, value: &str) -> Result<(), CoreError> {
        self.execute(Command::Set {
            device: device.to_owned(),
            property: property.to_owned(),
            value: value.to_owned(),
        })
    }

    pub fn get(&self, device: &str, property: &str) -> Result<(), CoreError> {
        self.execute(Command::Get {
            device: device.to_owned(),
            property: property.to_owned(),
        })
    }

    pub fn send_command(&self, command: &str) -> Result<(), CoreError> {
        self.execute(Command::Raw(command.to_owned()))
    }

    /// Wait until every command sent so far has been written to the socket.
    /// Useful before a `disconnect`, which discards anything still queued.
    pub async fn flush(&self) -> Result<(), CoreError> {
        self.inner.connection.flush().await
    }

    // ── State access ─────────────────────────────────────────────────

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.inner.registry
    }

    pub fn device(&self, name: &str) -> Option<Arc<Device>> {
        self.inner.registry.device(name)
    }

    /// Inbound message router. Extra subscribers may listen to any
    /// message kind, including ones the client does not handle itself.
    pub fn messages(&self) -> &Router<MessageKind, InboundMessage> {
        &self.inner.messages
    }

    /// Notification router behind the callback slots.
    pub fn notifications(&self) -> &Notifier {
        &self.inner.notifier
    }

    // ── Callback slots ───────────────────────────────────────────────

    pub fn on_debug<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.set_slot(NotificationKind::Debug, move |n| {
            if let Notification::Debug(message) = n {
                callback(message);
            }
        });
    }

    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&CoreError) + Send + Sync + 'static,
    {
        self.set_slot(NotificationKind::Error, move |n| {
            if let Notification::Error(error) = n {
                callback(error);
            }
        });
    }

    pub fn on_connected<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.set_slot(NotificationKind::Connected, move |_| callback());
    }

    pub fn on_disconnected<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.set_slot(NotificationKind::Disconnected, move |_| callback());
    }

    /// Called once per changed key of every applied event.
    pub fn on_event<F>(&self, callback: F)
    where
        F: Fn(&DeviceChange) + Send + Sync + 'static,
    {
        self.set_slot(NotificationKind::Event, move |n| {
            if let Notification::Event(change) = n {
                callback(change);
            }
        });
    }

    /// Called when the entry with `index + 1 == num` of an enumeration
    /// has been applied.
    pub fn on_list_complete<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.set_slot(NotificationKind::ListComplete, move |_| callback());
    }

    pub fn on_get_reply<F>(&self, callback: F)
    where
        F: Fn(&GetReply) + Send + Sync + 'static,
    {
        self.set_slot(NotificationKind::GetReply, move |n| {
            if let Notification::GetReply(reply) = n {
                callback(reply);
            }
        });
    }

    pub fn on_command_reply<F>(&self, callback: F)
    where
        F: Fn(&CommandReply) + Send + Sync + 'static,
    {
        self.set_slot(NotificationKind::CommandReply, move |n| {
            if let Notification::CommandReply(reply) = n {
                callback(reply);
            }
        });
    }

    /// Empty the slot for `kind`. Notifications of that kind are then
    /// ignored unless another subscriber listens.
    pub fn clear_callback(&self, kind: NotificationKind) {
        self.inner.notifier.unsubscribe(kind, SLOT_SUBSCRIBER);
    }

    fn set_slot<F>(&self, kind: NotificationKind, handler: F)
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.inner
            .notifier
            .subscribe(kind, SLOT_SUBSCRIBER, move |n: &Notification| {
                handler(n);
                Ok(())
            });
    }
}

// ── Built-in handlers ────────────────────────────────────────────────

fn register_builtins(
    messages: &Router<MessageKind, InboundMessage>,
    registry: &Arc<DeviceRegistry>,
    notifier: &Arc<Notifier>,
) {
    {
        let registry = Arc::clone(registry);
        let notifier = Arc::clone(notifier);
        messages.subscribe(MessageKind::Event, BUILTIN_SUBSCRIBER, move |msg| {
            if let InboundMessage::Event(event) = msg {
                for change in registry.apply_event(event) {
                    notifier.notify(&Notification::Event(change));
                }
            }
            Ok(())
        });
    }

    {
        let registry = Arc::clone(registry);
        let notifier = Arc::clone(notifier);
        messages.subscribe(MessageKind::ListEntry, BUILTIN_SUBSCRIBER, move |msg| {
            if let InboundMessage::ListEntry(entry) = msg {
                if registry.apply_list_entry(entry) {
                    notifier.notify(&Notification::ListComplete);
                }
            }
            Ok(())
        });
    }

    {
        let notifier = Arc::clone(notifier);
        messages.subscribe(MessageKind::GetReply, BUILTIN_SUBSCRIBER, move |msg| {
            if let InboundMessage::GetReply(reply) = msg {
                notifier.notify(&Notification::GetReply(reply.clone()));
            }
            Ok(())
        });
    }

    {
        let notifier = Arc::clone(notifier);
        messages.subscribe(MessageKind::CommandReply, BUILTIN_SUBSCRIBER, move |msg| {
            if let InboundMessage::CommandReply(reply) = msg {
                if reply.command == UNIMPLEMENTED_REPLY {
                    tracing::debug!("ignoring placeholder command reply");
                } else {
                    notifier.notify(&Notification::CommandReply(reply.clone()));
                }
            }
            Ok(())
        });
    }
}

// ── Tests ────────────────────────────────────────────────────────────
