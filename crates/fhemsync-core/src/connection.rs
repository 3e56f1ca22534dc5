// ── Connection manager ──
//
// Owns the socket lifecycle: one session task per connection, a
// `Disconnected -> Connecting -> Connected -> Disconnected` state machine
// published over `watch`, and the outbound queue into the session.
// No reconnection: once a session closes, only `connect()` opens another.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fhemsync_api::{
    CommandPayload, InboundMessage, MessageKind, Outbound, SessionEvent, SessionRequest,
    run_session,
};

use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::notify::{Notification, Notifier};
use crate::router::Router;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// ── ConnectionManager ────────────────────────────────────────────

pub struct ConnectionManager {
    config: ClientConfig,
    shared: Arc<Shared>,
    session: tokio::sync::Mutex<Option<ActiveSession>>,
}

/// State the session task writes to while it runs.
struct Shared {
    state: watch::Sender<ConnectionState>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
    messages: Arc<Router<MessageKind, InboundMessage>>,
    notifier: Arc<Notifier>,
}

struct ActiveSession {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ConnectionManager {
    pub fn new(
        config: ClientConfig,
        messages: Arc<Router<MessageKind, InboundMessage>>,
        notifier: Arc<Notifier>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            shared: Arc::new(Shared {
                state,
                outbound: Mutex::new(None),
                messages,
                notifier,
            }),
            session: tokio::sync::Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Open a connection to `ws://address:port`.
    ///
    /// Any existing session is shut down first. Returns once the session
    /// task is running; the handshake completes in the background and is
    /// signalled by the `Connected` notification (or awaited with
    /// [`wait_connected`](Self::wait_connected)).
    pub async fn connect(&self, address: &str, port: u16) -> Result<(), CoreError> {
        let request = match SessionRequest::new(address, port) {
            Ok(request) => request
                .with_sub_protocol(self.config.sub_protocol.clone())
                .with_connect_timeout(self.config.connect_timeout),
            Err(e) => {
                let err = CoreError::from(e);
                self.shared.notifier.error(err.clone());
                return Err(err);
            }
        };

        let mut session = self.session.lock().await;
        if let Some(active) = session.take() {
            debug!("replacing active session");
            shutdown(active).await;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.outbound_slot() = Some(tx);
        self.shared.state.send_replace(ConnectionState::Connecting);
        info!(url = %request.url, "connecting");

        let cancel = CancellationToken::new();
        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(run_session(request, rx, cancel.clone(), move |event| {
            shared.on_session_event(event);
        }));

        *session = Some(ActiveSession { cancel, task });
        Ok(())
    }

    /// Close the active connection and wait for the session to finish.
    /// No-op when nothing is open.
    pub async fn disconnect(&self) {
        let Some(active) = self.session.lock().await.take() else {
            return;
        };
        shutdown(active).await;
        debug!("disconnected");
    }

    /// Wait until the pending connection attempt resolves.
    ///
    /// Returns `Ok` once `Connected`; `NotConnected` if the attempt ended
    /// in `Disconnected` instead.
    pub async fn wait_connected(&self) -> Result<(), CoreError> {
        let mut rx = self.shared.state.subscribe();
        let state = rx
            .wait_for(|s| *s != ConnectionState::Connecting)
            .await
            .map_err(|_| CoreError::Internal("connection state channel closed".into()))?;
        match *state {
            ConnectionState::Connected => Ok(()),
            _ => Err(CoreError::NotConnected),
        }
    }

    // ── Outbound ─────────────────────────────────────────────────

    /// Queue one envelope for the session task to write.
    ///
    /// Fails with [`CoreError::NotConnected`] unless the state is
    /// `Connected`; the failure is also reported as an error notification.
    pub fn send(&self, payload: &CommandPayload) -> Result<(), CoreError> {
        let result = self.try_send(payload);
        if let Err(e) = &result {
            self.shared.notifier.error(e.clone());
        }
        result
    }

    fn try_send(&self, payload: &CommandPayload) -> Result<(), CoreError> {
        if self.state() != ConnectionState::Connected {
            return Err(CoreError::NotConnected);
        }
        let frame = payload.encode()?;
        debug!(command = %payload.command, "sending command");
        self.enqueue(Outbound::Frame(frame))
    }

    /// Wait until every envelope sent so far has been written to the socket.
    ///
    /// Fails with [`CoreError::NotConnected`] if there is no session or it
    /// ends before reaching the flush.
    pub async fn flush(&self) -> Result<(), CoreError> {
        let (ack, done) = oneshot::channel();
        self.enqueue(Outbound::Flush(ack))?;
        done.await.map_err(|_| CoreError::NotConnected)
    }

    fn enqueue(&self, item: Outbound) -> Result<(), CoreError> {
        let outbound = self.shared.outbound_slot();
        let tx = outbound.as_ref().ok_or(CoreError::NotConnected)?;
        tx.send(item).map_err(|_| CoreError::NotConnected)
    }
}

async fn shutdown(active: ActiveSession) {
    active.cancel.cancel();
    if let Err(e) = active.task.await {
        warn!(error = %e, "session task ended abnormally");
    }
}

// ── Session event handling ───────────────────────────────────────

impl Shared {
    fn outbound_slot(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Outbound>>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_session_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Opened => {
                self.state.send_replace(ConnectionState::Connected);
                self.notifier.debug("Connection opened to fhem server!");
                self.notifier.notify(&Notification::Connected);
            }
            SessionEvent::Received(frame) => {
                self.notifier.debug(format!("receiving data: {frame}"));
            }
            SessionEvent::Message(message) => {
                let kind = message.kind();
                self.notifier.debug(format!("receiving message: {kind}"));
                for fault in self.messages.dispatch(&kind, &message) {
                    self.notifier.error(fault.into());
                }
            }
            SessionEvent::DecodeFailed(e) | SessionEvent::TransportError(e) => {
                if e.is_decode() {
                    warn!(error = %e, "dropping malformed frame");
                } else {
                    debug!(error = %e, "transport error");
                }
                self.notifier.error(e.into());
            }
            SessionEvent::Closed { code, reason } => {
                self.outbound_slot().take();
                self.state.send_replace(ConnectionState::Disconnected);
                info!(?code, %reason, "session closed");
                self.notifier.debug("Connection closed to fhem server!");
                self.notifier.notify(&Notification::Disconnected);
            }
        }
    }
}
