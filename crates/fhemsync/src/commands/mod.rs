//! Command dispatch and the waiting helpers shared by handlers.

pub mod config_cmd;
pub mod control;
pub mod devices;
pub mod watch;

use std::time::Duration;

use tokio::sync::mpsc;

use fhemsync_core::{Client, ConnectionState, CoreError, NotificationKind};

use crate::cli::{Command, GlobalOpts};
use crate::config::Target;
use crate::error::CliError;

/// Route a server-bound command to its handler. `client` is connected.
pub async fn dispatch(
    cmd: Command,
    client: &Client,
    target: &Target,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let wait = Waiter::new(client, target.timeout_secs());
    match cmd {
        Command::List(args) => devices::list(client, &wait, &args, global).await,
        Command::Show(args) => devices::show(client, &wait, &args, global).await,
        Command::Set(args) => control::set(client, &args, global).await,
        Command::Get(args) => control::get(client, &wait, &args, global).await,
        Command::Cmd(args) => control::cmd(client, &wait, &args, global).await,
        Command::Watch(args) => watch::handle(client, &args, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command does not need a server connection".into(),
        )),
    }
}

// ── Connecting ───────────────────────────────────────────────────────

/// Open the connection and wait for the handshake.
///
/// The client reports the failure reason through its error callback, so
/// a temporary slot collects it while we wait.
pub async fn connect(client: &Client, target: &Target) -> Result<(), CliError> {
    let address = format!("ws://{}:{}", target.host, target.port);
    let (tx, mut errors) = mpsc::unbounded_channel();
    client.on_error(move |e| {
        let _ = tx.send(e.clone());
    });

    client.connect(&target.host, target.port).await?;

    // The session enforces the connect timeout itself; this is a backstop.
    let seconds = target.timeout_secs();
    let waited = tokio::time::timeout(
        Duration::from_secs(seconds + 1),
        client.wait_connected(),
    )
    .await;
    client.clear_callback(NotificationKind::Error);

    match waited {
        Ok(Ok(())) => {
            tracing::info!(%address, "connected");
            Ok(())
        }
        Ok(Err(_)) => Err(match failure_reason(&mut errors) {
            Some(CoreError::ConnectionFailed { reason, .. }) => {
                CliError::ConnectionFailed { address, reason }
            }
            Some(CoreError::Timeout { .. }) => CliError::Timeout {
                seconds,
                waiting_for: "the connection".into(),
            },
            Some(other) => other.into(),
            None => CliError::ConnectionFailed {
                address,
                reason: "connection closed during handshake".into(),
            },
        }),
        Err(_) => {
            client.disconnect().await;
            Err(CliError::Timeout {
                seconds,
                waiting_for: "the connection".into(),
            })
        }
    }
}

/// First collected error that concerns the connection itself.
fn failure_reason(errors: &mut mpsc::UnboundedReceiver<CoreError>) -> Option<CoreError> {
    std::iter::from_fn(|| errors.try_recv().ok()).find(|e| !e.is_recoverable())
}

// ── Waiting for replies ──────────────────────────────────────────────

/// Waits for values pushed by callbacks, bounded by the timeout and by
/// the connection staying open.
pub struct Waiter {
    state: tokio::sync::watch::Receiver<ConnectionState>,
    seconds: u64,
}

impl Waiter {
    pub fn new(client: &Client, seconds: u64) -> Self {
        Self {
            state: client.connection_state(),
            seconds,
        }
    }

    /// Next value from `rx`, or a timeout / not-connected error.
    pub async fn recv<T>(
        &self,
        rx: &mut mpsc::UnboundedReceiver<T>,
        waiting_for: &str,
    ) -> Result<T, CliError> {
        let mut state = self.state.clone();
        let closed = async move {
            let _ = state
                .wait_for(|s| *s == ConnectionState::Disconnected)
                .await;
        };

        let outcome = tokio::time::timeout(Duration::from_secs(self.seconds), async {
            tokio::select! {
                biased;
                value = rx.recv() => value,
                () = closed => None,
            }
        })
        .await;

        match outcome {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(CliError::NotConnected),
            Err(_) => Err(CliError::Timeout {
                seconds: self.seconds,
                waiting_for: waiting_for.to_owned(),
            }),
        }
    }
}
