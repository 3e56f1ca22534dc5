// Integration tests for `Client` against an in-process FHEM-like
// WebSocket server.
#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;

use fhemsync_core::{Client, ClientConfig, ConnectionState, CoreError};

const WAIT: Duration = Duration::from_secs(5);

// ── Mock server ─────────────────────────────────────────────────────

enum ServerAction {
    Send(String),
    Close,
}

struct MockServer {
    port: u16,
    actions: mpsc::UnboundedSender<ServerAction>,
    received: mpsc::UnboundedReceiver<String>,
}

impl MockServer {
    /// Accept a single client speaking the `json` sub-protocol.
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (actions, mut action_rx) = mpsc::unbounded_channel();
        let (received_tx, received) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = |_req: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
                response
                    .headers_mut()
                    .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static("json"));
                Ok(response)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .unwrap();

            loop {
                tokio::select! {
                    frame = ws.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            let _ = received_tx.send(text.as_str().to_owned());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(_)) | None => break,
                    },
                    Some(action) = action_rx.recv() => match action {
                        ServerAction::Send(text) => ws.send(Message::text(text)).await.unwrap(),
                        ServerAction::Close => {
                            let _ = ws.close(None).await;
                        }
                    },
                }
            }
        });

        Self {
            port,
            actions,
            received,
        }
    }

    fn send(&self, frame: Value) {
        self.actions.send(ServerAction::Send(frame.to_string())).unwrap();
    }

    fn send_raw(&self, frame: &str) {
        self.actions.send(ServerAction::Send(frame.to_owned())).unwrap();
    }

    fn close(&self) {
        self.actions.send(ServerAction::Close).unwrap();
    }

    async fn next_frame(&mut self) -> Value {
        let text = tokio::time::timeout(WAIT, self.received.recv())
            .await
            .unwrap()
            .unwrap();
        serde_json::from_str(&text).unwrap()
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

async fn connected_client(server: &MockServer) -> Client {
    let client = Client::new(ClientConfig::default());
    client.connect("127.0.0.1", server.port).await.unwrap();
    tokio::time::timeout(WAIT, client.wait_connected())
        .await
        .unwrap()
        .unwrap();
    client
}

/// Wait until the registry has seen at least `revision` mutations.
async fn wait_for_revision(client: &Client, revision: u64) {
    let mut rx = client.registry().subscribe();
    tokio::time::timeout(WAIT, rx.wait_for(|rev| *rev >= revision))
        .await
        .unwrap()
        .unwrap();
}

async fn wait_for_state(client: &Client, state: ConnectionState) {
    let mut rx = client.connection_state();
    tokio::time::timeout(WAIT, rx.wait_for(|s| *s == state))
        .await
        .unwrap()
        .unwrap();
}

fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, Arc<Mutex<Vec<T>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    (Arc::clone(&log), log)
}

// ── Connection lifecycle ────────────────────────────────────────────

#[tokio::test]
async fn connect_reports_open_through_callbacks() {
    let server = MockServer::start().await;
    let client = Client::new(ClientConfig::default());

    let (debug_sink, debug_log) = recorder::<String>();
    client.on_debug(move |m| debug_sink.lock().unwrap().push(m.to_owned()));
    let (conn_sink, connected) = recorder::<()>();
    client.on_connected(move || conn_sink.lock().unwrap().push(()));

    client.connect("127.0.0.1", server.port).await.unwrap();
    tokio::time::timeout(WAIT, client.wait_connected())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(connected.lock().unwrap().len(), 1);
    assert!(
        debug_log
            .lock()
            .unwrap()
            .iter()
            .any(|m| m == "Connection opened to fhem server!")
    );
}

#[tokio::test]
async fn refused_connection_ends_disconnected_with_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = Client::new(ClientConfig::default());
    let (err_sink, errors) = recorder::<String>();
    client.on_error(move |e| err_sink.lock().unwrap().push(e.to_string()));

    client.connect("127.0.0.1", port).await.unwrap();
    let result = tokio::time::timeout(WAIT, client.wait_connected())
        .await
        .unwrap();

    assert!(matches!(result, Err(CoreError::NotConnected)));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn local_disconnect_fires_callback_and_keeps_registry() {
    let server = MockServer::start().await;
    let client = connected_client(&server).await;

    let (sink, disconnects) = recorder::<()>();
    client.on_disconnected(move || sink.lock().unwrap().push(()));

    server.send(json!({
        "type": "event",
        "payload": { "name": "Lamp1", "time": "2024-05-01 10:00:00", "changed": { "STATE": "on" } }
    }));
    wait_for_revision(&client, 1).await;

    client.disconnect().await;

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(disconnects.lock().unwrap().len(), 1);
    assert_eq!(client.device("Lamp1").unwrap().state(), Some("on"));

    // A second disconnect has nothing to close.
    client.disconnect().await;
    assert_eq!(disconnects.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn connect_while_connected_replaces_session() {
    let first = MockServer::start().await;
    let mut second = MockServer::start().await;
    let client = connected_client(&first).await;

    let (disc_sink, events) = recorder::<&'static str>();
    let conn_sink = Arc::clone(&disc_sink);
    client.on_disconnected(move || disc_sink.lock().unwrap().push("disconnected"));
    client.on_connected(move || conn_sink.lock().unwrap().push("connected"));

    client.connect("127.0.0.1", second.port).await.unwrap();
    tokio::time::timeout(WAIT, client.wait_connected())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(*events.lock().unwrap(), vec!["disconnected", "connected"]);
    assert_eq!(client.state(), ConnectionState::Connected);

    client.set("Lamp1", "pct", "50").unwrap();
    assert_eq!(
        second.next_frame().await,
        json!({ "type": "command", "payload": { "command": "set Lamp1 pct 50" } })
    );
}

#[tokio::test]
async fn peer_close_transitions_to_disconnected() {
    let server = MockServer::start().await;
    let client = connected_client(&server).await;

    let (sink, disconnects) = recorder::<()>();
    client.on_disconnected(move || sink.lock().unwrap().push(()));

    server.close();
    wait_for_state(&client, ConnectionState::Disconnected).await;

    assert_eq!(disconnects.lock().unwrap().len(), 1);
    assert!(matches!(
        client.list(".*"),
        Err(CoreError::NotConnected)
    ));
}

#[tokio::test]
async fn shutdown_clears_registry() {
    let server = MockServer::start().await;
    let client = connected_client(&server).await;

    server.send(json!({
        "type": "event",
        "payload": { "name": "Lamp1", "time": "t", "changed": { "STATE": "on" } }
    }));
    wait_for_revision(&client, 1).await;

    client.shutdown().await;
    assert!(client.registry().is_empty());
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

// ── Inbound ─────────────────────────────────────────────────────────

#[tokio::test]
async fn enumeration_fills_registry_and_completes_on_last_index() {
    let server = MockServer::start().await;
    let client = connected_client(&server).await;

    let (sink, completions) = recorder::<usize>();
    let registry = Arc::clone(client.registry());
    client.on_list_complete(move || sink.lock().unwrap().push(registry.len()));

    server.send(json!({
        "type": "listentry",
        "payload": {
            "name": "Lamp2", "index": 1, "num": 2,
            "internals": { "STATE": "off" }, "readings": {}, "attributes": { "room": "Hall" },
            "sets": {}, "gets": {}, "attrList": "room alias"
        }
    }));
    server.send(json!({
        "type": "listentry",
        "payload": {
            "name": "Lamp1", "index": 0, "num": 2,
            "internals": { "STATE": "on" }, "readings": {}, "attributes": {},
            "sets": {}, "gets": {}, "attrList": []
        }
    }));
    wait_for_revision(&client, 2).await;

    // Completion fired on the Lamp2 entry, before Lamp1 arrived.
    assert_eq!(*completions.lock().unwrap(), vec![1]);
    assert_eq!(client.registry().device_names(), vec!["Lamp1", "Lamp2"]);
    let lamp2 = client.device("Lamp2").unwrap();
    assert_eq!(lamp2.attribute("room"), Some("Hall"));
    assert_eq!(lamp2.attribute_list, vec!["room", "alias"]);
}

#[tokio::test]
async fn malformed_frame_is_reported_and_dropped() {
    let server = MockServer::start().await;
    let client = connected_client(&server).await;

    let (sink, errors) = recorder::<bool>();
    client.on_error(move |e| sink.lock().unwrap().push(matches!(e, CoreError::Decode { .. })));

    server.send_raw("this is not json");
    server.send(json!({
        "type": "event",
        "payload": { "name": "Lamp1", "time": "t", "changed": { "pct": "10" } }
    }));
    wait_for_revision(&client, 1).await;

    assert_eq!(*errors.lock().unwrap(), vec![true]);
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(
        client.device("Lamp1").unwrap().reading("pct").unwrap().value,
        "10"
    );
}

#[tokio::test]
async fn unknown_message_types_reach_external_subscribers_only() {
    let server = MockServer::start().await;
    let client = connected_client(&server).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.messages().subscribe(
        fhemsync_core::MessageKind::Other("heartbeat".into()),
        "monitor",
        move |msg: &fhemsync_core::InboundMessage| {
            let _ = tx.send(msg.kind().to_string());
            Ok(())
        },
    );

    server.send(json!({ "type": "heartbeat", "payload": {} }));

    let kind = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(kind, "heartbeat");
    assert!(client.registry().is_empty());
}

// ── Outbound ────────────────────────────────────────────────────────

#[tokio::test]
async fn commands_are_framed_as_command_envelopes() {
    let mut server = MockServer::start().await;
    let client = connected_client(&server).await;

    client.set("Lamp1", "pct", "50").unwrap();
    assert_eq!(
        server.next_frame().await,
        json!({ "type": "command", "payload": { "command": "set Lamp1 pct 50" } })
    );

    client.get("Lamp1", "state").unwrap();
    assert_eq!(
        server.next_frame().await,
        json!({
            "type": "command",
            "payload": { "command": "get", "device": "Lamp1", "property": "state" }
        })
    );

    client.subscribe_event("ui", ".*", "Lamp.*", ".*").unwrap();
    assert_eq!(
        server.next_frame().await,
        json!({
            "type": "command",
            "payload": {
                "command": "subscribe", "arg": "ui",
                "type": ".*", "name": "Lamp.*", "changed": ".*"
            }
        })
    );

    client.unsubscribe_event("ui").unwrap();
    assert_eq!(
        server.next_frame().await,
        json!({ "type": "command", "payload": { "command": "unsubscribe", "arg": "ui" } })
    );

    client.list("room=Kitchen").unwrap();
    assert_eq!(
        server.next_frame().await,
        json!({ "type": "command", "payload": { "command": "list", "arg": "room=Kitchen" } })
    );

    client.send_command("version").unwrap();
    assert_eq!(
        server.next_frame().await,
        json!({ "type": "command", "payload": { "command": "version" } })
    );
}

#[tokio::test]
async fn get_reply_round_trip() {
    let mut server = MockServer::start().await;
    let client = connected_client(&server).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on_get_reply(move |r| {
        let _ = tx.send((r.device.clone(), r.property.clone(), r.value.clone()));
    });

    client.get("Lamp1", "state").unwrap();
    let request = server.next_frame().await;
    assert_eq!(request["payload"]["command"], "get");

    server.send(json!({
        "type": "getreply",
        "payload": { "device": "Lamp1", "property": "state", "value": "on" }
    }));

    let reply = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(reply, ("Lamp1".into(), "state".into(), "on".into()));
}

#[tokio::test]
async fn flush_before_disconnect_delivers_queued_commands() {
    let mut server = MockServer::start().await;
    let client = connected_client(&server).await;

    client.set("Lamp1", "state", "off").unwrap();
    client.flush().await.unwrap();
    client.disconnect().await;

    assert_eq!(
        server.next_frame().await,
        json!({ "type": "command", "payload": { "command": "set Lamp1 state off" } })
    );
    assert!(matches!(client.flush().await, Err(CoreError::NotConnected)));
}
