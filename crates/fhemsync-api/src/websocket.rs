//! WebSocket session with a FHEM server.
//!
//! [`run_session`] owns one connection from handshake to close. It reads
//! frames strictly in arrival order, decodes them into [`InboundMessage`]s
//! and hands every lifecycle step to a caller-supplied sink, all on the
//! calling task. Outbound frames are queued through an unbounded channel and
//! written by the same task, so the caller never waits on the socket. A
//! queued [`Outbound::Flush`] is acknowledged once everything queued before
//! it has been written.
//!
//! There is no reconnection here: when the session ends, it ends. Calling
//! `run_session` again is the only way back.
//!
//! # Example
//!
//! ```rust,ignore
//! use fhemsync_api::websocket::{run_session, Outbound, SessionEvent, SessionRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! let request = SessionRequest::new("192.168.1.10", 8080)?;
//! let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Outbound>();
//! let cancel = CancellationToken::new();
//!
//! run_session(request, rx, cancel, |event| {
//!     if let SessionEvent::Message(msg) = event {
//!         println!("{}", msg.kind());
//!     }
//! })
//! .await;
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::protocol::InboundMessage;

/// Sub-protocol negotiated at connect time.
pub const SUB_PROTOCOL: &str = "json";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ── SessionRequest ───────────────────────────────────────────────────

/// Where and how to open a session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub url: Url,
    pub sub_protocol: String,
    pub connect_timeout: Duration,
}

impl SessionRequest {
    /// Build a request for `ws://address:port` with the default
    /// sub-protocol and timeout.
    pub fn new(address: &str, port: u16) -> Result<Self, Error> {
        Ok(Self {
            url: endpoint_url(address, port)?,
            sub_protocol: SUB_PROTOCOL.to_owned(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    pub fn with_sub_protocol(mut self, sub_protocol: impl Into<String>) -> Self {
        self.sub_protocol = sub_protocol.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// `ws://address:port`. IPv6 literals may be given with or without brackets.
pub fn endpoint_url(address: &str, port: u16) -> Result<Url, Error> {
    let host = address.trim();
    if host.is_empty() {
        return Err(Error::InvalidAddress {
            address: address.to_owned(),
            reason: "empty host".into(),
        });
    }

    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_owned()
    };

    let url = Url::parse(&format!("ws://{host}:{port}/")).map_err(|e| Error::InvalidAddress {
        address: address.to_owned(),
        reason: e.to_string(),
    })?;

    if url.host_str().is_none() {
        return Err(Error::InvalidAddress {
            address: address.to_owned(),
            reason: "no host".into(),
        });
    }
    Ok(url)
}

// ── Outbound queue ───────────────────────────────────────────────────

/// Work queued for the session task, processed in order.
#[derive(Debug)]
pub enum Outbound {
    /// A text frame to write.
    Frame(String),
    /// Acknowledged after every earlier item has been written.
    Flush(oneshot::Sender<()>),
}

// ── SessionEvent ─────────────────────────────────────────────────────

/// One step in the life of a session, in the order it happened.
#[derive(Debug)]
pub enum SessionEvent {
    /// Handshake completed.
    Opened,
    /// A text frame arrived, before decoding.
    Received(String),
    /// A text frame decoded into a message.
    Message(InboundMessage),
    /// A text frame could not be decoded. The session continues.
    DecodeFailed(Error),
    /// Transport-level failure. Always followed by [`SessionEvent::Closed`].
    TransportError(Error),
    /// The session is over. Emitted exactly once, last.
    Closed { code: Option<u16>, reason: String },
}

// ── Session loop ─────────────────────────────────────────────────────

/// Connect, then pump frames until the peer closes, the transport fails,
/// or `cancel` fires. Returns once [`SessionEvent::Closed`] was emitted.
///
/// Frames queued on `outbound` are written as text frames. Anything still
/// queued when the session ends is discarded; pending flushes see their
/// acknowledgement sender dropped.
pub async fn run_session<F>(
    request: SessionRequest,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    cancel: CancellationToken,
    mut sink: F,
) where
    F: FnMut(SessionEvent) + Send,
{
    let closed = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::debug!("session cancelled before connect");
            local_close()
        }
        result = open(&request) => match result {
            Ok(ws_stream) => {
                sink(SessionEvent::Opened);
                pump(ws_stream, &mut outbound, &cancel, &mut sink).await
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %request.url, "WebSocket connect failed");
                sink(SessionEvent::TransportError(e));
                SessionEvent::Closed { code: None, reason: "connection failed".into() }
            }
        }
    };

    sink(closed);
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn open(request: &SessionRequest) -> Result<WsStream, Error> {
    tracing::info!(url = %request.url, sub_protocol = %request.sub_protocol, "Connecting to WebSocket");

    let uri: tungstenite::http::Uri = request
        .url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| connect_error(request, e))?;

    let client_request = ClientRequestBuilder::new(uri).with_sub_protocol(request.sub_protocol.clone());

    let timeout_ms = u64::try_from(request.connect_timeout.as_millis()).unwrap_or(u64::MAX);
    let (ws_stream, _response) =
        tokio::time::timeout(request.connect_timeout, tokio_tungstenite::connect_async(client_request))
            .await
            .map_err(|_| Error::Timeout { timeout_ms })?
            .map_err(|e| connect_error(request, e))?;

    tracing::info!("WebSocket connected");
    Ok(ws_stream)
}

fn connect_error(request: &SessionRequest, e: impl std::fmt::Display) -> Error {
    Error::WebSocketConnect {
        url: request.url.to_string(),
        reason: e.to_string(),
    }
}

/// Read/write loop of an open connection. Returns the final `Closed` event.
async fn pump<F>(
    ws_stream: WsStream,
    outbound: &mut mpsc::UnboundedReceiver<Outbound>,
    cancel: &CancellationToken,
    sink: &mut F,
) -> SessionEvent
where
    F: FnMut(SessionEvent) + Send,
{
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                if let Err(e) = write.send(tungstenite::Message::Close(None)).await {
                    tracing::debug!(error = %e, "close frame not delivered");
                }
                return local_close();
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        let text = text.as_str();
                        sink(SessionEvent::Received(text.to_owned()));
                        match InboundMessage::decode(text) {
                            Ok(message) => sink(SessionEvent::Message(message)),
                            Err(e) => {
                                tracing::debug!(error = %e, "Failed to decode frame");
                                sink(SessionEvent::DecodeFailed(e));
                            }
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let (code, reason) = frame.map_or((None, String::new()), |cf| {
                            (Some(u16::from(cf.code)), cf.reason.as_str().to_owned())
                        });
                        tracing::info!(?code, %reason, "WebSocket close frame received");
                        return SessionEvent::Closed { code, reason };
                    }
                    Some(Err(e)) => {
                        sink(SessionEvent::TransportError(Error::Transport(e.to_string())));
                        return SessionEvent::Closed { code: None, reason: "transport error".into() };
                    }
                    None => {
                        // Stream ended without a close frame
                        tracing::info!("WebSocket stream ended");
                        return SessionEvent::Closed { code: None, reason: "stream ended".into() };
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
            Some(item) = outbound.recv() => match item {
                Outbound::Frame(text) => {
                    tracing::trace!(frame = %text, "sending frame");
                    if let Err(e) = write.send(tungstenite::Message::text(text)).await {
                        sink(SessionEvent::TransportError(Error::Transport(e.to_string())));
                        return SessionEvent::Closed { code: None, reason: "write failed".into() };
                    }
                }
                Outbound::Flush(ack) => {
                    // `send` flushes each frame, so everything before is on the wire.
                    let _ = ack.send(());
                }
            },
        }
    }
}

fn local_close() -> SessionEvent {
    SessionEvent::Closed {
        code: None,
        reason: "closed locally".into(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_formats_host_and_port() {
        let url = endpoint_url("fhem.local", 8080).unwrap();
        assert_eq!(url.as_str(), "ws://fhem.local:8080/");
    }

    #[test]
    fn endpoint_url_brackets_ipv6() {
        let url = endpoint_url("::1", 8080).unwrap();
        assert_eq!(url.host_str(), Some("[::1]"));
    }

    #[test]
    fn endpoint_url_rejects_empty_host() {
        let err = endpoint_url("  ", 8080).unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { .. }));
    }

    #[test]
    fn session_request_defaults_to_json_sub_protocol() {
        let request = SessionRequest::new("127.0.0.1", 1).unwrap();
        assert_eq!(request.sub_protocol, SUB_PROTOCOL);
        assert_eq!(request.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[tokio::test]
    async fn cancelled_session_closes_without_connecting() {
        let request = SessionRequest::new("127.0.0.1", 9).unwrap();
        let (_tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut events = Vec::new();
        run_session(request, rx, cancel, |e| events.push(e)).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], SessionEvent::Closed { code: None, .. }));
    }

    #[tokio::test]
    async fn refused_connection_reports_error_then_close() {
        // Bind and drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let request = SessionRequest::new("127.0.0.1", port)
            .unwrap()
            .with_connect_timeout(Duration::from_secs(5));
        let (_tx, rx) = mpsc::unbounded_channel();

        let mut events = Vec::new();
        run_session(request, rx, CancellationToken::new(), |e| events.push(e)).await;

        assert_eq!(events.len(), 2);
        let SessionEvent::TransportError(Error::WebSocketConnect { url, .. }) = &events[0] else {
            panic!("expected connect error, got {:?}", events[0]);
        };
        assert_eq!(url, &format!("ws://127.0.0.1:{port}/"));
        assert!(matches!(events[1], SessionEvent::Closed { .. }));
    }
}
