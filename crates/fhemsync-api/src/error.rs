use thiserror::Error;

/// Top-level error type for the `fhemsync-api` crate.
///
/// Covers every failure mode of the wire layer: address resolution,
/// the WebSocket transport, and envelope encoding/decoding.
/// `fhemsync-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Addressing ──────────────────────────────────────────────────
    /// The server address/port pair does not form a valid `ws://` URL.
    #[error("Invalid server address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    // ── Transport ───────────────────────────────────────────────────
    /// WebSocket connection failed (refused, handshake rejected, etc.)
    #[error("WebSocket connection to {url} failed: {reason}")]
    WebSocketConnect { url: String, reason: String },

    /// WebSocket closed with an error or an abnormal close frame.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// Read or write failure on an open WebSocket.
    #[error("WebSocket transport error: {0}")]
    Transport(String),

    /// Connection attempt did not complete in time.
    #[error("Connection timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Data ────────────────────────────────────────────────────────
    /// Inbound frame is not a valid `{type, payload}` envelope, with the
    /// raw frame for debugging.
    #[error("Malformed frame: {message}")]
    Decode { message: String, frame: String },

    /// Outbound envelope could not be serialized.
    #[error("Failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if the error concerns a single frame rather than
    /// the connection.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}
