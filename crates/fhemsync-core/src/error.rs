// ── Core error types ──
//
// User-facing errors from fhemsync-core. Consumers never see tungstenite
// or serde_json errors directly; the `From<fhemsync_api::Error>` impl
// translates wire-layer errors into domain-appropriate variants.

use thiserror::Error;

use crate::router::HandlerFault;

/// Unified error type for the core crate.
///
/// Every variant carries only owned text, so errors can be cloned into
/// error notifications and still be returned to the caller.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    /// A command was issued while no connection is in `Connected` state.
    #[error("Not connected to FHEM server")]
    NotConnected,

    #[error("Cannot connect to FHEM server at {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Connection timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    /// An inbound frame was dropped because it could not be decoded.
    #[error("Dropped malformed frame: {message}")]
    Decode { message: String, frame: String },

    // ── Handler errors ───────────────────────────────────────────────
    #[error("Handler '{subscriber}' for '{kind}' failed: {message}")]
    HandlerFault {
        kind: String,
        subscriber: String,
        message: String,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` for errors scoped to a single frame or handler;
    /// the connection itself is unaffected.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::HandlerFault { .. })
    }
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<fhemsync_api::Error> for CoreError {
    fn from(err: fhemsync_api::Error) -> Self {
        match err {
            fhemsync_api::Error::InvalidAddress { address, reason } => CoreError::Config {
                message: format!("invalid server address '{address}': {reason}"),
            },
            fhemsync_api::Error::WebSocketConnect { url, reason } => CoreError::ConnectionFailed {
                address: url,
                reason,
            },
            fhemsync_api::Error::WebSocketClosed { code, reason } => CoreError::Transport {
                message: format!("WebSocket closed (code {code}): {reason}"),
            },
            fhemsync_api::Error::Transport(message) => CoreError::Transport { message },
            fhemsync_api::Error::Timeout { timeout_ms } => CoreError::Timeout { timeout_ms },
            fhemsync_api::Error::Decode { message, frame } => CoreError::Decode { message, frame },
            fhemsync_api::Error::Encode(e) => {
                CoreError::Internal(format!("command encoding failed: {e}"))
            }
        }
    }
}

impl From<HandlerFault> for CoreError {
    fn from(fault: HandlerFault) -> Self {
        CoreError::HandlerFault {
            kind: fault.kind,
            subscriber: fault.subscriber,
            message: fault.message,
        }
    }
}
