// ── Runtime connection configuration ──
//
// Describes *how* to talk to a FHEM server. Plain data: the CLI (or any
// other caller) builds a `ClientConfig` and hands it to `Client::new`;
// core never reads config files.

use std::time::Duration;

/// Tuning knobs for a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Upper bound for the WebSocket handshake.
    pub connect_timeout: Duration,
    /// Sub-protocol requested during the handshake. FHEM expects `json`.
    pub sub_protocol: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            sub_protocol: fhemsync_api::websocket::SUB_PROTOCOL.to_owned(),
        }
    }
}
