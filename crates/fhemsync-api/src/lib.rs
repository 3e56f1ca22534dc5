// fhemsync-api: wire protocol and WebSocket transport for FHEM's json websocket.

pub mod error;
pub mod protocol;
pub mod websocket;

pub use error::Error;
pub use protocol::{
    CommandPayload, CommandReply, DeviceEvent, GetReply, InboundMessage, ListEntry, MessageKind,
    Reading, STATE_KEY,
};
pub use websocket::{Outbound, SessionEvent, SessionRequest, run_session};
