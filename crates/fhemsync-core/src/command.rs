// ── Command API ──
//
// Every outbound intent is a `Command`. Each variant becomes exactly one
// `{type: "command", payload}` envelope; nothing waits for a reply.

use fhemsync_api::CommandPayload;

/// All operations a client can send to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // ── Event subscriptions ──────────────────────────────────────────
    /// Ask the server to push events matching the filters under `id`.
    SubscribeEvents {
        id: String,
        device_type: String,
        name: String,
        changed: String,
    },
    UnsubscribeEvents {
        id: String,
    },

    // ── Device access ────────────────────────────────────────────────
    /// Enumerate devices matching a FHEM devspec.
    List {
        devspec: String,
    },
    Set {
        device: String,
        property: String,
        value: String,
    },
    Get {
        device: String,
        property: String,
    },

    /// Arbitrary FHEM command line.
    Raw(String),
}

impl Command {
    pub fn into_payload(self) -> CommandPayload {
        match self {
            Self::SubscribeEvents {
                id,
                device_type,
                name,
                changed,
            } => CommandPayload::subscribe(&id, &device_type, &name, &changed),
            Self::UnsubscribeEvents { id } => CommandPayload::unsubscribe(&id),
            Self::List { devspec } => CommandPayload::list(&devspec),
            Self::Set {
                device,
                property,
                value,
            } => CommandPayload::set(&device, &property, &value),
            Self::Get { device, property } => CommandPayload::get(&device, &property),
            Self::Raw(command) => CommandPayload::raw(command),
        }
    }
}
