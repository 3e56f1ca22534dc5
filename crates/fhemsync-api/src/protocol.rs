//! FHEM json websocket protocol.
//!
//! Every frame in either direction is an envelope of the shape
//! `{ "type": <string>, "payload": <object> }`. Outbound frames always carry
//! `type: "command"`; inbound frames are decoded once, here, into the closed
//! [`InboundMessage`] union so nothing downstream branches on type strings.
//!
//! The server is a Perl module and is loose about JSON scalar types: counts
//! may arrive as strings and reading values as numbers. Map values are
//! normalised to strings on the way in (see [`lenient`]).

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// `type` of every outbound envelope.
pub const OUTBOUND_TYPE: &str = "command";

/// Internal key routed to `internals` instead of `readings` by events.
pub const STATE_KEY: &str = "STATE";

// ── Message kinds ────────────────────────────────────────────────────

/// Inbound message type, as carried in the envelope's `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Event,
    ListEntry,
    GetReply,
    CommandReply,
    /// Any type this crate has no payload shape for.
    Other(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Event => "event",
            Self::ListEntry => "listentry",
            Self::GetReply => "getreply",
            Self::CommandReply => "commandreply",
            Self::Other(kind) => kind,
        }
    }
}

impl From<&str> for MessageKind {
    fn from(kind: &str) -> Self {
        match kind {
            "event" => Self::Event,
            "listentry" => Self::ListEntry,
            "getreply" => Self::GetReply,
            "commandreply" => Self::CommandReply,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Inbound payloads ─────────────────────────────────────────────────

/// A timestamped reading value. `time` is the server's event time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(alias = "Value", default, deserialize_with = "lenient::string")]
    pub value: String,
    #[serde(alias = "Time", default, deserialize_with = "lenient::string")]
    pub time: String,
}

impl Reading {
    pub fn new(value: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            time: time.into(),
        }
    }
}

/// Push notification that some internals/readings of a device changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEvent {
    #[serde(alias = "deviceName")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub time: String,
    #[serde(default, deserialize_with = "lenient::string_map")]
    pub changed: IndexMap<String, String>,
}

/// One device's full snapshot within a `list` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntry {
    #[serde(alias = "deviceName")]
    pub name: String,
    /// Zero-based position within the batch.
    #[serde(deserialize_with = "lenient::count")]
    pub index: usize,
    /// Number of entries in the batch.
    #[serde(alias = "total", deserialize_with = "lenient::count")]
    pub num: usize,
    #[serde(default, deserialize_with = "lenient::string_map")]
    pub internals: IndexMap<String, String>,
    #[serde(default, deserialize_with = "lenient::readings")]
    pub readings: IndexMap<String, Reading>,
    #[serde(default, deserialize_with = "lenient::string_map")]
    pub attributes: IndexMap<String, String>,
    #[serde(default, deserialize_with = "lenient::string_map")]
    pub sets: IndexMap<String, String>,
    #[serde(default, deserialize_with = "lenient::string_map")]
    pub gets: IndexMap<String, String>,
    #[serde(
        rename = "attrList",
        alias = "attributeList",
        default,
        deserialize_with = "lenient::attr_list"
    )]
    pub attr_list: Vec<String>,
}

impl ListEntry {
    /// `true` for the entry whose arrival signals the end of its batch.
    pub fn completes_batch(&self) -> bool {
        self.index.checked_add(1) == Some(self.num)
    }
}

/// Answer to a `get` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetReply {
    #[serde(alias = "deviceName")]
    pub device: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub property: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub value: String,
}

/// Answer to a free-text command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReply {
    #[serde(alias = "commandText", default, deserialize_with = "lenient::string")]
    pub command: String,
    #[serde(alias = "replyText", default, deserialize_with = "lenient::string")]
    pub reply: String,
}

// ── Inbound union ────────────────────────────────────────────────────

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Event(DeviceEvent),
    ListEntry(ListEntry),
    GetReply(GetReply),
    CommandReply(CommandReply),
    /// Well-formed envelope of a type without a known payload shape.
    Other { kind: String, payload: Value },
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    payload: Value,
}

impl InboundMessage {
    /// Decode one text frame.
    pub fn decode(frame: &str) -> Result<Self, Error> {
        let raw: RawEnvelope =
            serde_json::from_str(frame).map_err(|e| decode_error(&e, frame))?;

        let message = match MessageKind::from(raw.kind.as_str()) {
            MessageKind::Event => Self::Event(payload(raw.payload, frame)?),
            MessageKind::ListEntry => Self::ListEntry(payload(raw.payload, frame)?),
            MessageKind::GetReply => Self::GetReply(payload(raw.payload, frame)?),
            MessageKind::CommandReply => Self::CommandReply(payload(raw.payload, frame)?),
            MessageKind::Other(kind) => Self::Other {
                kind,
                payload: raw.payload,
            },
        };
        Ok(message)
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Event(_) => MessageKind::Event,
            Self::ListEntry(_) => MessageKind::ListEntry,
            Self::GetReply(_) => MessageKind::GetReply,
            Self::CommandReply(_) => MessageKind::CommandReply,
            Self::Other { kind, .. } => MessageKind::Other(kind.clone()),
        }
    }
}

fn payload<T: serde::de::DeserializeOwned>(value: Value, frame: &str) -> Result<T, Error> {
    serde_json::from_value(value).map_err(|e| decode_error(&e, frame))
}

fn decode_error(err: &serde_json::Error, frame: &str) -> Error {
    Error::Decode {
        message: err.to_string(),
        frame: frame.to_owned(),
    }
}

// ── Outbound ─────────────────────────────────────────────────────────

/// Payload of an outbound `command` envelope.
///
/// `set` and raw commands are free text in `command`; the structured
/// commands add their arguments as sibling fields. Arguments are passed
/// through verbatim: quoting and validation are the server's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandPayload {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
}

#[derive(Serialize)]
struct OutboundEnvelope<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    payload: &'a CommandPayload,
}

impl CommandPayload {
    /// Free-text command, sent as-is.
    pub fn raw(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            arg: None,
            device_type: None,
            name: None,
            changed: None,
            device: None,
            property: None,
        }
    }

    pub fn subscribe(id: &str, device_type: &str, name: &str, changed: &str) -> Self {
        Self {
            arg: Some(id.to_owned()),
            device_type: Some(device_type.to_owned()),
            name: Some(name.to_owned()),
            changed: Some(changed.to_owned()),
            ..Self::raw("subscribe")
        }
    }

    pub fn unsubscribe(id: &str) -> Self {
        Self {
            arg: Some(id.to_owned()),
            ..Self::raw("unsubscribe")
        }
    }

    pub fn list(devspec: &str) -> Self {
        Self {
            arg: Some(devspec.to_owned()),
            ..Self::raw("list")
        }
    }

    /// `set <device> <property> <value>`, single-space joined.
    pub fn set(device: &str, property: &str, value: &str) -> Self {
        Self::raw(format!("set {device} {property} {value}"))
    }

    pub fn get(device: &str, property: &str) -> Self {
        Self {
            device: Some(device.to_owned()),
            property: Some(property.to_owned()),
            ..Self::raw("get")
        }
    }

    /// Serialize into a complete `{type: "command", payload}` text frame.
    pub fn encode(&self) -> Result<String, Error> {
        let envelope = OutboundEnvelope {
            kind: OUTBOUND_TYPE,
            payload: self,
        };
        Ok(serde_json::to_string(&envelope)?)
    }
}

// ── Lenient scalar handling ──────────────────────────────────────────

pub(crate) mod lenient {
    use indexmap::IndexMap;
    use serde::de::{Error as _, Unexpected};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::Reading;

    /// Textual form of a JSON scalar; `null` is the empty string.
    pub(crate) fn text(value: Value) -> String {
        match value {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    pub(crate) fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(text(Value::deserialize(d)?))
    }

    pub(crate) fn string_map<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<IndexMap<String, String>, D::Error> {
        let raw = Option::<IndexMap<String, Value>>::deserialize(d)?;
        Ok(raw
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, text(v)))
            .collect())
    }

    pub(crate) fn readings<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<IndexMap<String, Reading>, D::Error> {
        let raw = Option::<IndexMap<String, Value>>::deserialize(d)?;
        raw.unwrap_or_default()
            .into_iter()
            .map(|(name, v)| {
                let reading = match v {
                    Value::Object(_) => Reading::deserialize(v).map_err(D::Error::custom)?,
                    scalar => Reading::new(text(scalar), ""),
                };
                Ok((name, reading))
            })
            .collect()
    }

    pub(crate) fn count<'de, D: Deserializer<'de>>(d: D) -> Result<usize, D::Error> {
        match Value::deserialize(d)? {
            Value::Number(n) => n
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| D::Error::custom(format!("invalid count {n}"))),
            Value::String(s) => s.trim().parse().map_err(D::Error::custom),
            other => Err(D::Error::invalid_type(
                Unexpected::Other(&other.to_string()),
                &"a non-negative integer",
            )),
        }
    }

    /// Accepts an array of names, an object keyed by name, or FHEM's
    /// space-separated `name:hint` string.
    pub(crate) fn attr_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let names = match Value::deserialize(d)? {
            Value::Null => Vec::new(),
            Value::Array(items) => items.into_iter().map(text).collect(),
            Value::Object(map) => map.into_iter().map(|(k, _)| k).collect(),
            Value::String(s) => s
                .split_whitespace()
                .filter_map(|token| token.split(':').next())
                .filter(|name| !name.is_empty())
                .map(str::to_owned)
                .collect(),
            other => vec![text(other)],
        };
        Ok(names)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
