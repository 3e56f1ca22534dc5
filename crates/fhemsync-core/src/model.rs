// ── Domain model ──
//
// The mirrored device record and the change notifications derived from
// applying events to it.

use indexmap::IndexMap;
use serde::Serialize;

use fhemsync_api::{ListEntry, Reading, STATE_KEY};

/// One device as last reported by the server.
///
/// Maps keep server order. `attributes`, `attribute_list`, `sets` and
/// `gets` are only ever filled by an enumeration entry; events touch
/// `internals[STATE]` and `readings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Device {
    pub name: String,
    pub internals: IndexMap<String, String>,
    pub readings: IndexMap<String, Reading>,
    pub attributes: IndexMap<String, String>,
    pub attribute_list: Vec<String>,
    pub sets: IndexMap<String, String>,
    pub gets: IndexMap<String, String>,
}

impl Device {
    /// Empty record, as created by the first event for an unknown device.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Full record from an enumeration entry.
    pub fn from_list_entry(entry: &ListEntry) -> Self {
        Self {
            name: entry.name.clone(),
            internals: entry.internals.clone(),
            readings: entry.readings.clone(),
            attributes: entry.attributes.clone(),
            attribute_list: entry.attr_list.clone(),
            sets: entry.sets.clone(),
            gets: entry.gets.clone(),
        }
    }

    /// The summary status (`internals.STATE`), once reported.
    pub fn state(&self) -> Option<&str> {
        self.internals.get(STATE_KEY).map(String::as_str)
    }

    pub fn reading(&self, name: &str) -> Option<&Reading> {
        self.readings.get(name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// One changed key from an applied event: `(device, key, value, time)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceChange {
    pub device: String,
    pub key: String,
    pub value: String,
    pub time: String,
}
