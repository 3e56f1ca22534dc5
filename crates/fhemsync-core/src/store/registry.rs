// ── Registry storage and read access ──
//
// Devices live in a `DashMap` as `Arc<Device>` so readers on other tasks
// get cheap snapshots while the session task writes. Every mutation bumps
// a revision published through a `watch` channel.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::Device;

/// In-memory mirror of every device the server has told us about.
///
/// Empty at construction. Only inbound `event` and `listentry` messages
/// write to it; a disconnect leaves it untouched.
pub struct DeviceRegistry {
    pub(super) devices: DashMap<String, Arc<Device>>,
    pub(super) revision: watch::Sender<u64>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            devices: DashMap::new(),
            revision,
        }
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn device(&self, name: &str) -> Option<Arc<Device>> {
        self.devices.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.devices.contains_key(name)
    }

    /// All known device names, sorted.
    pub fn device_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.devices.iter().map(|e| e.key().clone()).collect();
        names.sort_unstable();
        names
    }

    /// Point-in-time copy of every device, sorted by name.
    pub fn snapshot(&self) -> Vec<Arc<Device>> {
        let mut devices: Vec<Arc<Device>> =
            self.devices.iter().map(|e| Arc::clone(e.value())).collect();
        devices.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    // ── Change observation ───────────────────────────────────────────

    /// Watch the registry revision. It increases on every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    // ── Teardown ─────────────────────────────────────────────────────

    /// Forget every device.
    pub fn clear(&self) {
        self.devices.clear();
        self.bump();
    }

    pub(super) fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
