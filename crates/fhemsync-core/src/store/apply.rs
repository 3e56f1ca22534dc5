// ── Mutation rules ──
//
// Events merge into an existing record; enumeration entries replace it
// wholesale. Both are idempotent: applying the same message twice yields
// the same record.

use std::sync::Arc;

use fhemsync_api::{DeviceEvent, ListEntry, Reading, STATE_KEY};

use super::DeviceRegistry;
use crate::model::{Device, DeviceChange};

impl DeviceRegistry {
    /// Merge an event into the named device, creating an empty record
    /// first if the device is unknown.
    ///
    /// `STATE` lands in `internals`, every other key becomes a reading
    /// stamped with the event time. Returns one [`DeviceChange`] per
    /// changed key, in payload order.
    pub fn apply_event(&self, event: &DeviceEvent) -> Vec<DeviceChange> {
        let mut changes = Vec::with_capacity(event.changed.len());
        {
            let mut entry = self
                .devices
                .entry(event.name.clone())
                .or_insert_with(|| Arc::new(Device::named(&event.name)));
            let device = Arc::make_mut(entry.value_mut());

            for (key, value) in &event.changed {
                if key == STATE_KEY {
                    device.internals.insert(key.clone(), value.clone());
                } else {
                    device
                        .readings
                        .insert(key.clone(), Reading::new(value.clone(), event.time.clone()));
                }
                changes.push(DeviceChange {
                    device: event.name.clone(),
                    key: key.clone(),
                    value: value.clone(),
                    time: event.time.clone(),
                });
            }
        }

        self.bump();
        tracing::trace!(device = %event.name, changed = changes.len(), "applied event");
        changes
    }

    /// Replace the named device with the entry's full record.
    ///
    /// Returns `true` when this entry completes its enumeration batch
    /// (`index + 1 == num`), regardless of how many entries arrived before.
    pub fn apply_list_entry(&self, entry: &ListEntry) -> bool {
        self.devices
            .insert(entry.name.clone(), Arc::new(Device::from_list_entry(entry)));
        self.bump();

        tracing::trace!(
            device = %entry.name,
            index = entry.index,
            num = entry.num,
            "applied list entry"
        );
        entry.completes_batch()
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    use super::*;

    fn event(name: &str, time: &str, changed: &[(&str, &str)]) -> DeviceEvent {
        DeviceEvent {
            name: name.into(),
            time: time.into(),
            changed: changed
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        }
    }

    fn list_entry(name: &str, index: usize, num: usize) -> ListEntry {
        ListEntry {
            name: name.into(),
            index,
            num,
            internals: IndexMap::from([("STATE".to_owned(), "off".to_owned())]),
            readings: IndexMap::from([(
                "state".to_owned(),
                Reading::new("off", "2024-05-01 09:00:00"),
            )]),
            attributes: IndexMap::from([("room".to_owned(), "Kitchen".to_owned())]),
            sets: IndexMap::from([("on".to_owned(), String::new())]),
            gets: IndexMap::new(),
            attr_list: vec!["room".into(), "alias".into()],
        }
    }

    #[test]
    fn event_creates_unknown_device() {
        let registry = DeviceRegistry::new();
        let changes = registry.apply_event(&event(
            "Lamp1",
            "2024-05-01 10:00:00",
            &[("STATE", "on"), ("pct", "100")],
        ));

        let device = registry.device("Lamp1").unwrap();
        assert_eq!(device.state(), Some("on"));
        assert_eq!(
            device.reading("pct"),
            Some(&Reading::new("100", "2024-05-01 10:00:00"))
        );
        assert!(device.reading("STATE").is_none());
        assert!(device.attributes.is_empty());

        assert_eq!(changes.len(), 2);
        assert_eq!(
            changes[0],
            DeviceChange {
                device: "Lamp1".into(),
                key: "STATE".into(),
                value: "on".into(),
                time: "2024-05-01 10:00:00".into(),
            }
        );
        assert_eq!(changes[1].key, "pct");
    }

    #[test]
    fn event_is_idempotent() {
        let registry = DeviceRegistry::new();
        let e = event("Lamp1", "t1", &[("STATE", "on"), ("pct", "40")]);

        registry.apply_event(&e);
        let first = registry.device("Lamp1").unwrap();
        registry.apply_event(&e);
        let second = registry.device("Lamp1").unwrap();

        assert_eq!(*first, *second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn event_after_enumeration_preserves_untouched_fields() {
        let registry = DeviceRegistry::new();
        registry.apply_list_entry(&list_entry("Lamp1", 0, 1));
        registry.apply_event(&event("Lamp1", "2024-05-01 10:00:00", &[("STATE", "on")]));

        let device = registry.device("Lamp1").unwrap();
        assert_eq!(device.state(), Some("on"));
        assert_eq!(device.attribute("room"), Some("Kitchen"));
        assert_eq!(device.attribute_list, vec!["room", "alias"]);
        assert_eq!(device.sets.len(), 1);
        // Only STATE changed; the pre-existing reading keeps its old time.
        assert_eq!(
            device.reading("state"),
            Some(&Reading::new("off", "2024-05-01 09:00:00"))
        );
    }

    #[test]
    fn list_entry_replaces_whole_record() {
        let registry = DeviceRegistry::new();
        registry.apply_event(&event("Lamp1", "t0", &[("humidity", "55")]));
        registry.apply_list_entry(&list_entry("Lamp1", 0, 1));

        let device = registry.device("Lamp1").unwrap();
        assert!(device.reading("humidity").is_none());
        assert_eq!(device.state(), Some("off"));
    }

    #[test]
    fn list_entry_is_idempotent() {
        let registry = DeviceRegistry::new();
        let entry = list_entry("Lamp1", 0, 2);
        registry.apply_list_entry(&entry);
        let first = registry.device("Lamp1").unwrap();
        registry.apply_list_entry(&entry);
        assert_eq!(*first, *registry.device("Lamp1").unwrap());
    }

    #[test]
    fn completion_follows_index_not_arrival_order() {
        let registry = DeviceRegistry::new();
        assert!(registry.apply_list_entry(&list_entry("Lamp2", 1, 2)));
        assert!(!registry.apply_list_entry(&list_entry("Lamp1", 0, 2)));
        assert_eq!(registry.device_names(), vec!["Lamp1", "Lamp2"]);
    }

    #[test]
    fn single_entry_batch_completes() {
        let registry = DeviceRegistry::new();
        assert!(registry.apply_list_entry(&list_entry("Lamp1", 0, 1)));
    }

    #[test]
    fn snapshot_is_sorted_and_revision_advances() {
        let registry = DeviceRegistry::new();
        let rx = registry.subscribe();
        assert_eq!(*rx.borrow(), 0);

        registry.apply_event(&event("b", "t", &[("STATE", "on")]));
        registry.apply_event(&event("a", "t", &[("STATE", "off")]));

        let names: Vec<_> = registry.snapshot().iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(rx.has_changed().unwrap());
        assert_eq!(registry.revision(), 2);

        registry.clear();
        assert!(registry.is_empty());
        assert!(!registry.contains("a"));
        assert_eq!(registry.revision(), 3);
    }
}
