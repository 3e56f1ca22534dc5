//! Device listing and detail views, served from the local registry after
//! a `list` enumeration completes.

use std::sync::Arc;

use indexmap::IndexMap;
use tabled::Tabled;
use tokio::sync::mpsc;

use fhemsync_core::{Client, Device};

use crate::cli::{GlobalOpts, ListArgs, ShowArgs};
use crate::error::CliError;
use crate::output;

use super::Waiter;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    dtype: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Room")]
    room: String,
    #[tabled(rename = "Readings")]
    readings: usize,
}

impl From<&Arc<Device>> for DeviceRow {
    fn from(d: &Arc<Device>) -> Self {
        Self {
            name: d.name.clone(),
            dtype: d.internals.get("TYPE").cloned().unwrap_or_default(),
            state: d.state().unwrap_or_default().to_owned(),
            room: d.attribute("room").unwrap_or_default().to_owned(),
            readings: d.readings.len(),
        }
    }
}

fn detail(d: &Arc<Device>) -> String {
    let mut lines = vec![
        format!("Name:   {}", d.name),
        format!("Type:   {}", d.internals.get("TYPE").map_or("-", String::as_str)),
        format!("State:  {}", d.state().unwrap_or("-")),
    ];

    section(&mut lines, "Internals", &d.internals);

    if !d.readings.is_empty() {
        lines.push(String::new());
        lines.push("Readings:".into());
        let width = key_width(d.readings.keys());
        for (key, reading) in &d.readings {
            lines.push(format!(
                "  {key:<width$}  {}  ({})",
                reading.value, reading.time
            ));
        }
    }

    section(&mut lines, "Attributes", &d.attributes);

    if !d.sets.is_empty() {
        lines.push(String::new());
        let names: Vec<&str> = d.sets.keys().map(String::as_str).collect();
        lines.push(format!("Sets:   {}", names.join(" ")));
    }
    if !d.gets.is_empty() {
        let names: Vec<&str> = d.gets.keys().map(String::as_str).collect();
        lines.push(format!("Gets:   {}", names.join(" ")));
    }

    lines.join("\n")
}

fn section(lines: &mut Vec<String>, title: &str, map: &IndexMap<String, String>) {
    if map.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push(format!("{title}:"));
    let width = key_width(map.keys());
    for (key, value) in map {
        lines.push(format!("  {key:<width$}  {value}"));
    }
}

fn key_width<'a>(keys: impl Iterator<Item = &'a String>) -> usize {
    keys.map(String::len).max().unwrap_or(0)
}

// ── Enumeration ─────────────────────────────────────────────────────

/// Send `list devspec` and wait until the last entry of the batch lands.
async fn enumerate(client: &Client, wait: &Waiter, devspec: &str) -> Result<(), CliError> {
    let (tx, mut done) = mpsc::unbounded_channel();
    client.on_list_complete(move || {
        let _ = tx.send(());
    });
    client.list(devspec)?;
    wait.recv(&mut done, "the device list").await
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(
    client: &Client,
    wait: &Waiter,
    args: &ListArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    enumerate(client, wait, &args.devspec).await?;
    let devices = client.registry().snapshot();
    tracing::debug!(count = devices.len(), "enumeration complete");

    let out = output::render_list(global.output, &devices, |d| DeviceRow::from(d), |d| {
        d.name.clone()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn show(
    client: &Client,
    wait: &Waiter,
    args: &ShowArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    enumerate(client, wait, &args.device).await?;
    let device = client
        .device(&args.device)
        .ok_or_else(|| CliError::NotFound {
            resource_type: "device".into(),
            identifier: args.device.clone(),
        })?;

    let out = output::render_single(global.output, &device, detail, |d| {
        d.state().unwrap_or_default().to_owned()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use fhemsync_core::Reading;

    use super::*;

    fn lamp() -> Arc<Device> {
        let mut device = Device::named("Lamp1");
        device.internals.insert("TYPE".into(), "dummy".into());
        device.internals.insert("STATE".into(), "on".into());
        device
            .readings
            .insert("pct".into(), Reading::new("100", "2024-05-01 10:00:00"));
        device.attributes.insert("room".into(), "Kitchen".into());
        device.sets.insert("on".into(), String::new());
        Arc::new(device)
    }

    #[test]
    fn row_pulls_type_state_and_room() {
        let row = DeviceRow::from(&lamp());
        assert_eq!(row.dtype, "dummy");
        assert_eq!(row.state, "on");
        assert_eq!(row.room, "Kitchen");
        assert_eq!(row.readings, 1);
    }

    #[test]
    fn detail_lists_every_section() {
        let text = detail(&lamp());
        assert!(text.starts_with("Name:   Lamp1"));
        assert!(text.contains("Internals:"));
        assert!(text.contains("pct  100  (2024-05-01 10:00:00)"));
        assert!(text.contains("room  Kitchen"));
        assert!(text.contains("Sets:   on"));
        assert!(!text.contains("Gets:"));
    }
}
