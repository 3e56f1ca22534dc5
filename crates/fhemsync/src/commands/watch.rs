//! Live event stream: subscribe, print every applied change, unsubscribe
//! on Ctrl-C.

use tokio::sync::mpsc;

use fhemsync_core::{Client, ConnectionState, DeviceChange};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(client: &Client, args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let (tx, mut changes) = mpsc::unbounded_channel();
    client.on_event(move |change| {
        let _ = tx.send(change.clone());
    });

    client.subscribe_event(&args.id, &args.device_type, &args.name, &args.changed)?;
    if !global.quiet {
        eprintln!(
            "Watching type={} name={} changed={} (Ctrl-C to stop)",
            args.device_type, args.name, args.changed
        );
    }

    let mut state = client.connection_state();
    loop {
        tokio::select! {
            Some(change) = changes.recv() => {
                let line = format_change(&change, global.output, color)?;
                output::print_output(&line, global.quiet);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, unsubscribing");
                break;
            }
            changed = state.changed() => {
                if changed.is_err() || *state.borrow() == ConnectionState::Disconnected {
                    return Err(CliError::NotConnected);
                }
            }
        }
    }

    client.unsubscribe_event(&args.id)?;
    client.flush().await?;
    Ok(())
}

fn format_change(
    change: &DeviceChange,
    format: OutputFormat,
    color: bool,
) -> Result<String, CliError> {
    match format {
        // One JSON document per line, whatever the flavour.
        OutputFormat::Json | OutputFormat::JsonCompact => Ok(serde_json::to_string(change)?),
        OutputFormat::Plain => Ok(format!("{} {} {}", change.device, change.key, change.value)),
        OutputFormat::Table => Ok(format!(
            "{}  {}  {}: {}",
            change.time,
            output::paint_device(&change.device, color),
            output::paint_key(&change.key, color),
            change.value
        )),
    }
}
