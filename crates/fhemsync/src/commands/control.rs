//! `set`, `get` and raw command handlers.

use tokio::sync::mpsc;

use fhemsync_core::{Client, CommandReply, GetReply};

use crate::cli::{CmdArgs, GetArgs, GlobalOpts, OutputFormat, SetArgs};
use crate::error::CliError;
use crate::output;

use super::Waiter;

pub async fn set(client: &Client, args: &SetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let value = args.value.join(" ");
    client.set(&args.device, &args.property, &value)?;
    // FHEM does not acknowledge `set`; make sure the frame left before
    // the connection is torn down.
    client.flush().await?;

    if global.output == OutputFormat::Table {
        output::print_output(
            &format!("set {} {} {value}", args.device, args.property),
            global.quiet,
        );
    }
    Ok(())
}

pub async fn get(
    client: &Client,
    wait: &Waiter,
    args: &GetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (tx, mut replies) = mpsc::unbounded_channel();
    let (device, property) = (args.device.clone(), args.property.clone());
    client.on_get_reply(move |reply| {
        if reply_matches(reply, &device, &property) {
            let _ = tx.send(reply.clone());
        }
    });

    client.get(&args.device, &args.property)?;
    let reply = wait
        .recv(&mut replies, &format!("get {} {}", args.device, args.property))
        .await?;

    let out = output::render_single(
        global.output,
        &reply,
        |r| r.value.clone(),
        |r| r.value.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn cmd(
    client: &Client,
    wait: &Waiter,
    args: &CmdArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let text = args.text.join(" ");
    let (tx, mut replies) = mpsc::unbounded_channel();
    let expected = text.clone();
    client.on_command_reply(move |reply: &CommandReply| {
        if reply.command.trim() == expected {
            let _ = tx.send(reply.clone());
        }
    });

    client.send_command(&text)?;
    let reply = wait.recv(&mut replies, &format!("'{text}'")).await?;

    let out = output::render_single(
        global.output,
        &reply,
        |r| r.reply.trim_end().to_owned(),
        |r| r.reply.trim_end().to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Replies carry no request id; match on what was asked for.
fn reply_matches(reply: &GetReply, device: &str, property: &str) -> bool {
    reply.device == device && (reply.property.is_empty() || reply.property == property)
}
