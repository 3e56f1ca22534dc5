//! Clap derive structures for the `fhemsync` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fhemsync -- talk to a FHEM server over its json websocket
#[derive(Debug, Parser)]
#[command(
    name = "fhemsync",
    version,
    about = "Inspect and control FHEM devices from the command line",
    long_about = "Connects to a FHEM server's websocket (sub-protocol `json`),\n\
        mirrors device state locally and sends commands.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "FHEMSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// FHEM host (overrides profile)
    #[arg(long, short = 'H', env = "FHEMSYNC_HOST", global = true)]
    pub host: Option<String>,

    /// FHEM websocket port (overrides profile)
    #[arg(long, short = 'P', env = "FHEMSYNC_PORT", global = true)]
    pub port: Option<u16>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FHEMSYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Seconds to wait for the connection and for replies
    #[arg(long, env = "FHEMSYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Enumerate devices matching a devspec
    #[command(alias = "ls")]
    List(ListArgs),

    /// Show one device's internals, readings and attributes
    Show(ShowArgs),

    /// Set a device property (fire-and-forget)
    Set(SetArgs),

    /// Query a device property and print the reply
    Get(GetArgs),

    /// Run a raw FHEM command and print the reply
    Cmd(CmdArgs),

    /// Stream device events until interrupted
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Device commands ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ListArgs {
    /// FHEM devspec, e.g. `room=Kitchen` or `Lamp.*`
    #[arg(default_value = ".*")]
    pub devspec: String,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Device name
    pub device: String,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Device name
    pub device: String,

    /// Property to set, e.g. `state` or `pct`
    pub property: String,

    /// Value; multiple words are joined with spaces
    #[arg(required = true, num_args = 1..)]
    pub value: Vec<String>,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Device name
    pub device: String,

    /// Property to query
    pub property: String,
}

#[derive(Debug, Args)]
pub struct CmdArgs {
    /// Command line; multiple words are joined with spaces
    #[arg(
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub text: Vec<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Device type filter (regex)
    #[arg(long = "type", short = 't', default_value = ".*")]
    pub device_type: String,

    /// Device name filter (regex)
    #[arg(long, short = 'n', default_value = ".*")]
    pub name: String,

    /// Changed reading filter (regex)
    #[arg(long, short = 'c', default_value = ".*")]
    pub changed: String,

    /// Subscription id announced to the server
    #[arg(long, default_value = "fhemsync-watch")]
    pub id: String,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved configuration
    Show,

    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,

    /// Create or update a profile from --host and --port
    SetProfile {
        /// Profile name
        name: String,

        /// Also make this the default profile
        #[arg(long)]
        default: bool,
    },

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
