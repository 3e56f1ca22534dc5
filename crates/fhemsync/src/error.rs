//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use fhemsync_config::ConfigError;
use fhemsync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to FHEM at {address}")]
    #[diagnostic(
        code(fhemsync::connection_failed),
        help(
            "Check that FHEM is running and its websocket listener is enabled.\n\
             Address: {address}\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { address: String, reason: String },

    #[error("Not connected to FHEM")]
    #[diagnostic(
        code(fhemsync::not_connected),
        help("The server closed the connection before the command could be sent.")
    )]
    NotConnected,

    #[error("Connection error: {message}")]
    #[diagnostic(code(fhemsync::transport))]
    Transport { message: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(fhemsync::not_found),
        help("Run: fhemsync list to see available devices")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    // ── Protocol ─────────────────────────────────────────────────────

    #[error("Server sent an unreadable frame: {message}")]
    #[diagnostic(code(fhemsync::protocol))]
    Protocol { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fhemsync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(fhemsync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: fhemsync config set-profile {name} --host <HOST>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No FHEM server configured")]
    #[diagnostic(
        code(fhemsync::no_config),
        help(
            "Pass --host (or set FHEMSYNC_HOST), or create a profile with:\n\
             fhemsync config set-profile default --host <HOST> --default\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(fhemsync::config))]
    Config(#[from] ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Timed out after {seconds}s waiting for {waiting_for}")]
    #[diagnostic(
        code(fhemsync::timeout),
        help("Increase the timeout with --timeout or check that FHEM is responsive.")
    )]
    Timeout { seconds: u64, waiting_for: String },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize output: {0}")]
    #[diagnostic(code(fhemsync::json))]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    #[diagnostic(code(fhemsync::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConnected | Self::Transport { .. } => {
                exit_code::CONNECTION
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::ProfileNotFound { .. }
            | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotConnected => CliError::NotConnected,
            CoreError::ConnectionFailed { address, reason } => {
                CliError::ConnectionFailed { address, reason }
            }
            CoreError::Transport { message } => CliError::Transport { message },
            CoreError::Timeout { timeout_ms } => CliError::Timeout {
                seconds: timeout_ms.div_ceil(1000),
                waiting_for: "the connection".into(),
            },
            CoreError::Decode { message, .. } => CliError::Protocol { message },
            CoreError::Config { message } => CliError::Validation {
                field: "address".into(),
                reason: message,
            },
            err @ (CoreError::HandlerFault { .. } | CoreError::Internal(_)) => {
                CliError::Internal(err.to_string())
            }
        }
    }
}
