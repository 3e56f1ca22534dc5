//! CLI configuration -- thin wrapper around `fhemsync_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--host, --port, --timeout).

use std::time::Duration;

use fhemsync_core::ClientConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use fhemsync_config::{
    Config, DEFAULT_PORT, Profile, config_path, load_config, load_config_or_default,
    profile_to_client_config, save_config,
};

/// Where to connect and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub client: ClientConfig,
}

impl Target {
    /// Seconds the CLI waits for the connection and for replies.
    pub fn timeout_secs(&self) -> u64 {
        self.client.connect_timeout.as_secs()
    }
}

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.profile_name(global.profile.as_deref()).to_owned()
}

/// Build the connection target from config, profile and flag overrides.
///
/// Flags beat profile values. Without a matching profile `--host` alone
/// is enough; an explicitly named profile must exist.
pub fn resolve_target(global: &GlobalOpts, config: &Config) -> Result<Target, CliError> {
    let profile_name = active_profile_name(global, config);

    let mut profile = match config.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            let mut names: Vec<_> = config.profiles.keys().cloned().collect();
            names.sort();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if names.is_empty() {
                    "(none)".into()
                } else {
                    names.join(", ")
                },
            });
        }
        None => {
            let host = global.host.clone().ok_or_else(|| CliError::NoConfig {
                path: config_path().display().to_string(),
            })?;
            Profile::new(host, global.port.unwrap_or(DEFAULT_PORT))
        }
    };

    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(port) = global.port {
        profile.port = port;
    }

    let mut client = profile_to_client_config(&profile, &config.defaults)?;
    if let Some(timeout) = global.timeout {
        client.connect_timeout = Duration::from_secs(timeout);
    }

    Ok(Target {
        host: profile.host,
        port: profile.port,
        client,
    })
}
