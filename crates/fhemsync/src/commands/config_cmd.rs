//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

fn format_config(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    for name in sorted_names(cfg) {
        let p = &cfg.profiles[&name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "host = \"{}\"", p.host);
        let _ = writeln!(out, "port = {}", p.port);
        if let Some(ref sub_protocol) = p.sub_protocol {
            let _ = writeln!(out, "sub_protocol = \"{sub_protocol}\"");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
    }

    out.trim_end().to_owned()
}

fn sorted_names(cfg: &Config) -> Vec<String> {
    let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
    names.sort();
    names
}

fn profile_not_found(cfg: &Config, name: String) -> CliError {
    let names = sorted_names(cfg);
    CliError::ProfileNotFound {
        name,
        available: if names.is_empty() {
            "(none)".into()
        } else {
            names.join(", ")
        },
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let out = output::render_single(global.output, &cfg, format_config, |c| {
                config::active_profile_name(global, c)
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: fhemsync config set-profile <NAME> --host <HOST>");
            } else {
                for name in sorted_names(&cfg) {
                    let marker = if name == default { " *" } else { "" };
                    let p = &cfg.profiles[&name];
                    println!("{name}{marker}\t{}:{}", p.host, p.port);
                }
            }
            Ok(())
        }

        ConfigCommand::SetProfile { name, default } => {
            let host = global
                .host
                .clone()
                .filter(|h| !h.trim().is_empty())
                .ok_or_else(|| CliError::Validation {
                    field: "host".into(),
                    reason: "pass the server with --host".into(),
                })?;
            let mut cfg = config::load_config_or_default();
            let profile = cfg
                .profiles
                .entry(name.clone())
                .or_insert_with(|| Profile::new(host.clone(), config::DEFAULT_PORT));
            profile.host = host;
            if let Some(port) = global.port {
                profile.port = port;
            }

            if default {
                cfg.default_profile = Some(name.clone());
            }
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Profile '{name}' saved");
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(profile_not_found(&cfg, name));
            }

            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Default profile set to '{name}'");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_lists_profiles_in_name_order() {
        let mut cfg = Config::default();
        cfg.profiles.insert("lab".into(), Profile::new("10.0.0.5", 8083));
        cfg.profiles.insert("home".into(), Profile::new("fhem.local", 8080));

        let text = format_config(&cfg);
        let home = text.find("[profiles.home]").unwrap();
        let lab = text.find("[profiles.lab]").unwrap();
        assert!(home < lab);
        assert!(text.contains("port = 8083"));
        assert!(text.starts_with("default_profile = \"default\""));
    }

    #[test]
    fn missing_profile_names_alternatives() {
        let mut cfg = Config::default();
        cfg.profiles.insert("home".into(), Profile::new("fhem.local", 8080));
        let err = profile_not_found(&cfg, "attic".into());
        assert!(matches!(err, CliError::ProfileNotFound { ref available, .. } if available == "home"));
    }
}
