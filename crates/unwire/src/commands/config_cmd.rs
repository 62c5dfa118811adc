//! Config subcommand handlers.

use std::path::Path;

use tracing::debug;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

fn init_at(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::ConfigExists {
            path: path.display().to_string(),
        });
    }
    config::save_config_to(&Config::default(), path)?;
    Ok(())
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config_path = config::effective_config_path(global);

    match args.command {
        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            let state_path = match config::load(global) {
                Ok(cfg) => cfg.state_path(),
                Err(e) => {
                    debug!(error = %e, "config unreadable; showing default state path");
                    global
                        .state
                        .clone()
                        .unwrap_or_else(unwire_config::default_state_path)
                }
            };
            let out = format!(
                "config: {}\nstate:  {}",
                config_path.display(),
                state_path.display()
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            output::print_output(cfg.to_toml()?.trim_end(), global.quiet);
            Ok(())
        }

        // ── Init ────────────────────────────────────────────────────
        ConfigCommand::Init { force } => {
            init_at(&config_path, force)?;
            if !global.quiet {
                eprintln!("✓ Configuration written to {}", config_path.display());
                eprintln!("  Inspect it with: unwire config show");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn init_refuses_to_clobber_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        init_at(&path, false).unwrap();
        assert_eq!(config::load_config_from(&path).unwrap(), Config::default());

        std::fs::write(&path, "[adb]\npath = \"/opt/adb\"\n").unwrap();
        let err = init_at(&path, false).unwrap_err();
        assert!(matches!(err, CliError::ConfigExists { .. }));

        init_at(&path, true).unwrap();
        assert_eq!(config::load_config_from(&path).unwrap(), Config::default());
    }
}
