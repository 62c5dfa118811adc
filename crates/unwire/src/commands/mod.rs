//! Command dispatch: bridges CLI args -> registry operations -> output.

pub mod config_cmd;
pub mod forget;
pub mod promote;
pub mod status;
pub mod watch;

use std::io::ErrorKind;
use std::sync::Arc;

use unwire_core::{AdbCli, Collaborators, CoreError, DeviceRegistry};

use crate::cli::{Command, GlobalOpts};
use crate::config::Config;
use crate::error::CliError;

/// Dispatch a config-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Watch => watch::handle(cfg, global).await,
        Command::Promote(args) => promote::handle(cfg, &args, global).await,
        Command::Status(args) => status::handle(cfg, &args, global),
        Command::Forget(args) => forget::handle(cfg, &args, global),
        // Config is handled before dispatch
        Command::Config(_) => unreachable!(),
    }
}

// ── Shared helpers ──────────────────────────────────────────────────

/// Build a registry wired to the configured `adb` executable. The client
/// is handed back too, for listing transports and feeding the tracker.
fn registry(cfg: &Config) -> Result<(DeviceRegistry, Arc<AdbCli>), CliError> {
    let config = cfg.to_registry_config()?;
    let adb = AdbCli::new(config.adb_path.clone(), config.timeouts.slow);
    let registry = DeviceRegistry::new(config, Collaborators::adb(adb.clone()));
    Ok((registry, Arc::new(adb)))
}

/// Like `CliError::from`, but a bridge that cannot be spawned at all gets
/// its own diagnostic.
fn bridge_error(cfg: &Config, err: CoreError) -> CliError {
    match err {
        CoreError::Io(source)
            if matches!(
                source.kind(),
                ErrorKind::NotFound | ErrorKind::PermissionDenied
            ) =>
        {
            CliError::BridgeUnavailable {
                program: cfg.adb.path.display().to_string(),
                source,
            }
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_executable_is_reported_as_bridge_unavailable() {
        let cfg = Config::default();
        let err = bridge_error(
            &cfg,
            CoreError::Io(std::io::Error::from(ErrorKind::NotFound)),
        );
        assert!(matches!(err, CliError::BridgeUnavailable { ref program, .. } if program == "adb"));
        assert_eq!(err.exit_code(), crate::error::exit_code::BRIDGE);

        let err = bridge_error(&cfg, CoreError::Interrupted);
        assert!(matches!(err, CliError::Interrupted));
    }
}
