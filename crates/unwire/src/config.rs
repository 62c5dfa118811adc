//! CLI configuration: thin wrapper around `unwire_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (`--config`, `--state`, `--adb`, `--color`).

use std::path::PathBuf;

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

pub use unwire_config::{Config, config_path, load_config_from, save_config_to};

/// Config file in effect: `--config`, else the platform location.
pub fn effective_config_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Load the config file and apply command-line overrides on top.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = load_config_from(&effective_config_path(global))?;
    if let Some(ref adb) = global.adb {
        cfg.adb.path.clone_from(adb);
    }
    if let Some(ref state) = global.state {
        cfg.state.path = Some(state.clone());
    }
    Ok(cfg)
}

/// `-o` when given, else the `[defaults] output` setting.
pub fn output_format(flag: Option<OutputFormat>, cfg: &Config) -> Result<OutputFormat, CliError> {
    if let Some(format) = flag {
        return Ok(format);
    }
    match cfg.defaults.output.as_str() {
        "table" => Ok(OutputFormat::Table),
        "json" => Ok(OutputFormat::Json),
        other => Err(CliError::Validation {
            field: "defaults.output".into(),
            reason: format!("expected 'table' or 'json', got '{other}'"),
        }),
    }
}

/// `--color` when given, else the `[defaults] color` setting.
pub fn color_mode(global: &GlobalOpts, cfg: &Config) -> Result<ColorMode, CliError> {
    if let Some(mode) = global.color {
        return Ok(mode);
    }
    match cfg.defaults.color.as_str() {
        "auto" => Ok(ColorMode::Auto),
        "always" => Ok(ColorMode::Always),
        "never" => Ok(ColorMode::Never),
        other => Err(CliError::Validation {
            field: "defaults.color".into(),
            reason: format!("expected 'auto', 'always', or 'never', got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn flags_override_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.toml");
        std::fs::write(&file, "[adb]\npath = \"/usr/bin/adb\"\n").unwrap();
        let file_arg = file.display().to_string();

        let cli = Cli::try_parse_from([
            "unwire",
            "--config",
            file_arg.as_str(),
            "--adb",
            "/opt/sdk/adb",
            "--state",
            "/tmp/unwire-state.json",
            "status",
        ])
        .unwrap();
        let cfg = load(&cli.global).unwrap();
        assert_eq!(cfg.adb.path, PathBuf::from("/opt/sdk/adb"));
        assert_eq!(cfg.state_path(), PathBuf::from("/tmp/unwire-state.json"));
    }

    #[test]
    fn unknown_output_default_is_rejected() {
        let mut cfg = Config::default();
        assert_eq!(output_format(None, &cfg).unwrap(), OutputFormat::Table);
        cfg.defaults.output = "yaml".into();
        assert!(output_format(None, &cfg).is_err());
        assert_eq!(
            output_format(Some(OutputFormat::Json), &cfg).unwrap(),
            OutputFormat::Json
        );
    }
}
