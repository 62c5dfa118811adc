//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use unwire_config::ConfigError;
use unwire_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const BRIDGE: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Bridge ───────────────────────────────────────────────────────
    #[error("Cannot run the debug bridge at '{program}'")]
    #[diagnostic(
        code(unwire::bridge_unavailable),
        help(
            "Check that adb is installed and on PATH.\n\
             Or point at it with: unwire --adb /path/to/adb <command>\n\
             Or set [adb] path in your config file."
        )
    )]
    BridgeUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    #[diagnostic(
        code(unwire::device),
        help("The device did not answer as expected. Reconnect the USB cable and retry.")
    )]
    Device { message: String },

    #[error("{message}")]
    #[diagnostic(
        code(unwire::timeout),
        help("Raise [timeouts] slow_ms in your config if the device is slow to respond.")
    )]
    Timeout { message: String },

    #[error("Interrupted")]
    #[diagnostic(code(unwire::interrupted))]
    Interrupted,

    // ── Devices ──────────────────────────────────────────────────────
    #[error("No remembered device '{stable_id}'")]
    #[diagnostic(
        code(unwire::not_found),
        help("List remembered devices with: unwire status")
    )]
    DeviceNotFound { stable_id: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Config file already exists at {path}")]
    #[diagnostic(
        code(unwire::config_exists),
        help("Pass --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error("Invalid {field}: {reason}")]
    #[diagnostic(code(unwire::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(unwire::config),
        help("Inspect the effective configuration with: unwire config show")
    )]
    Config { message: String },

    #[error("State file error: {message}")]
    #[diagnostic(
        code(unwire::state),
        help("Remove the state file to start afresh; see: unwire config path")
    )]
    State { message: String },

    // ── I/O ──────────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(unwire::io))]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BridgeUnavailable { .. } => exit_code::BRIDGE,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Interrupted => exit_code::INTERRUPTED,
            Self::DeviceNotFound { .. } => exit_code::NOT_FOUND,
            Self::ConfigExists { .. } => exit_code::CONFLICT,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Device { .. } | Self::Config { .. } | Self::State { .. } | Self::Io(_) => {
                exit_code::GENERAL
            }
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Interrupted => Self::Interrupted,
            e if e.is_timeout() => Self::Timeout {
                message: e.to_string(),
            },
            CoreError::Io(e) => Self::Io(e),
            other => Self::Device {
                message: other.to_string(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::State(e) => Self::State {
                message: e.to_string(),
            },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_keep_their_exit_class() {
        assert_eq!(
            CliError::from(CoreError::Interrupted).exit_code(),
            exit_code::INTERRUPTED
        );
        let timeout = CoreError::CommandTimeout {
            command: "adb devices -l".into(),
            timeout_ms: 4000,
        };
        assert_eq!(CliError::from(timeout).exit_code(), exit_code::TIMEOUT);
    }

    #[test]
    fn config_validation_is_a_usage_error() {
        let err = CliError::from(ConfigError::Validation {
            field: "timeouts".into(),
            reason: "zero".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
        assert_eq!(err.to_string(), "Invalid timeouts: zero");
    }
}
