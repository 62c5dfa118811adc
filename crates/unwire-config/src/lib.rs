//! Configuration and persisted state for unwire.
//!
//! TOML configuration (defaults, then file, then `UNWIRE_` environment),
//! translation to `unwire_core::RegistryConfig`, and load/save of the
//! JSON registry snapshot that survives between sessions.

use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use unwire_core::{
    ADB_DAEMON_PORT, RegistryConfig, RegistrySnapshot, Timeouts, WIFI_DIRECT_GROUP_OWNER_ADDRESS,
};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("state file error: {0}")]
    State(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub adb: AdbSection,

    #[serde(default)]
    pub timeouts: TimeoutSection,

    #[serde(default)]
    pub network: NetworkSection,

    #[serde(default)]
    pub polling: PollingSection,

    #[serde(default)]
    pub state: StateSection,

    #[serde(default)]
    pub defaults: Defaults,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AdbSection {
    /// Bridge executable; a bare name is looked up on `PATH`.
    #[serde(default = "default_adb_path")]
    pub path: PathBuf,
}

impl Default for AdbSection {
    fn default() -> Self {
        Self {
            path: default_adb_path(),
        }
    }
}

fn default_adb_path() -> PathBuf {
    PathBuf::from("adb")
}

/// Timeout tiers, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimeoutSection {
    #[serde(default = "default_fast_ms")]
    pub fast_ms: u64,

    #[serde(default = "default_slow_ms")]
    pub slow_ms: u64,

    #[serde(default = "default_listen_poll_ms")]
    pub listen_poll_ms: u64,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            fast_ms: default_fast_ms(),
            slow_ms: default_slow_ms(),
            listen_poll_ms: default_listen_poll_ms(),
        }
    }
}

fn default_fast_ms() -> u64 {
    2_000
}
fn default_slow_ms() -> u64 {
    4_000
}
fn default_listen_poll_ms() -> u64 {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkSection {
    #[serde(default = "default_daemon_port")]
    pub daemon_port: u16,

    #[serde(default = "default_group_owner_address")]
    pub group_owner_address: IpAddr,

    #[serde(default = "default_p2p_interface")]
    pub p2p_interface: String,

    #[serde(default = "default_wlan_interface")]
    pub wlan_interface: String,

    /// refresh passes after a host network change.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            daemon_port: default_daemon_port(),
            group_owner_address: default_group_owner_address(),
            p2p_interface: default_p2p_interface(),
            wlan_interface: default_wlan_interface(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_daemon_port() -> u16 {
    ADB_DAEMON_PORT
}
fn default_group_owner_address() -> IpAddr {
    WIFI_DIRECT_GROUP_OWNER_ADDRESS
}
fn default_p2p_interface() -> String {
    "p2p0".into()
}
fn default_wlan_interface() -> String {
    "wlan0".into()
}
fn default_retry_attempts() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    3_000
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PollingSection {
    #[serde(default = "default_device_interval_ms")]
    pub device_interval_ms: u64,

    #[serde(default = "default_network_interval_ms")]
    pub network_interval_ms: u64,
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            device_interval_ms: default_device_interval_ms(),
            network_interval_ms: default_network_interval_ms(),
        }
    }
}

fn default_device_interval_ms() -> u64 {
    1_000
}
fn default_network_interval_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StateSection {
    /// Override for the state file location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// How often `watch` saves state; `0` saves only on exit.
    #[serde(default = "default_autosave_interval_secs")]
    pub autosave_interval_secs: u64,
}

impl Default for StateSection {
    fn default() -> Self {
        Self {
            path: None,
            autosave_interval_secs: default_autosave_interval_secs(),
        }
    }
}

fn default_autosave_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Build the runtime registry configuration, rejecting settings the
    /// registry cannot work with.
    pub fn to_registry_config(&self) -> Result<RegistryConfig, ConfigError> {
        let t = &self.timeouts;
        if t.fast_ms == 0 || t.slow_ms == 0 || t.listen_poll_ms == 0 {
            return Err(ConfigError::Validation {
                field: "timeouts".into(),
                reason: "every timeout must be greater than zero".into(),
            });
        }
        if t.fast_ms > t.slow_ms {
            return Err(ConfigError::Validation {
                field: "timeouts.fast_ms".into(),
                reason: format!("{} exceeds timeouts.slow_ms ({})", t.fast_ms, t.slow_ms),
            });
        }
        if self.network.daemon_port == 0 {
            return Err(ConfigError::Validation {
                field: "network.daemon_port".into(),
                reason: "port 0 cannot be listened on".into(),
            });
        }
        if self.polling.device_interval_ms == 0 || self.polling.network_interval_ms == 0 {
            return Err(ConfigError::Validation {
                field: "polling".into(),
                reason: "poll intervals must be greater than zero".into(),
            });
        }

        Ok(RegistryConfig {
            adb_path: self.adb.path.clone(),
            timeouts: Timeouts {
                fast: Duration::from_millis(t.fast_ms),
                slow: Duration::from_millis(t.slow_ms),
                listen_poll: Duration::from_millis(t.listen_poll_ms),
            },
            daemon_port: self.network.daemon_port,
            group_owner_address: self.network.group_owner_address,
            p2p_interface: self.network.p2p_interface.clone(),
            wlan_interface: self.network.wlan_interface.clone(),
            device_poll_interval: Duration::from_millis(self.polling.device_interval_ms),
            network_poll_interval: Duration::from_millis(self.polling.network_interval_ms),
            network_retry_attempts: self.network.retry_attempts,
            network_retry_backoff: Duration::from_millis(self.network.retry_backoff_ms),
        })
    }

    /// Where registry state lives: the configured override, else the
    /// platform data directory.
    pub fn state_path(&self) -> PathBuf {
        self.state
            .path
            .clone()
            .unwrap_or_else(default_state_path)
    }

    /// The config as it would be written to disk.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn autosave_interval(&self) -> Option<Duration> {
        (self.state.autosave_interval_secs > 0)
            .then(|| Duration::from_secs(self.state.autosave_interval_secs))
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "unwire", "unwire")
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("unwire");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default state file location.
pub fn default_state_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("state.json"),
        |dirs| dirs.data_dir().join("state.json"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from `path` + environment. A missing file yields
/// defaults. Nested keys use a double underscore:
/// `UNWIRE_TIMEOUTS__FAST_MS=1500`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("UNWIRE_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load the config from the canonical path.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config, falling back to defaults when it cannot be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_else(|e| {
        warn!(error = %e, "ignoring unreadable config");
        Config::default()
    })
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, cfg.to_toml()?)?;
    Ok(())
}

/// Serialize config to TOML and write it to the canonical path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

// ── Registry state ──────────────────────────────────────────────────

/// Read persisted registry state. A missing file is an empty snapshot;
/// so is a corrupt one, after a warning.
pub fn load_state(path: &Path) -> Result<RegistrySnapshot, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no state file yet");
            return Ok(RegistrySnapshot::default());
        }
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_str(&raw) {
        Ok(snapshot) => Ok(snapshot),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "state file is corrupt; starting afresh");
            Ok(RegistrySnapshot::default())
        }
    }
}

/// Write registry state as pretty JSON. The file is replaced atomically:
/// written beside the target, then renamed over it.
pub fn save_state(path: &Path, snapshot: &RegistrySnapshot) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    let staging = path.with_extension("json.tmp");
    std::fs::write(&staging, json)?;
    std::fs::rename(&staging, path)?;
    debug!(path = %path.display(), devices = snapshot.devices.len(), "state saved");
    Ok(())
}
