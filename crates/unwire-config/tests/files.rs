#![allow(clippy::unwrap_used)]

use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use unwire_config::{Config, load_config_from, load_state, save_config_to, save_state};
use unwire_core::{DeviceSnapshot, RegistrySnapshot, StableId};

fn sample_state() -> RegistrySnapshot {
    let mut device = DeviceSnapshot::new(StableId::new("SN001"));
    device.display_name = Some("DIRECT-xy-Robot".into());
    device.last_connected_address = Some("10.0.0.7:5555".parse().unwrap());
    RegistrySnapshot {
        devices: vec![device],
        last_connected_stable_id: Some(StableId::new("SN001")),
        last_connected_address: Some("10.0.0.7:5555".parse().unwrap()),
    }
}

#[test]
fn missing_state_file_is_empty() {
    let dir = TempDir::new().unwrap();
    let state = load_state(&dir.path().join("state.json")).unwrap();
    assert!(state.is_empty());
}

#[test]
fn state_survives_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("state.json");

    save_state(&path, &sample_state()).unwrap();
    assert!(!path.with_extension("json.tmp").exists());
    assert_eq!(load_state(&path).unwrap(), sample_state());
}

#[test]
fn corrupt_state_starts_afresh() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert_eq!(load_state(&path).unwrap(), RegistrySnapshot::default());
}

#[test]
fn missing_config_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let cfg = load_config_from(&dir.path().join("config.toml")).unwrap();
    assert_eq!(cfg, Config::default());
}

#[test]
fn partial_config_file_overrides_only_what_it_names() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[adb]
path = "/opt/platform-tools/adb"

[network]
wlan_interface = "wlan1"
retry_attempts = 3
"#,
    )
    .unwrap();

    let cfg = load_config_from(&path).unwrap();
    assert_eq!(cfg.adb.path.to_str(), Some("/opt/platform-tools/adb"));
    assert_eq!(cfg.network.p2p_interface, "p2p0");

    let registry = cfg.to_registry_config().unwrap();
    assert_eq!(registry.wlan_interface, "wlan1");
    assert_eq!(registry.network_retry_attempts, 3);
    assert_eq!(registry.timeouts.slow, Duration::from_secs(4));
}

#[test]
fn saved_config_loads_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let mut cfg = Config::default();
    cfg.timeouts.fast_ms = 1_500;
    cfg.state.path = Some(dir.path().join("elsewhere.json"));

    save_config_to(&cfg, &path).unwrap();
    let loaded = load_config_from(&path).unwrap();
    assert_eq!(loaded, cfg);
    assert_eq!(loaded.state_path(), dir.path().join("elsewhere.json"));
}
