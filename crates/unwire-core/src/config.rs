// ── Runtime registry configuration ──
//
// Describes *how* the registry talks to the bridge and the devices:
// timeout tiers, well-known addresses, polling cadence. Never touches
// disk; the CLI builds a `RegistryConfig` and hands it in.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

/// Well-known port the on-device ADB daemon listens on in TCPIP mode.
pub const ADB_DAEMON_PORT: u16 = 5555;

/// Fixed address a peer-to-peer group owner assigns itself.
pub const WIFI_DIRECT_GROUP_OWNER_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 49, 1));

/// Two-tier timeouts used for every device round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Liveness checks: reachability probes, property reads.
    pub fast: Duration,
    /// Full round trips: shell commands, await-listening, connect.
    pub slow: Duration,
    /// Granularity of the await-listening poll.
    pub listen_poll: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            fast: Duration::from_secs(2),
            slow: Duration::from_secs(4),
            listen_poll: Duration::from_millis(100),
        }
    }
}

/// Configuration for one registry session.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Bridge executable (`adb`), resolved through `PATH` when relative.
    pub adb_path: PathBuf,
    pub timeouts: Timeouts,
    /// Port requested from `adb tcpip` and used for every connect.
    pub daemon_port: u16,
    /// Peer-to-peer group-owner address.
    pub group_owner_address: IpAddr,
    /// On-device peer-to-peer interface name.
    pub p2p_interface: String,
    /// On-device infrastructure WLAN interface name.
    pub wlan_interface: String,
    /// How often the device tracker lists transports.
    pub device_poll_interval: Duration,
    /// How often host network interfaces are polled.
    pub network_poll_interval: Duration,
    /// refresh passes after a network change while devices remain USB-only.
    pub network_retry_attempts: u32,
    /// Delay between those passes.
    pub network_retry_backoff: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            adb_path: PathBuf::from("adb"),
            timeouts: Timeouts::default(),
            daemon_port: ADB_DAEMON_PORT,
            group_owner_address: WIFI_DIRECT_GROUP_OWNER_ADDRESS,
            p2p_interface: "p2p0".into(),
            wlan_interface: "wlan0".into(),
            device_poll_interval: Duration::from_secs(1),
            network_poll_interval: Duration::from_secs(5),
            network_retry_attempts: 2,
            network_retry_backoff: Duration::from_secs(3),
        }
    }
}
