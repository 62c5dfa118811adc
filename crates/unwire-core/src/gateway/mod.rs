// ── Collaborator boundary ──
//
// The registry never runs a process or opens a socket itself. It talks
// to three injected services: a shell gateway for on-device commands, a
// host bridge for local `adb` control commands, and a reachability
// prober. Raw command output is only ever inspected by `parse`.

mod adb;
pub mod parse;
mod probe;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::model::{Transport, TransportSerial};

pub use adb::AdbCli;
pub use probe::TcpProber;

// ── Well-known device properties ─────────────────────────────────────

/// Hardware-rooted serial, set by the bootloader.
pub const BOOT_SERIAL_PROPERTY: &str = "ro.boot.serialno";
/// Older builds only publish this one.
pub const SERIAL_PROPERTY: &str = "ro.serialno";
/// Port the daemon is listening on in TCPIP mode; absent or `0` when USB-only.
pub const TCPIP_PORT_PROPERTY: &str = "service.adb.tcp.port";
/// Global setting holding the peer-to-peer device name.
pub const P2P_DEVICE_NAME_SETTING: &str = "wifi_p2p_device_name";

/// DHCP-assigned address property for an interface (`dhcp.wlan0.ipaddress`).
pub fn dhcp_address_property(interface: &str) -> String {
    format!("dhcp.{interface}.ipaddress")
}

// ── ShellGateway ─────────────────────────────────────────────────────

/// Executes commands on a device's remote shell.
#[async_trait]
pub trait ShellGateway: Send + Sync {
    /// Run `command` on the device behind `serial` and return its output.
    ///
    /// Fails with [`CoreError::CommandTimeout`] when the deadline passes and
    /// [`CoreError::DeviceCommunication`] for any other failure.
    async fn execute(
        &self,
        serial: &TransportSerial,
        command: &str,
        timeout: Duration,
    ) -> Result<String, CoreError>;

    /// Read one system property. `Ok(None)` when it is unset.
    async fn get_property(
        &self,
        serial: &TransportSerial,
        name: &str,
        timeout: Duration,
    ) -> Result<Option<String>, CoreError> {
        let output = self
            .execute(serial, &format!("getprop {name}"), timeout)
            .await
            .map_err(|e| match e {
                CoreError::CommandTimeout { timeout_ms, .. } => CoreError::PropertyTimeout {
                    serial: serial.to_string(),
                    property: name.to_owned(),
                    timeout_ms,
                },
                other => other,
            })?;
        Ok(parse::property_value(&output))
    }

    /// Read one `settings` value. `Ok(None)` when unset.
    async fn get_setting(
        &self,
        serial: &TransportSerial,
        namespace: &str,
        name: &str,
        timeout: Duration,
    ) -> Result<Option<String>, CoreError> {
        let output = self
            .execute(serial, &format!("settings get {namespace} {name}"), timeout)
            .await?;
        Ok(parse::setting_value(&output))
    }
}

// ── HostBridge ───────────────────────────────────────────────────────

/// Host-side bridge control commands (`adb tcpip`, `adb connect`, ...).
#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Ask the daemon on `serial` to restart listening on `port`. `true`
    /// means the request was accepted, not that listening has started.
    async fn set_listening(
        &self,
        serial: &TransportSerial,
        port: u16,
        timeout: Duration,
    ) -> Result<bool, CoreError>;

    /// Open a TCPIP transport to `addr`.
    async fn connect(&self, addr: SocketAddr, timeout: Duration) -> Result<bool, CoreError>;

    /// Drop the transport behind `serial`.
    async fn disconnect(&self, serial: &TransportSerial) -> Result<bool, CoreError>;

    /// Every transport the bridge currently knows about.
    async fn list_transports(&self) -> Result<Vec<Transport>, CoreError>;
}

// ── ReachabilityProber ───────────────────────────────────────────────

/// Answers whether a host responds at all, within `timeout`.
#[async_trait]
pub trait ReachabilityProber: Send + Sync {
    async fn is_reachable(&self, addr: IpAddr, timeout: Duration) -> bool;
}

// ── Collaborators ────────────────────────────────────────────────────

/// The three services a registry is constructed with.
#[derive(Clone)]
pub struct Collaborators {
    pub shell: Arc<dyn ShellGateway>,
    pub bridge: Arc<dyn HostBridge>,
    pub prober: Arc<dyn ReachabilityProber>,
}

impl Collaborators {
    /// Production wiring: one `adb` executable for shell and bridge, TCP for probing.
    pub fn adb(adb: AdbCli) -> Self {
        let adb = Arc::new(adb);
        Self {
            shell: adb.clone(),
            bridge: adb,
            prober: Arc::new(TcpProber::default()),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
