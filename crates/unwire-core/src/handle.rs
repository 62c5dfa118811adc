// ── Device handle ──
//
// One live transport session to one device. Holds no state beyond what
// the bridge reported at open time: every query goes to the device.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::RegistryConfig;
use crate::error::CoreError;
use crate::gateway::{
    BOOT_SERIAL_PROPERTY, HostBridge, P2P_DEVICE_NAME_SETTING, SERIAL_PROPERTY, ShellGateway,
    TCPIP_PORT_PROPERTY, dhcp_address_property, parse,
};
use crate::model::{StableId, Transport, TransportKind, TransportSerial};

/// Facade over one transport that turns typed queries into shell commands.
pub struct DeviceHandle {
    transport: Transport,
    stable_id: StableId,
    shell: Arc<dyn ShellGateway>,
    bridge: Arc<dyn HostBridge>,
    config: Arc<RegistryConfig>,
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("serial", &self.transport.serial)
            .field("stable_id", &self.stable_id)
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

impl DeviceHandle {
    pub(crate) fn new(
        transport: Transport,
        stable_id: StableId,
        shell: Arc<dyn ShellGateway>,
        bridge: Arc<dyn HostBridge>,
        config: Arc<RegistryConfig>,
    ) -> Self {
        Self {
            transport,
            stable_id,
            shell,
            bridge,
            config,
        }
    }

    // ── Identity ─────────────────────────────────────────────────────

    pub fn serial(&self) -> &TransportSerial {
        &self.transport.serial
    }

    pub fn stable_id(&self) -> &StableId {
        &self.stable_id
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn is_tcpip(&self) -> bool {
        self.kind() == TransportKind::Tcpip
    }

    /// Endpoint of a TCPIP transport, `None` for USB and emulators.
    pub fn tcpip_address(&self) -> Option<SocketAddr> {
        self.transport.serial.socket_addr()
    }

    // ── TCPIP daemon control ─────────────────────────────────────────

    /// Ask the daemon to restart listening on the configured port.
    ///
    /// Only reports whether the request was accepted; the device restarts
    /// its daemon asynchronously, so follow with [`await_listening`](Self::await_listening).
    pub async fn listen_on_tcpip(&self) -> Result<bool, CoreError> {
        self.bridge
            .set_listening(
                &self.transport.serial,
                self.config.daemon_port,
                self.config.timeouts.slow,
            )
            .await
    }

    /// Port the daemon is currently listening on, if any.
    pub async fn is_listening_on_tcpip(&self) -> Result<Option<u16>, CoreError> {
        let value = self
            .shell
            .get_property(
                &self.transport.serial,
                TCPIP_PORT_PROPERTY,
                self.config.timeouts.fast,
            )
            .await?;
        Ok(parse::tcpip_port(value.as_deref()))
    }

    /// Poll until the daemon reports the configured port, bounded by the
    /// slow timeout. Query failures count as "not yet".
    pub async fn await_listening(&self, cancel: &CancellationToken) -> Result<bool, CoreError> {
        let deadline = Instant::now() + self.config.timeouts.slow;
        loop {
            if cancel.is_cancelled() {
                return Err(CoreError::Interrupted);
            }
            match self.is_listening_on_tcpip().await {
                Ok(Some(port)) if port == self.config.daemon_port => return Ok(true),
                Ok(other) => trace!(serial = %self.serial(), port = ?other, "not listening yet"),
                Err(e) => trace!(serial = %self.serial(), error = %e, "listening query failed"),
            }
            if Instant::now() >= deadline {
                debug!(serial = %self.serial(), "daemon never reported listening");
                return Ok(false);
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(CoreError::Interrupted),
                () = tokio::time::sleep(self.config.timeouts.listen_poll) => {}
            }
        }
    }

    // ── Network queries ──────────────────────────────────────────────

    /// Infrastructure WLAN address: the DHCP lease property, falling back to
    /// the address configured on the interface.
    pub async fn wlan_address(&self) -> Result<Option<Ipv4Addr>, CoreError> {
        let interface = &self.config.wlan_interface;
        let leased = self
            .shell
            .get_property(
                &self.transport.serial,
                &dhcp_address_property(interface),
                self.config.timeouts.fast,
            )
            .await?;
        if let Some(addr) = parse::ipv4(leased.as_deref()) {
            return Ok(Some(addr));
        }

        let output = self
            .shell
            .execute(
                &self.transport.serial,
                &format!("ip -f inet addr show {interface}"),
                self.config.timeouts.slow,
            )
            .await?;
        Ok(parse::inet_address(&output))
    }

    /// True when the peer-to-peer interface is up and holds the group-owner address.
    pub async fn is_wifi_direct_group_owner(&self) -> Result<bool, CoreError> {
        let output = self
            .shell
            .execute(
                &self.transport.serial,
                &format!("ifconfig {}", self.config.p2p_interface),
                self.config.timeouts.slow,
            )
            .await?;
        let interface = parse::ifconfig(&output);
        let owns_address = interface
            .address
            .is_some_and(|addr| IpAddr::V4(addr) == self.config.group_owner_address);
        Ok(owns_address && interface.is_up())
    }

    /// Peer-to-peer device name. Absent on many devices.
    pub async fn display_name(&self) -> Result<Option<String>, CoreError> {
        query_display_name(self.shell.as_ref(), &self.transport.serial, &self.config).await
    }
}

// ── Pre-open queries ─────────────────────────────────────────────────
//
// Run before a handle exists, outside any registry lock.

/// Read the hardware-rooted identity behind a transport.
///
/// Property timeouts surface as [`CoreError::PropertyTimeout`]; anything
/// else, including both properties being empty, is an
/// [`CoreError::IdentityResolution`].
pub(crate) async fn resolve_stable_id(
    shell: &dyn ShellGateway,
    serial: &TransportSerial,
    config: &RegistryConfig,
) -> Result<StableId, CoreError> {
    for property in [BOOT_SERIAL_PROPERTY, SERIAL_PROPERTY] {
        match shell
            .get_property(serial, property, config.timeouts.fast)
            .await
        {
            Ok(Some(value)) => return Ok(StableId::new(value)),
            Ok(None) => continue,
            Err(e @ (CoreError::PropertyTimeout { .. } | CoreError::Interrupted)) => return Err(e),
            Err(e) => {
                return Err(CoreError::IdentityResolution {
                    serial: serial.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }
    Err(CoreError::IdentityResolution {
        serial: serial.to_string(),
        reason: "no serial number property".into(),
    })
}

pub(crate) async fn query_display_name(
    shell: &dyn ShellGateway,
    serial: &TransportSerial,
    config: &RegistryConfig,
) -> Result<Option<String>, CoreError> {
    shell
        .get_setting(serial, "global", P2P_DEVICE_NAME_SETTING, config.timeouts.fast)
        .await
}
