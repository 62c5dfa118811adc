// ── USB-to-TCPIP promotion ──
//
// Works on a point-in-time `PromotionView` copied out of the registry
// lock; never touches the tables itself. Two paths are tried in order:
// the peer-to-peer group-owner address, then the infrastructure WLAN
// address. Each path is listen -> await listening -> connect.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use serde::Serialize;
use strum::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::RegistryConfig;
use crate::error::CoreError;
use crate::gateway::{HostBridge, ReachabilityProber};
use crate::handle::DeviceHandle;
use crate::registry::tables::PromotionView;

/// Which address a promotion used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PromotionPath {
    WifiDirect,
    Wlan,
}

/// Outcome of one promotion attempt for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Promotion {
    /// No transport is open; nothing to promote.
    Idle,
    /// A TCPIP transport is already open.
    AlreadyWireless,
    /// Another promotion for the same device is running.
    InFlight,
    Connected {
        address: SocketAddr,
        path: PromotionPath,
    },
    /// Neither path worked. The device stays wired until the next trigger.
    Failed,
}

impl Promotion {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

pub(crate) struct Promoter<'a> {
    pub config: &'a RegistryConfig,
    pub bridge: &'a dyn HostBridge,
    pub prober: &'a dyn ReachabilityProber,
    pub cancel: &'a CancellationToken,
}

impl Promoter<'_> {
    pub(crate) async fn run(&self, view: &PromotionView) -> Result<Promotion, CoreError> {
        if !view.open {
            return Ok(Promotion::Idle);
        }
        if view.open_over_tcpip {
            return Ok(Promotion::AlreadyWireless);
        }
        let Some(handle) = view.wired.first() else {
            return Ok(Promotion::Idle);
        };

        let group_owner = self.config.group_owner_address;
        if view.group_owner_in_use {
            debug!(device = %view.label, "group-owner address already in use; skipping peer-to-peer");
        } else if self.reachable(group_owner).await?
            && unknown_as(
                handle.is_wifi_direct_group_owner().await,
                false,
                handle,
                "group-owner query",
            )?
            && self.listen_and_connect(handle, group_owner).await?
        {
            return Ok(self.connected(view, group_owner, PromotionPath::WifiDirect));
        }

        self.check_cancel()?;
        let wlan = unknown_as(handle.wlan_address().await, None, handle, "wlan address")?;
        if let Some(addr) = wlan.map(IpAddr::V4) {
            if self.reachable(addr).await? && self.listen_and_connect(handle, addr).await? {
                return Ok(self.connected(view, addr, PromotionPath::Wlan));
            }
        } else {
            debug!(device = %view.label, "no wlan address");
        }

        Ok(Promotion::Failed)
    }

    fn connected(&self, view: &PromotionView, ip: IpAddr, path: PromotionPath) -> Promotion {
        let address = SocketAddr::new(ip, self.config.daemon_port);
        info!(device = %view.label, %address, %path, "promoted to tcpip");
        Promotion::Connected { address, path }
    }

    fn check_cancel(&self) -> Result<(), CoreError> {
        if self.cancel.is_cancelled() {
            Err(CoreError::Interrupted)
        } else {
            Ok(())
        }
    }

    async fn reachable(&self, addr: IpAddr) -> Result<bool, CoreError> {
        self.check_cancel()?;
        let reachable = self
            .prober
            .is_reachable(addr, self.config.timeouts.fast)
            .await;
        debug!(%addr, reachable, "probed");
        Ok(reachable)
    }

    /// Listen, wait for the daemon, connect. A daemon already listening on
    /// the right port skips the restart.
    async fn listen_and_connect(
        &self,
        handle: &Arc<DeviceHandle>,
        ip: IpAddr,
    ) -> Result<bool, CoreError> {
        self.check_cancel()?;
        let port = self.config.daemon_port;
        let listening = unknown_as(handle.is_listening_on_tcpip().await, None, handle, "tcpip port")?;
        if listening != Some(port) {
            if !unknown_as(handle.listen_on_tcpip().await, false, handle, "tcpip request")? {
                debug!(serial = %handle.serial(), "tcpip request refused");
                return Ok(false);
            }
            if !handle.await_listening(self.cancel).await? {
                return Ok(false);
            }
        }

        self.check_cancel()?;
        let address = SocketAddr::new(ip, port);
        let connected = unknown_as(
            self.bridge.connect(address, self.config.timeouts.slow).await,
            false,
            handle,
            "connect",
        )?;
        debug!(%address, connected, "connect attempted");
        Ok(connected)
    }
}

/// Communication failures read as "unknown" and fall back to `default`;
/// interruption always propagates.
fn unknown_as<T>(
    result: Result<T, CoreError>,
    default: T,
    handle: &DeviceHandle,
    what: &str,
) -> Result<T, CoreError> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_interrupted() => Err(e),
        Err(e) => {
            debug!(serial = %handle.serial(), error = %e, "{what} unavailable");
            Ok(default)
        }
    }
}
