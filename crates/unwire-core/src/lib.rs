//! Device registry and USB-to-TCPIP promotion engine for Android
//! debug-bridge devices.
//!
//! This crate owns the domain model, the locking discipline, and the
//! promotion algorithm behind the `unwire` CLI:
//!
//! - **[`DeviceRegistry`]**: single owner of every logical device (keyed by
//!   [`StableId`]) and every open [`DeviceHandle`] (keyed by
//!   [`TransportSerial`]). Direct calls wait for the primary lock;
//!   notification-driven work is run on the spot or queued for the current
//!   lock holder, so event delivery never blocks.
//!
//! - **Promotion**: for a device known only over USB, try the peer-to-peer
//!   group-owner address, then the WLAN address, each as listen, await
//!   listening, connect. Outcomes are reported as [`Promotion`] values and
//!   [`RegistryNotice`] advisories.
//!
//! - **Collaborators** ([`gateway`]): the registry only talks to the world
//!   through [`ShellGateway`], [`HostBridge`] and [`ReachabilityProber`].
//!   [`AdbCli`] and [`TcpProber`] are the production implementations.
//!
//! - **Notification sources**: [`DeviceTracker`] polls the bridge's
//!   transport listing; [`NetworkInterfaceMonitor`] polls host interfaces.
//!   Both feed [`BridgeEvent`]s to a started registry.

pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod registry;

mod device;
mod handle;
mod lock;
mod monitor;
mod promotion;
mod tracker;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ADB_DAEMON_PORT, RegistryConfig, Timeouts, WIFI_DIRECT_GROUP_OWNER_ADDRESS};
pub use error::CoreError;
pub use gateway::{AdbCli, Collaborators, HostBridge, ReachabilityProber, ShellGateway, TcpProber};
pub use handle::DeviceHandle;
pub use monitor::NetworkInterfaceMonitor;
pub use promotion::{Promotion, PromotionPath};
pub use registry::{
    BridgeEvent, BridgeId, DeviceRegistry, DeviceStatus, NotificationSource, RegistryNotice,
};
pub use tracker::DeviceTracker;

pub use model::{
    DeviceChange, DeviceSnapshot, RegistrySnapshot, StableId, Transport, TransportKind,
    TransportSerial, TransportState,
};
