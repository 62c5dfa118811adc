// ── Notification plumbing ──
//
// Sources push `BridgeEvent`s into an unbounded channel; a single pump
// task feeds them to the registry one at a time. Advisories flow the
// other way as `RegistryNotice`s on a broadcast channel.

use std::fmt;
use std::net::SocketAddr;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::DeviceRegistry;
use crate::model::{DeviceChange, StableId, Transport, TransportSerial};

/// Identifies one running instance of the bridge daemon. A new id after
/// a restart tells the registry every old transport is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BridgeId(u64);

impl BridgeId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for BridgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bridge#{}", self.0)
    }
}

/// Something that happened outside the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    DeviceAttached(Transport),
    DeviceDetached(TransportSerial),
    DeviceChanged(Transport, DeviceChange),
    /// `None` when the bridge went away.
    BridgeChanged(Option<BridgeId>),
    NetworkInterfacesChanged { up: Vec<String>, down: Vec<String> },
}

/// A feed of [`BridgeEvent`]s.
///
/// The registry subscribes every source when it starts and cancels the
/// token and joins the returned task when it is torn down.
pub trait NotificationSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn subscribe(
        &self,
        events: mpsc::UnboundedSender<BridgeEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()>;
}

/// User-facing advisory. Never an error: the device stays tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryNotice {
    Promoted {
        stable_id: StableId,
        address: SocketAddr,
    },
    PromotionFailed {
        stable_id: StableId,
        label: String,
    },
    IdentityUnresolved {
        serial: TransportSerial,
        reason: String,
    },
}

impl fmt::Display for RegistryNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Promoted { stable_id, address } => {
                write!(f, "{stable_id} is now reachable over tcpip at {address}")
            }
            Self::PromotionFailed { label, .. } => {
                write!(f, "Unable to tcpip-connect to {label}; staying on USB")
            }
            Self::IdentityUnresolved { serial, reason } => {
                write!(f, "Ignoring {serial} for now: {reason}")
            }
        }
    }
}

/// Deliver events to the registry in arrival order until cancelled or
/// every sender is gone.
pub(crate) async fn pump(
    registry: DeviceRegistry,
    mut events: mpsc::UnboundedReceiver<BridgeEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                registry.handle_event(event).await;
            }
        }
    }
    debug!("event pump stopped");
}
