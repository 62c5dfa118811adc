// ── Device tracker ──
//
// Notification source that polls the bridge's transport listing and
// turns differences between polls into attach / detach / change events.
// A failed listing means the bridge is gone; the next good one means a
// new bridge instance, which re-announces every transport.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::gateway::HostBridge;
use crate::model::{DeviceChange, Transport, TransportSerial};
use crate::registry::{BridgeEvent, BridgeId, NotificationSource};

pub struct DeviceTracker {
    bridge: Arc<dyn HostBridge>,
    interval: Duration,
}

impl DeviceTracker {
    pub fn new(bridge: Arc<dyn HostBridge>, interval: Duration) -> Self {
        Self { bridge, interval }
    }
}

impl NotificationSource for DeviceTracker {
    fn name(&self) -> &'static str {
        "device-tracker"
    }

    fn subscribe(
        &self,
        events: mpsc::UnboundedSender<BridgeEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let bridge = self.bridge.clone();
        let period = self.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut state = TrackerState::default();
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let listing = bridge.list_transports().await;
                        for event in state.observe(listing) {
                            if events.send(event).is_err() {
                                return;
                            }
                        }
                    }
                }
            }
            debug!("device tracker stopped");
        })
    }
}

/// What the tracker remembers between polls.
#[derive(Debug, Default)]
struct TrackerState {
    bridge: Option<BridgeId>,
    instances: u64,
    known: BTreeMap<TransportSerial, Transport>,
}

impl TrackerState {
    fn observe(&mut self, listing: Result<Vec<Transport>, CoreError>) -> Vec<BridgeEvent> {
        let transports = match listing {
            Ok(transports) => transports,
            Err(e) => {
                if self.bridge.take().is_some() {
                    warn!(error = %e, "bridge went away");
                    self.known.clear();
                    return vec![BridgeEvent::BridgeChanged(None)];
                }
                debug!(error = %e, "bridge still unavailable");
                return Vec::new();
            }
        };

        let mut events = Vec::new();
        if self.bridge.is_none() {
            self.instances += 1;
            let id = BridgeId::new(self.instances);
            self.bridge = Some(id);
            events.push(BridgeEvent::BridgeChanged(Some(id)));
        }

        let current: BTreeMap<_, _> = transports
            .into_iter()
            .map(|t| (t.serial.clone(), t))
            .collect();
        events.extend(
            self.known
                .keys()
                .filter(|serial| !current.contains_key(*serial))
                .map(|serial| BridgeEvent::DeviceDetached(serial.clone())),
        );
        for (serial, transport) in &current {
            match self.known.get(serial) {
                None => events.push(BridgeEvent::DeviceAttached(transport.clone())),
                Some(previous) if previous.state != transport.state => events.push(
                    BridgeEvent::DeviceChanged(transport.clone(), DeviceChange::State),
                ),
                Some(_) => {}
            }
        }
        self.known = current;
        events
    }
}
